//! In-process [`EventSource`].
//!
//! Backs the `wait-customization` replay command and the waiter tests. Events
//! are fanned out to subscribers over a `tokio::sync::broadcast` channel and
//! also kept in a history list for [`EventSource::query_events`] and for
//! non-tailing subscriptions, which page out that backlog and then end. There
//! is no inventory hierarchy here, so every [`Recursion`](super::Recursion)
//! mode matches on the listed entities only.

use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};

use super::{
    Event, EventFilter, EventPage, EventSource, EventStream, ManagedObjectReference, SourceError,
};

/// Default number of undelivered items a slow subscriber may fall behind by.
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
enum Feed {
    Event(Event),
    Fault(String),
}

/// Every published event is kept for the lifetime of the source; nothing is
/// evicted. Size replays with [`MemoryEventSource::sized_for`].
pub struct MemoryEventSource {
    feed: broadcast::Sender<Feed>,
    history: Mutex<Vec<Event>>,
    refusal: Mutex<Option<String>>,
    active: Arc<AtomicUsize>,
    next_key: AtomicI32,
}

impl Default for MemoryEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEventSource {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(capacity.max(1));
        Self {
            feed,
            history: Mutex::new(Vec::new()),
            refusal: Mutex::new(None),
            active: Arc::new(AtomicUsize::new(0)),
            next_key: AtomicI32::new(1),
        }
    }

    /// A source whose channel can hold `events` undelivered items, so a
    /// replay of that many events cannot make a subscriber lag.
    pub fn sized_for(events: usize) -> Self {
        Self::with_capacity(events.max(DEFAULT_CAPACITY))
    }

    /// Record `event` and deliver it to every live subscription.
    pub fn publish(&self, event: Event) {
        debug!(key = event.key, type_id = %event.type_id, entity = %event.entity, "publishing event");
        lock(&self.history).push(event.clone());
        // No receivers is fine: the event still lands in the history.
        let _ = self.feed.send(Feed::Event(event));
    }

    /// Build an event with the next free key, publish it and return it.
    pub fn emit(
        &self,
        entity: &ManagedObjectReference,
        type_id: &str,
        message: impl Into<String>,
    ) -> Event {
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        let event = Event::new(key, type_id, entity.clone()).with_message(message);
        self.publish(event.clone());
        event
    }

    /// Break every live subscription with a transport error.
    pub fn inject_fault(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(error = %message, "injecting event feed fault");
        let _ = self.feed.send(Feed::Fault(message));
    }

    /// Make future `subscribe` and `query_events` calls fail.
    pub fn refuse_subscriptions(&self, message: impl Into<String>) {
        *lock(&self.refusal) = Some(message.into());
    }

    pub fn accept_subscriptions(&self) {
        *lock(&self.refusal) = None;
    }

    /// Number of subscription streams that have not been dropped yet.
    pub fn active_subscriptions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn history(&self) -> Vec<Event> {
        lock(&self.history).clone()
    }

    fn check_refusal(&self) -> Result<(), SourceError> {
        match lock(&self.refusal).as_ref() {
            Some(message) => Err(SourceError::Transport(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EventSource for MemoryEventSource {
    async fn subscribe(&self, filter: &EventFilter) -> Result<EventStream, SourceError> {
        self.check_refusal()?;

        if !filter.tail {
            let guard = ActiveGuard::new(Arc::clone(&self.active));
            let backlog: Vec<Event> = lock(&self.history)
                .iter()
                .filter(|event| filter.matches(event))
                .cloned()
                .collect();
            let pages: Vec<Result<EventPage, SourceError>> = backlog
                .chunks(filter.page_size.max(1))
                .map(|chunk| Ok(chunk.to_vec()))
                .collect();
            debug!(entities = ?filter.entities, pages = pages.len(), "backlog subscription opened");

            let stream = futures_util::stream::iter(pages).map(move |page| {
                let _held = &guard;
                page
            });
            return Ok(stream.boxed());
        }

        let subscription = Subscription {
            rx: self.feed.subscribe(),
            filter: filter.clone(),
            pending: None,
            finished: false,
            _guard: ActiveGuard::new(Arc::clone(&self.active)),
        };
        debug!(entities = ?filter.entities, page_size = filter.page_size, "subscription opened");

        let stream = futures_util::stream::unfold(subscription, |mut sub| async move {
            let page = sub.next_page().await?;
            Some((page, sub))
        });
        Ok(stream.boxed())
    }

    async fn query_events(&self, filter: &EventFilter) -> Result<Vec<Event>, SourceError> {
        self.check_refusal()?;
        Ok(lock(&self.history)
            .iter()
            .filter(|event| filter.matches(event))
            .cloned()
            .collect())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

/// Keeps the live-subscription count honest: incremented on open, decremented
/// when the stream (and this guard with it) is dropped.
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
        debug!("subscription released");
    }
}

struct Subscription {
    rx: broadcast::Receiver<Feed>,
    filter: EventFilter,
    /// An error noticed while filling the previous page, reported next.
    pending: Option<SourceError>,
    finished: bool,
    _guard: ActiveGuard,
}

impl Subscription {
    /// Wait for the first matching event, then drain whatever else is already
    /// queued up to the page size. Errors end the stream.
    async fn next_page(&mut self) -> Option<Result<EventPage, SourceError>> {
        if self.finished {
            return None;
        }
        if let Some(err) = self.pending.take() {
            self.finished = true;
            return Some(Err(err));
        }

        let page_size = self.filter.page_size.max(1);
        let mut page = Vec::with_capacity(page_size);

        while page.is_empty() {
            match self.rx.recv().await {
                Ok(Feed::Event(event)) => {
                    if self.filter.matches(&event) {
                        page.push(event);
                    }
                }
                Ok(Feed::Fault(message)) => {
                    return Some(Err(self.finish(SourceError::Transport(message))));
                }
                Err(RecvError::Lagged(missed)) => {
                    return Some(Err(self.finish(SourceError::Lagged(missed))));
                }
                Err(RecvError::Closed) => {
                    self.finished = true;
                    return None;
                }
            }
        }

        while page.len() < page_size {
            match self.rx.try_recv() {
                Ok(Feed::Event(event)) => {
                    if self.filter.matches(&event) {
                        page.push(event);
                    }
                }
                Ok(Feed::Fault(message)) => {
                    self.pending = Some(SourceError::Transport(message));
                    break;
                }
                Err(TryRecvError::Lagged(missed)) => {
                    self.pending = Some(SourceError::Lagged(missed));
                    break;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }

        Some(Ok(page))
    }

    fn finish(&mut self, err: SourceError) -> SourceError {
        self.finished = true;
        err
    }
}
