//! Event-driven completion waiter.
//!
//! Some vSphere operations finish long after their task does: a clone task
//! that applies a customization spec succeeds as soon as the clone exists,
//! and the guest customization that follows is only reported through
//! `CustomizationSucceeded` / `CustomizationFailed` events.
//!
//! [`CompletionWaiter::start`] opens the event subscription and spawns the
//! listener task *before* returning. It must be called before the operation
//! being tracked is started; an event emitted before the subscription exists
//! is never seen, and the waiter would run into its timeout.
//!
//! The listener writes the outcome into a oneshot channel and exits, so there
//! is exactly one terminal transition and the result can only be read after it
//! happened.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    EventFilter, EventSource, EventStream, ManagedObjectReference, SourceError, event_type,
};

/// Timeout the provider applies to every vSphere API wait.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// The pair of event types that end a wait, plus a label for messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionEvents {
    pub success: &'static str,
    pub failure: &'static str,
    pub operation: &'static str,
}

impl CompletionEvents {
    pub const CUSTOMIZATION: CompletionEvents = CompletionEvents {
        success: event_type::CUSTOMIZATION_SUCCEEDED,
        failure: event_type::CUSTOMIZATION_FAILED,
        operation: "customization",
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaiterOptions {
    /// How long [`CompletionWaiter::done`] waits, measured from the call.
    pub timeout: Duration,
    pub page_size: usize,
}

impl Default for WaiterOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            page_size: super::DEFAULT_PAGE_SIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// State and errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaiterState {
    Pending,
    Succeeded,
    /// A failure event, a subscription error, or cancellation.
    Failed,
    TimedOut,
}

#[derive(Debug, Error)]
pub enum WaiterError {
    /// The event subscription itself broke.
    #[error(transparent)]
    Subscription(#[from] SourceError),
    /// The remote operation reported failure; `message` is vCenter's own text.
    #[error("{message}")]
    Failed { message: String },
    #[error("timeout waiting for {operation} to complete")]
    Timeout { operation: &'static str },
    #[error("stopped waiting for {operation}: cancelled")]
    Cancelled { operation: &'static str },
}

type Outcome = Result<(), WaiterError>;

// ---------------------------------------------------------------------------
// Waiter
// ---------------------------------------------------------------------------

/// Waits for a success or failure event on one entity.
///
/// Dropping the waiter cancels the listener and releases its subscription.
pub struct CompletionWaiter {
    entity: ManagedObjectReference,
    events: CompletionEvents,
    timeout: Duration,
    rx: Option<oneshot::Receiver<Outcome>>,
    listener: Option<JoinHandle<()>>,
    cancel: CancellationToken,
    outcome: Option<Outcome>,
    state: WaiterState,
}

impl CompletionWaiter {
    /// Subscribe to `entity`'s events and start listening for `events`.
    ///
    /// Call this **before** starting the operation being waited on. A failed
    /// subscription does not error here; it is reported once by [`Self::done`].
    /// Subscribing is bounded by `options.timeout`; a source that never
    /// answers yields a waiter already resolved with [`WaiterError::Timeout`].
    pub async fn start(
        source: Arc<dyn EventSource>,
        entity: ManagedObjectReference,
        events: CompletionEvents,
        options: WaiterOptions,
    ) -> Self {
        Self::start_with_cancel(source, entity, events, options, &CancellationToken::new()).await
    }

    /// Like [`Self::start`], but also stops listening when `parent` is
    /// cancelled.
    pub async fn start_with_cancel(
        source: Arc<dyn EventSource>,
        entity: ManagedObjectReference,
        events: CompletionEvents,
        options: WaiterOptions,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();
        let mut waiter = Self {
            entity,
            events,
            timeout: options.timeout,
            rx: None,
            listener: None,
            cancel,
            outcome: None,
            state: WaiterState::Pending,
        };

        let filter = EventFilter::for_entity(waiter.entity.clone()).with_page_size(options.page_size);
        // Setup counts against the same bound as the wait itself.
        let subscribed = match tokio::time::timeout(options.timeout, source.subscribe(&filter)).await {
            Ok(subscribed) => subscribed,
            Err(_) => {
                warn!(
                    entity = %waiter.entity,
                    timeout_secs = options.timeout.as_secs(),
                    "timed out subscribing to events"
                );
                waiter.finish(Err(WaiterError::Timeout {
                    operation: events.operation,
                }));
                return waiter;
            }
        };
        match subscribed {
            Ok(stream) => {
                let (tx, rx) = oneshot::channel();
                waiter.rx = Some(rx);
                waiter.listener = Some(tokio::spawn(listen(
                    stream,
                    events,
                    waiter.entity.clone(),
                    waiter.cancel.clone(),
                    tx,
                )));
                debug!(entity = %waiter.entity, operation = events.operation, "completion waiter listening");
            }
            Err(e) => {
                error!(entity = %waiter.entity, error = %e, "could not subscribe to events");
                waiter.finish(Err(WaiterError::Subscription(e)));
            }
        }

        waiter
    }

    /// Convenience for the customization events.
    pub async fn customization(
        source: Arc<dyn EventSource>,
        vm: ManagedObjectReference,
        options: WaiterOptions,
    ) -> Self {
        Self::start(source, vm, CompletionEvents::CUSTOMIZATION, options).await
    }

    pub fn entity(&self) -> &ManagedObjectReference {
        &self.entity
    }

    pub fn state(&self) -> WaiterState {
        self.state
    }

    /// Block until the wait reaches a terminal state. The timeout starts when
    /// this is first called. Calling it again returns immediately.
    pub async fn done(&mut self) {
        if self.outcome.is_some() {
            return;
        }
        let Some(mut rx) = self.rx.take() else {
            self.finish(Err(WaiterError::Cancelled {
                operation: self.events.operation,
            }));
            return;
        };

        let outcome = match tokio::time::timeout(self.timeout, &mut rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(WaiterError::Cancelled {
                operation: self.events.operation,
            }),
            Err(_) => {
                warn!(
                    entity = %self.entity,
                    timeout_secs = self.timeout.as_secs(),
                    operation = self.events.operation,
                    "timed out waiting for completion event"
                );
                self.shutdown().await;
                // The listener may have finished just as the timer fired.
                rx.try_recv().unwrap_or(Err(WaiterError::Timeout {
                    operation: self.events.operation,
                }))
            }
        };

        self.shutdown().await;
        self.finish(outcome);
    }

    /// The outcome, once [`Self::done`] has returned. `None` before that.
    pub fn result(&self) -> Option<&Result<(), WaiterError>> {
        self.outcome.as_ref()
    }

    /// Wait for completion and take the outcome.
    pub async fn wait(mut self) -> Result<(), WaiterError> {
        self.done().await;
        self.outcome.take().unwrap_or(Err(WaiterError::Cancelled {
            operation: self.events.operation,
        }))
    }

    /// Cancel the listener and wait for it to drop its subscription.
    async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(listener) = self.listener.take() {
            if let Err(e) = listener.await {
                error!(entity = %self.entity, error = %e, "completion listener task failed");
            }
        }
    }

    fn finish(&mut self, outcome: Outcome) {
        self.state = match &outcome {
            Ok(()) => WaiterState::Succeeded,
            Err(WaiterError::Timeout { .. }) => WaiterState::TimedOut,
            Err(_) => WaiterState::Failed,
        };
        match &outcome {
            Ok(()) => info!(entity = %self.entity, operation = self.events.operation, "operation completed"),
            Err(e) => warn!(entity = %self.entity, operation = self.events.operation, error = %e, "operation did not complete"),
        }
        self.outcome = Some(outcome);
    }
}

impl Drop for CompletionWaiter {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Listener task
// ---------------------------------------------------------------------------

async fn listen(
    mut stream: EventStream,
    events: CompletionEvents,
    entity: ManagedObjectReference,
    cancel: CancellationToken,
    tx: oneshot::Sender<Outcome>,
) {
    let outcome = tokio::select! {
        _ = cancel.cancelled() => {
            debug!(entity = %entity, "completion listener cancelled");
            return;
        }
        outcome = watch(&mut stream, events) => outcome,
    };

    // Release the subscription before anyone can observe completion.
    drop(stream);
    let _ = tx.send(outcome);
}

/// Scan pages in delivery order until the first terminal event.
async fn watch(stream: &mut EventStream, events: CompletionEvents) -> Outcome {
    while let Some(page) = stream.next().await {
        for event in page? {
            if event.type_id == events.failure {
                return Err(WaiterError::Failed {
                    message: event.full_formatted_message,
                });
            }
            if event.type_id == events.success {
                return Ok(());
            }
        }
    }
    Err(WaiterError::Subscription(SourceError::Closed))
}
