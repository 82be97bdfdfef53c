//! vSphere event plumbing.
//!
//! vCenter reports the outcome of some long-running operations (guest
//! customization being the main one) only through its event stream, never
//! through the task that started them. This module defines the event types,
//! the [`EventSource`] seam the rest of the crate subscribes through, and the
//! [`waiter::CompletionWaiter`] built on top of it.
//!
//! ```text
//! CompletionWaiter::start(source, vm)      ← subscribe first
//!     └─► listener task ── pages ──► success / failure / transport error
//! caller: start customization task          ← then trigger
//! caller: waiter.wait()                     ← bounded by the waiter timeout
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod memory;
pub mod waiter;

/// Event type IDs the crate looks for.
pub mod event_type {
    pub const CUSTOMIZATION_STARTED: &str = "CustomizationStartedEvent";
    pub const CUSTOMIZATION_SUCCEEDED: &str = "CustomizationSucceeded";
    pub const CUSTOMIZATION_FAILED: &str = "CustomizationFailed";
}

// ---------------------------------------------------------------------------
// Managed object references
// ---------------------------------------------------------------------------

/// An opaque `(kind, value)` handle on a vSphere managed object, e.g.
/// `VirtualMachine:vm-42`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedObjectReference {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl ManagedObjectReference {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    pub fn virtual_machine(value: impl Into<String>) -> Self {
        Self::new("VirtualMachine", value)
    }
}

impl fmt::Display for ManagedObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid managed object reference {0:?}, expected Kind:value")]
pub struct ReferenceParseError(String);

impl FromStr for ManagedObjectReference {
    type Err = ReferenceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((kind, value)) if !kind.is_empty() && !value.is_empty() => {
                Ok(Self::new(kind, value))
            }
            _ => Err(ReferenceParseError(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A single vSphere event, reduced to the fields the crate acts on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub key: i32,
    pub type_id: String,
    pub entity: ManagedObjectReference,
    pub created_time: DateTime<Utc>,
    #[serde(default)]
    pub full_formatted_message: String,
}

impl Event {
    pub fn new(key: i32, type_id: impl Into<String>, entity: ManagedObjectReference) -> Self {
        Self {
            key,
            type_id: type_id.into(),
            entity,
            created_time: Utc::now(),
            full_formatted_message: String::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.full_formatted_message = message.into();
        self
    }
}

/// One batch of events delivered by a subscription.
pub type EventPage = Vec<Event>;

/// How far below the filtered entity events are collected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recursion {
    #[serde(rename = "self")]
    Entity,
    Children,
    #[default]
    All,
}

/// Which events a subscription or query is interested in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    pub entities: Vec<ManagedObjectReference>,
    /// Sources without an inventory hierarchy, such as
    /// [`memory::MemoryEventSource`], treat every mode like
    /// [`Recursion::Entity`].
    pub recursion: Recursion,
    /// Empty means every event type.
    pub event_types: Vec<String>,
    /// Maximum number of events per delivered page.
    pub page_size: usize,
    /// `true`: deliver events emitted after subscribing, indefinitely.
    /// `false`: deliver the recorded backlog in pages, then end the stream.
    pub tail: bool,
}

/// Page size the provider has always used for event subscriptions.
pub const DEFAULT_PAGE_SIZE: usize = 10;

impl EventFilter {
    pub fn for_entity(entity: ManagedObjectReference) -> Self {
        Self {
            entities: vec![entity],
            recursion: Recursion::All,
            event_types: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            tail: true,
        }
    }

    pub fn with_event_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.event_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Whether `event` passes the entity and type filters.
    pub fn matches(&self, event: &Event) -> bool {
        let entity_ok = self.entities.is_empty() || self.entities.contains(&event.entity);
        let type_ok =
            self.event_types.is_empty() || self.event_types.iter().any(|t| *t == event.type_id);
        entity_ok && type_ok
    }
}

// ---------------------------------------------------------------------------
// Event sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("event subscription failed: {0}")]
    Transport(String),
    #[error("event subscription fell behind and dropped {0} events")]
    Lagged(u64),
    #[error("event stream closed unexpectedly")]
    Closed,
    #[error("timed out after {0:?} waiting for the event service")]
    Timeout(Duration),
}

/// A live subscription. Dropping the stream releases it.
pub type EventStream = BoxStream<'static, Result<EventPage, SourceError>>;

/// Anything that can deliver vSphere events: a vCenter event manager, or the
/// in-memory [`memory::MemoryEventSource`].
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Open a subscription. Events emitted after this returns `Ok` are
    /// guaranteed to be delivered on the stream.
    async fn subscribe(&self, filter: &EventFilter) -> Result<EventStream, SourceError>;

    /// One-shot query of recorded events.
    async fn query_events(&self, filter: &EventFilter) -> Result<Vec<Event>, SourceError>;
}

/// Query the events recorded for `entity` and everything below it.
///
/// Supplying `event_types` is strongly recommended when the history may be
/// large, as there is no limit on the number of returned events.
pub async fn select_events_for_reference(
    source: &dyn EventSource,
    entity: &ManagedObjectReference,
    event_types: &[&str],
    timeout: Duration,
) -> Result<Vec<Event>, SourceError> {
    let filter = EventFilter::for_entity(entity.clone())
        .with_event_types(event_types.iter().copied());
    tokio::time::timeout(timeout, source.query_events(&filter))
        .await
        .map_err(|_| SourceError::Timeout(timeout))?
}

// ---------------------------------------------------------------------------
// Recorded event logs
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
#[error("line {line}: invalid event: {source}")]
pub struct EventLogError {
    pub line: usize,
    #[source]
    pub source: serde_json::Error,
}

/// Parse a JSON-lines event log, one [`Event`] per line. Blank lines are
/// skipped; `line` in the error is 1-based.
pub fn parse_event_log(content: &str) -> Result<Vec<Event>, EventLogError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|source| EventLogError {
                line: idx + 1,
                source,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use memory::MemoryEventSource;
pub use waiter::{CompletionEvents, CompletionWaiter, WaiterError, WaiterOptions, WaiterState};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_display_and_parse() {
        let vm = ManagedObjectReference::virtual_machine("vm-42");
        assert_eq!(vm.to_string(), "VirtualMachine:vm-42");
        assert_eq!("VirtualMachine:vm-42".parse::<ManagedObjectReference>().unwrap(), vm);
        assert!("vm-42".parse::<ManagedObjectReference>().is_err());
        assert!(":vm-42".parse::<ManagedObjectReference>().is_err());
    }

    #[test]
    fn event_json_shape() {
        let line = r#"{"key":7,"type_id":"CustomizationFailed","entity":{"type":"VirtualMachine","value":"vm-1"},"created_time":"2024-03-01T10:00:00Z","full_formatted_message":"sysprep failed"}"#;
        let event: Event = serde_json::from_str(line).unwrap();
        assert_eq!(event.key, 7);
        assert_eq!(event.type_id, event_type::CUSTOMIZATION_FAILED);
        assert_eq!(event.entity, ManagedObjectReference::virtual_machine("vm-1"));
        assert_eq!(event.full_formatted_message, "sysprep failed");
    }

    #[test]
    fn message_defaults_to_empty() {
        let line = r#"{"key":1,"type_id":"VmPoweredOnEvent","entity":{"type":"VirtualMachine","value":"vm-1"},"created_time":"2024-03-01T10:00:00Z"}"#;
        let event: Event = serde_json::from_str(line).unwrap();
        assert!(event.full_formatted_message.is_empty());
    }

    #[test]
    fn event_log_skips_blank_lines_and_reports_bad_line() {
        let log = r#"
{"key":1,"type_id":"CustomizationStartedEvent","entity":{"type":"VirtualMachine","value":"vm-1"},"created_time":"2024-03-01T10:00:00Z"}

{"key":2,"type_id":"CustomizationSucceeded","entity":{"type":"VirtualMachine","value":"vm-1"},"created_time":"2024-03-01T10:02:00Z"}
"#;
        let events = parse_event_log(log).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].type_id, event_type::CUSTOMIZATION_SUCCEEDED);

        let err = parse_event_log("\n{\"key\":1}\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.to_string().starts_with("line 2: invalid event"));
    }

    #[test]
    fn filter_matches_entity_and_type() {
        let vm = ManagedObjectReference::virtual_machine("vm-1");
        let other = ManagedObjectReference::virtual_machine("vm-2");
        let filter = EventFilter::for_entity(vm.clone())
            .with_event_types([event_type::CUSTOMIZATION_SUCCEEDED]);

        assert!(filter.matches(&Event::new(1, event_type::CUSTOMIZATION_SUCCEEDED, vm.clone())));
        assert!(!filter.matches(&Event::new(2, event_type::CUSTOMIZATION_FAILED, vm)));
        assert!(!filter.matches(&Event::new(3, event_type::CUSTOMIZATION_SUCCEEDED, other)));
    }

    #[test]
    fn filter_defaults() {
        let filter = EventFilter::for_entity(ManagedObjectReference::virtual_machine("vm-1"));
        assert_eq!(filter.page_size, DEFAULT_PAGE_SIZE);
        assert!(filter.tail);
        assert_eq!(filter.recursion, Recursion::All);
        assert!(filter.event_types.is_empty());
    }

    #[test]
    fn recursion_serde_names() {
        assert_eq!(serde_json::to_string(&Recursion::Entity).unwrap(), "\"self\"");
        assert_eq!(serde_json::to_string(&Recursion::All).unwrap(), "\"all\"");
    }
}
