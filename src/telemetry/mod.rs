//! Engine events: the structured side channel next to `tracing` logs.
//!
//! Every condition the engine logs (enqueue after stop, abandoned listeners,
//! missing entries, failed round-trips, completed flushes) is also reported to
//! an [`EventSink`], so applications can count or alert on them without
//! parsing logs.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`EngineEvent`] | Typed event enum |
//! | [`EventSink`] | Trait for event destinations |
//! | [`NoopEventSink`] | Default sink, drops everything |
//! | [`InMemoryEventSink`] | Bounded in-memory sink for tests and inspection |
//! | [`set_event_sink`] | Process-wide default for engines built without a sink |

use crate::engine::FlushTrigger;
use crate::operation::OperationKind;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// Enqueue attempted after shutdown.
    EngineStopped { kind: OperationKind },
    /// The caller dropped its handle before the result arrived.
    AbandonedListener { fingerprint: String, kind: OperationKind },
    /// A snapshotted fingerprint was gone from the table at delivery time.
    MissingEntry { fingerprint: String },
    /// The round-trip failed as a whole; entries stay queued.
    BulkFailure { operations: usize, message: String },
    Flushed {
        trigger: FlushTrigger,
        operations: usize,
        listeners: usize,
        elapsed_us: u64,
    },
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::EngineStopped { .. } => "engine_stopped",
            EngineEvent::AbandonedListener { .. } => "abandoned_listener",
            EngineEvent::MissingEntry { .. } => "missing_entry",
            EngineEvent::BulkFailure { .. } => "bulk_failure",
            EngineEvent::Flushed { .. } => "flushed",
        }
    }
}

/// Event sink trait. Called inline from enqueue and dispatch, so it must not block.
pub trait EventSink: Send + Sync {
    fn report(&self, event: EngineEvent);
}

/// No-op sink (default).
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn report(&self, _: EngineEvent) {}
}

/// Returns a no-op event sink.
pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoopEventSink)
}

/// In-memory sink keeping the most recent `max_events` events.
pub struct InMemoryEventSink {
    events: RwLock<VecDeque<EngineEvent>>,
    max_events: usize,
}

impl InMemoryEventSink {
    pub fn new(max: usize) -> Self {
        Self {
            events: RwLock::new(VecDeque::new()),
            max_events: max.max(1),
        }
    }
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
    /// Number of retained events with the given [`EngineEvent::name`].
    pub fn count(&self, name: &str) -> usize {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.name() == name)
            .count()
    }
    pub fn clear(&self) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
    pub fn len(&self) -> usize {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

static GLOBAL_SINK: once_cell::sync::Lazy<RwLock<Arc<dyn EventSink>>> =
    once_cell::sync::Lazy::new(|| RwLock::new(Arc::new(NoopEventSink)));

/// Returns the process-wide event sink. Engines started without an explicit
/// sink capture this at start.
pub fn get_event_sink() -> Arc<dyn EventSink> {
    GLOBAL_SINK
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Sets the process-wide event sink.
pub fn set_event_sink(sink: Arc<dyn EventSink>) {
    *GLOBAL_SINK.write().unwrap_or_else(PoisonError::into_inner) = sink;
}

impl Default for InMemoryEventSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventSink for InMemoryEventSink {
    fn report(&self, event: EngineEvent) {
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        events.push_back(event);
        while events.len() > self.max_events {
            events.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_sink_is_bounded() {
        let sink = InMemoryEventSink::new(2);
        for n in 0..3 {
            sink.report(EngineEvent::BulkFailure {
                operations: n,
                message: "down".into(),
            });
        }
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            EngineEvent::BulkFailure {
                operations: 1,
                message: "down".into()
            }
        );
    }

    #[test]
    fn test_count_by_name() {
        let sink = InMemoryEventSink::default();
        sink.report(EngineEvent::EngineStopped {
            kind: OperationKind::Get,
        });
        sink.report(EngineEvent::MissingEntry {
            fingerprint: "ab".into(),
        });
        sink.report(EngineEvent::EngineStopped {
            kind: OperationKind::Del,
        });
        assert_eq!(sink.count("engine_stopped"), 2);
        assert_eq!(sink.count("missing_entry"), 1);
        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_global_sink_can_be_replaced() {
        let sink = Arc::new(InMemoryEventSink::default());
        set_event_sink(sink.clone());
        get_event_sink().report(EngineEvent::MissingEntry {
            fingerprint: "cd".into(),
        });
        set_event_sink(noop_sink());
        assert!(sink.count("missing_entry") >= 1);
    }

    #[test]
    fn test_noop_sink_accepts_events() {
        noop_sink().report(EngineEvent::MissingEntry {
            fingerprint: String::new(),
        });
    }
}
