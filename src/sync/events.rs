//! Observability events emitted by the engine.
//!
//! Sinks are fire-and-forget: `emit` returns nothing, and a sink that fails
//! internally logs and drops the event. The engine never blocks or aborts
//! because of a sink.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::model::{ConflictResolution, DeadLetterReason, EntityType, Operation};

/// Something observable that happened inside the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    /// An operation was durably queued.
    Enqueued {
        item_id: String,
        entity_type: EntityType,
        operation: Operation,
    },
    /// The remote store accepted an item.
    Synced { item_id: String },
    /// An upload failed and the item will be retried.
    Failed {
        item_id: String,
        attempts: u32,
        next_eligible_at: Option<i64>,
        error: String,
    },
    /// An item left the queue for the dead-letter list.
    Abandoned {
        item_id: String,
        reason: DeadLetterReason,
        attempts: u32,
        error: String,
    },
    /// A concurrent edit was reconciled.
    ConflictResolved(ConflictResolution),
    /// Current number of pending items.
    QueueSize { size: usize },
    /// A pass finished.
    PassCompleted {
        synced: usize,
        failed: usize,
        conflicts: usize,
        cancelled: bool,
    },
}

impl SyncEvent {
    /// Short name used for storage and log fields.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Enqueued { .. } => "enqueued",
            Self::Synced { .. } => "synced",
            Self::Failed { .. } => "failed",
            Self::Abandoned { .. } => "abandoned",
            Self::ConflictResolved(_) => "conflict_resolved",
            Self::QueueSize { .. } => "queue_size",
            Self::PassCompleted { .. } => "pass_completed",
        }
    }

    /// Queue item the event refers to, if any.
    #[must_use]
    pub fn item_id(&self) -> Option<&str> {
        match self {
            Self::Enqueued { item_id, .. }
            | Self::Synced { item_id }
            | Self::Failed { item_id, .. }
            | Self::Abandoned { item_id, .. } => Some(item_id),
            Self::ConflictResolved(resolution) => Some(&resolution.queue_item_id),
            Self::QueueSize { .. } | Self::PassCompleted { .. } => None,
        }
    }
}

/// Receiver for engine events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &SyncEvent);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn emit(&self, event: &SyncEvent) {
        (**self).emit(event);
    }
}

impl<T: EventSink + ?Sized> EventSink for Box<T> {
    fn emit(&self, event: &SyncEvent) {
        (**self).emit(event);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &SyncEvent) {}
}

/// Writes events to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &SyncEvent) {
        match event {
            SyncEvent::Failed {
                item_id,
                attempts,
                error,
                ..
            } => warn!(item_id = %item_id, attempts, error = %error, "Upload failed"),
            SyncEvent::Abandoned {
                item_id,
                reason,
                error,
                ..
            } => warn!(
                item_id = %item_id,
                reason = reason.as_str(),
                error = %error,
                "Item dead-lettered"
            ),
            SyncEvent::PassCompleted {
                synced,
                failed,
                conflicts,
                ..
            } => info!(synced, failed, conflicts, "Sync pass complete"),
            other => debug!(event = other.kind(), item_id = other.item_id(), "Sync event"),
        }
    }
}

/// Keeps every event in memory, in order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<SyncEvent>>,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything received so far.
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Number of events of the given kind.
    pub fn count(&self, kind: &str) -> usize {
        self.events().iter().filter(|e| e.kind() == kind).count()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: &SyncEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Forwards every event to several sinks.
pub struct FanoutSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl FanoutSink {
    #[must_use]
    pub fn new(sinks: Vec<Box<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: &SyncEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_sink_counts_kinds() {
        let sink = CollectingSink::new();
        sink.emit(&SyncEvent::Synced {
            item_id: "sq_1".into(),
        });
        sink.emit(&SyncEvent::QueueSize { size: 0 });
        sink.emit(&SyncEvent::Synced {
            item_id: "sq_2".into(),
        });

        assert_eq!(sink.count("synced"), 2);
        assert_eq!(sink.count("queue_size"), 1);
        assert_eq!(sink.events()[1].item_id(), None);
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let a = Arc::new(CollectingSink::new());
        let b = Arc::new(CollectingSink::new());
        let fanout = FanoutSink::new(vec![
            Box::new(a.clone()),
            Box::new(b.clone()),
            Box::new(NullSink),
        ]);

        fanout.emit(&SyncEvent::QueueSize { size: 3 });
        assert_eq!(a.events().len(), 1);
        assert_eq!(b.events().len(), 1);
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let json = serde_json::to_value(SyncEvent::Failed {
            item_id: "sq_1".into(),
            attempts: 2,
            next_eligible_at: Some(3_000),
            error: "timeout".into(),
        })
        .unwrap();
        assert_eq!(json["event"], "failed");
        assert_eq!(json["attempts"], 2);
    }
}
