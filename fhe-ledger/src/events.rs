//! Events emitted for external observers (dashboards, indexers).

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::{Address, OperationId, RequestId, TargetId, VariableId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    VariableCreated {
        id: VariableId,
        name: String,
        timestamp_ms: u64,
    },
    OperationPerformed {
        id: OperationId,
        timestamp_ms: u64,
    },
    ResultRequested {
        request_id: RequestId,
        target: TargetId,
    },
    ResultDecrypted {
        target: TargetId,
    },
    AccessGranted {
        target: TargetId,
        grantee: Address,
    },
}

/// Receives events after the mutation they describe has been applied.
/// Sinks cannot fail the transaction that produced the event.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &LedgerEvent);
}

#[derive(Clone, Debug, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: &LedgerEvent) {}
}

/// In-memory event log; observers poll or drain it.
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    events: Mutex<Vec<LedgerEvent>>,
}

impl MemoryEventLog {
    pub fn snapshot(&self) -> Vec<LedgerEvent> {
        self.events.lock().clone()
    }

    pub fn drain(&self) -> Vec<LedgerEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for MemoryEventLog {
    fn emit(&self, event: &LedgerEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Fan-out sink.
pub struct CompositeEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl CompositeEventSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for CompositeEventSink {
    fn emit(&self, event: &LedgerEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_fans_out_and_drain_clears() {
        let first = Arc::new(MemoryEventLog::default());
        let second = Arc::new(MemoryEventLog::default());
        let sinks: Vec<Arc<dyn EventSink>> = vec![first.clone(), second.clone()];
        let sink = CompositeEventSink::new(sinks);
        sink.emit(&LedgerEvent::ResultDecrypted {
            target: TargetId::Variable(VariableId(1)),
        });
        assert_eq!(first.len(), 1);
        assert_eq!(second.drain().len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn events_serialize_with_tagged_targets() {
        let event = LedgerEvent::ResultRequested {
            request_id: RequestId(4),
            target: TargetId::Operation(OperationId(2)),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "result_requested");
        assert_eq!(json["target"], "op:2");
        assert_eq!(json["request_id"], 4);
    }
}
