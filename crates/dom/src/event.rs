use serde::Serialize;
use serde_json::Value;

/// A `CustomEvent` dispatched on the window: a type plus a JSON `detail`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub event_type: String,
    pub detail: Value,
}

impl Event {
    pub fn new(event_type: impl Into<String>, detail: Value) -> Self {
        Self {
            event_type: event_type.into(),
            detail,
        }
    }
}

/// Identifies a registered listener so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);
