//! System event types
//!
//! Defines all event types that can be broadcast through the event bus.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::medium::MediumState;

/// System event enumeration
///
/// All events are tagged with their event name for serialization, giving a
/// JSON structure like:
/// ```json
/// {"event": "medium_state_changed", "data": {"state": "ready", "ready": true}}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum SystemEvent {
    /// The lifecycle controller completed a transition
    MediumStateChanged {
        /// New lifecycle state
        state: MediumState,
        /// Derived service-ready flag
        ready: bool,
    },
    /// A new shell session was spawned on the console
    SessionStarted {
        /// Session id
        id: Uuid,
    },
    /// A shell session terminated and its resources were reclaimed
    SessionEnded {
        /// Session id
        id: Uuid,
    },
    /// The presence probe could not be read
    ProbeFault {
        /// Failure description
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_tag() {
        let event = SystemEvent::MediumStateChanged {
            state: MediumState::Ready,
            ready: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"medium_state_changed\""));
        assert!(json.contains("\"state\":\"ready\""));
    }
}
