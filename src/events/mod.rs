//! Event system for state notifications
//!
//! This module provides a broadcast event bus carrying lifecycle and session
//! events to any interested subscriber (the event logger task, tests).

pub mod types;

pub use types::SystemEvent;

use tokio::sync::broadcast;

/// Event channel capacity (ring buffer size)
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Broadcast bus for system events
///
/// Uses tokio's broadcast channel to distribute events to all active
/// subscribers. Publishing with no subscribers silently drops the event;
/// events are fire-and-forget notifications.
pub struct EventBus {
    tx: broadcast::Sender<SystemEvent>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: SystemEvent) {
        // send returns Err when there are no subscribers, which is normal
        let _ = self.tx.send(event);
    }

    /// Subscribe to events
    ///
    /// The receiver uses a ring buffer; a subscriber that falls too far
    /// behind receives a `Lagged` error and misses events.
    pub fn subscribe(&self) -> broadcast::Receiver<SystemEvent> {
        self.tx.subscribe()
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
