//! Medium lifecycle controller
//!
//! Owns the attach/detach state machine for the removable medium and is its
//! only writer. Presence events reach it from the dispatch loop's task
//! context; every other task observes the lifecycle through the lock-free
//! ready flag or the diagnostic snapshot.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::transport::BlockTransport;
use super::types::{MediumState, MediumStatus};
use crate::events::{EventBus, SystemEvent};
use crate::volume::Volume;

/// Attach/detach lifecycle controller
///
/// Transition table:
/// ```text
/// Absent --insert,connect_ok,mount_ok--> Ready
/// Absent --insert,connect_fail---------> ConnectFailed
/// Absent --insert,connect_ok,mount_fail-> MountFailed   (transport released)
/// Ready/ConnectFailed/MountFailed --remove--> Absent
/// ```
/// `Absent` is initial; there is no terminal state.
pub struct MediumController {
    transport: Arc<dyn BlockTransport>,
    volume: Arc<dyn Volume>,
    /// Lifecycle state; written only from the dispatch loop's task context
    state: RwLock<MediumState>,
    /// Derived service-ready flag, lock-free for readers
    ready: AtomicBool,
    /// Event bus for state-change notifications (optional)
    events: RwLock<Option<Arc<EventBus>>>,
    attempts: AtomicU64,
    successes: AtomicU64,
    connect_failures: AtomicU64,
    mount_failures: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl MediumController {
    /// Create a controller in the `Absent` state
    pub fn new(transport: Arc<dyn BlockTransport>, volume: Arc<dyn Volume>) -> Self {
        Self {
            transport,
            volume,
            state: RwLock::new(MediumState::Absent),
            ready: AtomicBool::new(false),
            events: RwLock::new(None),
            attempts: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            connect_failures: AtomicU64::new(0),
            mount_failures: AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }

    /// Set the event bus for broadcasting state changes
    pub fn set_event_bus(&self, events: Arc<EventBus>) {
        *self.events.write() = Some(events);
    }

    /// Whether filesystem operations may currently be attempted
    ///
    /// Lock-free; callable from any task. Readers get single-writer,
    /// eventually-consistent semantics: a value read here may be one
    /// transition stale by the time it is used, and any I/O issued on its
    /// strength must tolerate [`crate::AppError::Detached`].
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Current lifecycle state
    pub fn state(&self) -> MediumState {
        *self.state.read()
    }

    /// Diagnostic snapshot for the `card` command; never mutates state
    pub fn status(&self) -> MediumStatus {
        MediumStatus {
            state: *self.state.read(),
            ready: self.ready.load(Ordering::Acquire),
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            mount_failures: self.mount_failures.load(Ordering::Relaxed),
            last_error: self.last_error.lock().clone(),
        }
    }

    /// Handle a medium-inserted event
    ///
    /// Idempotent-safe: a call while `Ready` counts the attempt but performs
    /// no second connect. Connect and mount failures are absorbed into the
    /// state, never propagated; recovery is driven by the next insertion
    /// event.
    pub async fn on_insertion(&self) {
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;

        if self.is_ready() {
            debug!("Insertion while already in service, ignoring");
            return;
        }

        info!("Medium inserted, connecting (attempt {})", attempt);

        if let Err(e) = self.transport.connect().await {
            warn!("Connect failed: {}", e);
            self.connect_failures.fetch_add(1, Ordering::Relaxed);
            *self.last_error.lock() = Some(e.to_string());
            self.transition(MediumState::ConnectFailed);
            return;
        }

        match self.volume.mount().await {
            Ok(()) => {
                self.successes.fetch_add(1, Ordering::Relaxed);
                *self.last_error.lock() = None;
                self.transition(MediumState::Ready);
                info!("Medium in service");
            }
            Err(e) => {
                warn!("Mount failed: {}", e);
                self.mount_failures.fetch_add(1, Ordering::Relaxed);
                *self.last_error.lock() = Some(e.to_string());
                // The transport must not stay connected behind a failed
                // mount; release it exactly once.
                self.transition(MediumState::Disconnecting);
                if let Err(e) = self.transport.disconnect().await {
                    warn!("Disconnect after mount failure: {}", e);
                }
                self.transition(MediumState::MountFailed);
            }
        }
    }

    /// Handle a medium-removed event
    ///
    /// Unconditionally takes the medium out of service. No unmount or
    /// disconnect is issued: the hardware may already be physically gone,
    /// and any operation in flight against it fails with an I/O error
    /// rather than blocking.
    pub async fn on_removal(&self) {
        if *self.state.read() == MediumState::Absent {
            debug!("Removal while already absent, ignoring");
            return;
        }
        info!("Medium removed, out of service");
        self.transition(MediumState::Absent);
    }

    fn transition(&self, next: MediumState) {
        {
            let mut state = self.state.write();
            *state = next;
            // Flag update stays inside the state critical section so no
            // snapshot can pair the new state with the old flag.
            self.ready
                .store(next == MediumState::Ready, Ordering::Release);
        }
        if let Some(ref events) = *self.events.read() {
            events.publish(SystemEvent::MediumStateChanged {
                state: next,
                ready: next == MediumState::Ready,
            });
        }
    }
}
