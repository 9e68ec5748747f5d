//! Presence watcher
//!
//! Polls the probe's card-detect line and turns level changes into
//! `PresenceEvent`s. Rapid toggles while a card is being seated are
//! coalesced by requiring a run of identical samples before an edge is
//! reported, so the dispatch loop sees exactly one event per physical
//! transition.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::MediumProbe;
use crate::config::WatcherConfig;
use crate::events::{EventBus, SystemEvent};
use crate::medium::PresenceEvent;
use crate::utils::LogThrottler;
use crate::warn_throttled;

/// Polling watcher for the card-detect line
pub struct PresenceWatcher {
    probe: Arc<dyn MediumProbe>,
    tx: mpsc::Sender<PresenceEvent>,
    events: Arc<EventBus>,
    config: WatcherConfig,
    throttler: LogThrottler,
}

impl PresenceWatcher {
    /// Create a watcher feeding `tx`
    pub fn new(
        probe: Arc<dyn MediumProbe>,
        tx: mpsc::Sender<PresenceEvent>,
        events: Arc<EventBus>,
        config: WatcherConfig,
    ) -> Self {
        Self {
            probe,
            tx,
            events,
            config,
            throttler: LogThrottler::default(),
        }
    }

    /// Run until shutdown or until the event channel closes
    ///
    /// The boot state is treated as absent: a card already seated when the
    /// daemon starts produces one `Inserted` edge after the debounce, so the
    /// medium reaches service without a physical re-seat.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms));
        let debounce = self.config.debounce_samples.max(1);

        let mut reported = false;
        let mut candidate = false;
        let mut stable = 0u32;

        info!(
            "Presence watcher started (poll {} ms, debounce {} samples)",
            self.config.poll_interval_ms, debounce
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Presence watcher stopping");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let present = match self.probe.is_present() {
                Ok(present) => {
                    self.throttler.clear("probe_read");
                    present
                }
                Err(e) => {
                    if self.throttler.should_log("probe_read") {
                        tracing::warn!("Probe read failed: {}", e);
                        self.events.publish(SystemEvent::ProbeFault {
                            message: e.to_string(),
                        });
                    }
                    continue;
                }
            };

            if present == reported {
                stable = 0;
                continue;
            }

            if present == candidate {
                stable += 1;
            } else {
                candidate = present;
                stable = 1;
            }

            if stable < debounce {
                continue;
            }

            reported = present;
            stable = 0;
            let event = if present {
                PresenceEvent::Inserted
            } else {
                PresenceEvent::Removed
            };
            debug!("Presence edge: {:?}", event);
            if self.tx.send(event).await.is_err() {
                warn_throttled!(self.throttler, "channel_closed", "Event channel closed");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeProbe {
        present: AtomicBool,
        fail: AtomicBool,
    }

    impl FakeProbe {
        fn new() -> Self {
            Self {
                present: AtomicBool::new(false),
                fail: AtomicBool::new(false),
            }
        }
    }

    impl MediumProbe for FakeProbe {
        fn is_present(&self) -> Result<bool> {
            if self.fail.load(Ordering::Relaxed) {
                return Err(crate::AppError::Gpio("line open".to_string()));
            }
            Ok(self.present.load(Ordering::Relaxed))
        }

        fn is_protected(&self) -> Result<bool> {
            Ok(false)
        }
    }

    fn watcher_config() -> WatcherConfig {
        WatcherConfig {
            poll_interval_ms: 10,
            debounce_samples: 2,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_then_remove_edges() {
        let probe = Arc::new(FakeProbe::new());
        let (tx, mut rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let watcher = PresenceWatcher::new(
            probe.clone(),
            tx,
            Arc::new(EventBus::new()),
            watcher_config(),
        );
        tokio::spawn(watcher.run(shutdown.clone()));

        probe.present.store(true, Ordering::Relaxed);
        assert_eq!(rx.recv().await, Some(PresenceEvent::Inserted));

        probe.present.store(false, Ordering::Relaxed);
        assert_eq!(rx.recv().await, Some(PresenceEvent::Removed));

        shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_steady_level_emits_nothing() {
        let probe = Arc::new(FakeProbe::new());
        let (tx, mut rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let watcher = PresenceWatcher::new(
            probe.clone(),
            tx,
            Arc::new(EventBus::new()),
            watcher_config(),
        );
        tokio::spawn(watcher.run(shutdown.clone()));

        // Absent at boot and staying absent: no event within plenty of polls
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());

        shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_card_seated_at_boot_emits_inserted_once() {
        let probe = Arc::new(FakeProbe::new());
        probe.present.store(true, Ordering::Relaxed);
        let (tx, mut rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let watcher = PresenceWatcher::new(
            probe.clone(),
            tx,
            Arc::new(EventBus::new()),
            watcher_config(),
        );
        tokio::spawn(watcher.run(shutdown.clone()));

        assert_eq!(rx.recv().await, Some(PresenceEvent::Inserted));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());

        shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_fault_publishes_event_and_keeps_running() {
        let probe = Arc::new(FakeProbe::new());
        probe.fail.store(true, Ordering::Relaxed);
        let bus = Arc::new(EventBus::new());
        let mut events = bus.subscribe();
        let (tx, mut rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let watcher = PresenceWatcher::new(probe.clone(), tx, bus.clone(), watcher_config());
        tokio::spawn(watcher.run(shutdown.clone()));

        assert!(matches!(
            events.recv().await.unwrap(),
            SystemEvent::ProbeFault { .. }
        ));

        // Recovery: line reads again, card seated
        probe.fail.store(false, Ordering::Relaxed);
        probe.present.store(true, Ordering::Relaxed);
        assert_eq!(rx.recv().await, Some(PresenceEvent::Inserted));

        shutdown.cancel();
    }
}
