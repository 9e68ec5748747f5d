//! Event dispatch loop
//!
//! The process's top-level loop. It suspends on the two notification
//! sources (presence edges and shell-session termination) and routes each
//! wake-up: the shell supervisor is serviced first, then at most one
//! pending presence event is handed to the controller. When both sources
//! fire at once, both are serviced before re-blocking, so neither starves
//! the other. The loop itself never blocks on storage operations beyond
//! the controller's synchronous connect/mount path.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::console::ShellSessionSupervisor;
use crate::medium::{MediumController, PresenceEvent};

/// Top-level dispatch loop
pub struct EventDispatchLoop {
    events: mpsc::Receiver<PresenceEvent>,
    controller: Arc<MediumController>,
    supervisor: ShellSessionSupervisor,
}

impl EventDispatchLoop {
    /// Create the loop over the presence channel and the supervisor
    pub fn new(
        events: mpsc::Receiver<PresenceEvent>,
        controller: Arc<MediumController>,
        supervisor: ShellSessionSupervisor,
    ) -> Self {
        Self {
            events,
            controller,
            supervisor,
        }
    }

    /// Run until shutdown or until the presence channel closes
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Dispatch loop started");

        // First iteration brings up the initial shell session before any
        // event has fired.
        self.supervisor.tick().await;

        loop {
            let mut pending = None;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.supervisor.session_closed() => {}
                event = self.events.recv() => match event {
                    Some(event) => pending = Some(event),
                    None => break,
                },
            }

            // Session check first, then event dispatch. A presence event
            // that arrived while we were woken for the session (or the
            // other way around) is drained in the same iteration.
            self.supervisor.tick().await;

            let event = match pending.take() {
                Some(event) => Some(event),
                None => self.events.try_recv().ok(),
            };

            if let Some(event) = event {
                debug!("Dispatching {:?}", event);
                match event {
                    PresenceEvent::Inserted => self.controller.on_insertion().await,
                    PresenceEvent::Removed => self.controller.on_removal().await,
                }
            }
        }

        info!("Dispatch loop stopping");
        self.supervisor.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::transport::{ConsoleIo, ConsoleTransport};
    use crate::error::{AppError, Result};
    use crate::events::EventBus;
    use crate::medium::{BlockTransport, MediumState};
    use crate::probe::MediumProbe;
    use crate::state::AppState;
    use crate::utils::TaskRegistry;
    use crate::volume::{DirEntry, Volume, VolumeStats};
    use async_trait::async_trait;
    use std::io;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;

    struct NullProbe;
    impl MediumProbe for NullProbe {
        fn is_present(&self) -> Result<bool> {
            Ok(true)
        }
        fn is_protected(&self) -> Result<bool> {
            Ok(false)
        }
    }

    #[derive(Default)]
    struct MockTransport {
        fail_connect: AtomicBool,
        connects: AtomicU32,
        disconnects: AtomicU32,
    }

    #[async_trait]
    impl BlockTransport for MockTransport {
        async fn connect(&self) -> Result<()> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.fail_connect.load(Ordering::SeqCst) {
                Err(AppError::TransportConnect("unresponsive".to_string()))
            } else {
                Ok(())
            }
        }
        async fn disconnect(&self) -> Result<()> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockVolume {
        fail_mount: AtomicBool,
    }

    #[async_trait]
    impl Volume for MockVolume {
        async fn mount(&self) -> Result<()> {
            if self.fail_mount.load(Ordering::SeqCst) {
                Err(AppError::Mount("bad superblock".to_string()))
            } else {
                Ok(())
            }
        }
        fn read_dir(&self, _path: &str) -> Result<Vec<DirEntry>> {
            Ok(Vec::new())
        }
        fn stats(&self) -> Result<VolumeStats> {
            Ok(VolumeStats {
                total_bytes: 0,
                free_bytes: 0,
                block_size: 1,
            })
        }
    }

    /// Reader that stays open (timeouts only) so the session outlives the test
    struct HeldOpen;
    impl io::Read for HeldOpen {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            std::thread::sleep(Duration::from_millis(5));
            Err(io::Error::from(io::ErrorKind::TimedOut))
        }
    }

    struct HeldConsole;
    impl ConsoleTransport for HeldConsole {
        fn open(&self) -> Result<ConsoleIo> {
            Ok(ConsoleIo {
                reader: Box::new(HeldOpen),
                writer: Box::new(io::sink()),
            })
        }
    }

    struct Rig {
        tx: mpsc::Sender<PresenceEvent>,
        controller: Arc<MediumController>,
        transport: Arc<MockTransport>,
        shutdown: CancellationToken,
        handle: tokio::task::JoinHandle<()>,
    }

    fn rig() -> Rig {
        let transport = Arc::new(MockTransport::default());
        let volume = Arc::new(MockVolume::default());
        let controller = Arc::new(MediumController::new(transport.clone(), volume));
        let state = AppState::new(
            controller.clone(),
            Arc::new(NullProbe),
            Arc::new(MockVolume::default()),
            Arc::new(TaskRegistry::new()),
            Arc::new(EventBus::new()),
        );
        let shutdown = CancellationToken::new();
        let supervisor =
            ShellSessionSupervisor::new(Arc::new(HeldConsole), state, shutdown.clone());
        let (tx, rx) = mpsc::channel(8);
        let dispatch = EventDispatchLoop::new(rx, controller.clone(), supervisor);
        let handle = tokio::spawn(dispatch.run(shutdown.clone()));
        Rig {
            tx,
            controller,
            transport,
            shutdown,
            handle,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_insert_event_reaches_ready() {
        let rig = rig();
        rig.tx.send(PresenceEvent::Inserted).await.unwrap();
        settle().await;

        assert_eq!(rig.controller.state(), MediumState::Ready);
        assert!(rig.controller.is_ready());

        rig.shutdown.cancel();
        rig.handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_then_remove_in_order() {
        let rig = rig();
        rig.tx.send(PresenceEvent::Inserted).await.unwrap();
        rig.tx.send(PresenceEvent::Removed).await.unwrap();
        settle().await;

        assert_eq!(rig.controller.state(), MediumState::Absent);
        assert!(!rig.controller.is_ready());
        // The insertion was not skipped on the way to Absent
        assert_eq!(rig.controller.status().attempts, 1);
        assert_eq!(rig.transport.connects.load(Ordering::SeqCst), 1);

        rig.shutdown.cancel();
        rig.handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_repeated_cycles_track_the_table() {
        let rig = rig();
        for _ in 0..3 {
            rig.tx.send(PresenceEvent::Inserted).await.unwrap();
            settle().await;
            assert_eq!(rig.controller.state(), MediumState::Ready);
            rig.tx.send(PresenceEvent::Removed).await.unwrap();
            settle().await;
            assert_eq!(rig.controller.state(), MediumState::Absent);
        }
        assert_eq!(rig.controller.status().attempts, 3);
        assert_eq!(rig.controller.status().successes, 3);

        rig.shutdown.cancel();
        rig.handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_failure_absorbed_loop_stays_up() {
        let rig = rig();
        rig.transport.fail_connect.store(true, Ordering::SeqCst);
        rig.tx.send(PresenceEvent::Inserted).await.unwrap();
        settle().await;
        assert_eq!(rig.controller.state(), MediumState::ConnectFailed);

        // Loop is still dispatching: a re-seat recovers
        rig.transport.fail_connect.store(false, Ordering::SeqCst);
        rig.tx.send(PresenceEvent::Removed).await.unwrap();
        rig.tx.send(PresenceEvent::Inserted).await.unwrap();
        settle().await;
        assert_eq!(rig.controller.state(), MediumState::Ready);

        rig.shutdown.cancel();
        rig.handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_loop_exits_when_channel_closes() {
        let rig = rig();
        drop(rig.tx);
        rig.handle.await.unwrap();
    }
}
