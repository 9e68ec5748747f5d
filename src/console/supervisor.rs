//! Shell session supervisor
//!
//! Keeps exactly one interactive session alive on the console: spawns one
//! when none is held, and reclaims a terminated one before spawning its
//! replacement. Single consumer: only the dispatch loop calls `tick`.

use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::session::ShellSession;
use super::transport::ConsoleTransport;
use crate::events::SystemEvent;
use crate::state::AppState;

/// Respawning supervisor for the single console session
pub struct ShellSessionSupervisor {
    transport: Arc<dyn ConsoleTransport>,
    state: Arc<AppState>,
    session: Option<ShellSession>,
    notify: Arc<Notify>,
    shutdown: CancellationToken,
}

impl ShellSessionSupervisor {
    /// Create a supervisor with no session yet
    pub fn new(
        transport: Arc<dyn ConsoleTransport>,
        state: Arc<AppState>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            transport,
            state,
            session: None,
            notify: Arc::new(Notify::new()),
            shutdown,
        }
    }

    /// Resolve when the current session's command loop has returned
    ///
    /// A termination that fires while nobody is waiting is latched, so the
    /// dispatch loop cannot miss it between iterations.
    pub async fn session_closed(&self) {
        self.notify.notified().await;
    }

    /// Whether a session handle is currently held (live or awaiting reclaim)
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Spawn or reclaim as needed
    ///
    /// Holding a live handle is a no-op: the supervisor never spawns a
    /// second session, and never reclaims a handle whose task is still
    /// running.
    pub async fn tick(&mut self) {
        if let Some(session) = self.session.take() {
            if !session.is_closed() {
                self.session = Some(session);
                return;
            }
            let id = session.id;
            session.reclaim().await;
            self.state.tasks.prune_finished("shell");
            self.publish(SystemEvent::SessionEnded { id });
            info!("Shell session {} ended, respawning", id);
        }

        match ShellSession::spawn(
            self.transport.as_ref(),
            self.state.clone(),
            self.notify.clone(),
            self.shutdown.child_token(),
        ) {
            Ok(session) => {
                self.publish(SystemEvent::SessionStarted { id: session.id });
                self.session = Some(session);
            }
            Err(e) => {
                // Console may be temporarily unavailable; the next wake
                // retries.
                warn!("Failed to spawn shell session: {}", e);
            }
        }
    }

    /// Stop and reclaim the session when the loop unwinds
    pub async fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop().await;
        }
    }

    fn publish(&self, event: SystemEvent) {
        self.state.events.publish(event);
    }
}
