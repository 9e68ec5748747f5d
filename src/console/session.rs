//! Shell session
//!
//! One lifetime of the interactive command loop, bound to the console
//! transport. The loop does blocking reads, so it runs on a blocking worker
//! rather than the cooperative executor; timeouts on the console port keep
//! it responsive to shutdown.

use chrono::{DateTime, Utc};
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::commands::{self, CommandOutcome};
use super::transport::{ConsoleIo, ConsoleTransport};
use crate::error::Result;
use crate::state::AppState;

/// Shell prompt
const PROMPT: &str = "card> ";

/// Owned handle to one running shell session
///
/// At most one of these exists at a time (enforced by the supervisor). The
/// handle must only be reclaimed after the task has terminated.
pub struct ShellSession {
    /// Session id
    pub id: Uuid,
    /// Spawn time
    pub started_at: DateTime<Utc>,
    handle: JoinHandle<()>,
    closed: Arc<AtomicBool>,
    stop: CancellationToken,
}

impl ShellSession {
    /// Open the console and spawn the session task
    ///
    /// `notify` is signalled when the command loop returns, waking the
    /// dispatch loop so the supervisor can reclaim and respawn. `stop`
    /// terminates this session without touching its siblings; the
    /// supervisor derives it from the process shutdown token.
    pub fn spawn(
        transport: &dyn ConsoleTransport,
        state: Arc<AppState>,
        notify: Arc<Notify>,
        stop: CancellationToken,
    ) -> Result<Self> {
        let io = transport.open()?;
        let id = Uuid::new_v4();
        let closed = Arc::new(AtomicBool::new(false));

        let task_closed = closed.clone();
        let task_stop = stop.clone();
        let guard = state.tasks.register("shell");
        let handle = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            run_session(id, io, state, task_stop);
            task_closed.store(true, Ordering::Release);
            notify.notify_one();
        });

        info!("Shell session {} started", id);
        Ok(Self {
            id,
            started_at: Utc::now(),
            handle,
            closed,
            stop,
        })
    }

    /// Whether the command loop has returned
    ///
    /// `true` here means the session will never touch the console again;
    /// the remaining task body is the termination signal itself.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.handle.is_finished()
    }

    /// Wait for the task to terminate and release its resources
    ///
    /// Must only be called once [`is_closed`](Self::is_closed) reports true.
    pub async fn reclaim(self) {
        let _ = self.handle.await;
        debug!("Shell session {} reclaimed", self.id);
    }

    /// Terminate the session and wait for it to release its resources
    ///
    /// Safe on a live session: the command loop observes the token within
    /// one console read timeout.
    pub async fn stop(self) {
        self.stop.cancel();
        let _ = self.handle.await;
        debug!("Shell session {} stopped", self.id);
    }
}

/// Blocking command loop for one session
fn run_session(id: Uuid, io: ConsoleIo, state: Arc<AppState>, shutdown: CancellationToken) {
    let ConsoleIo {
        mut reader,
        mut writer,
    } = io;

    let banner = format!(
        "\r\ncardhost {} (session {})\r\ntype 'help' for commands\r\n{}",
        env!("CARGO_PKG_VERSION"),
        id,
        PROMPT
    );
    if writer.write_all(banner.as_bytes()).is_err() {
        return;
    }
    let _ = writer.flush();

    let mut line = String::new();
    let mut buf = [0u8; 64];
    let mut prev = 0u8;

    loop {
        if shutdown.is_cancelled() {
            debug!("Shell session {} stopping on shutdown", id);
            return;
        }

        let n = match reader.read(&mut buf) {
            Ok(0) => {
                debug!("Console closed, session {} ending", id);
                return;
            }
            Ok(n) => n,
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                continue;
            }
            Err(e) => {
                debug!("Console read failed ({}), session {} ending", e, id);
                return;
            }
        };

        for &byte in &buf[..n] {
            match byte {
                b'\n' if prev == b'\r' => {}
                b'\r' | b'\n' => {
                    if writer.write_all(b"\r\n").is_err() {
                        return;
                    }
                    let entered = line.trim().to_string();
                    line.clear();
                    if !entered.is_empty() {
                        match commands::dispatch(&entered, &mut writer, &state) {
                            Ok(CommandOutcome::Continue) => {}
                            Ok(CommandOutcome::Exit) => {
                                let _ = writer.write_all(b"bye\r\n");
                                let _ = writer.flush();
                                return;
                            }
                            Err(e) => {
                                debug!("Console write failed ({}), session {} ending", e, id);
                                return;
                            }
                        }
                    }
                    if writer.write_all(PROMPT.as_bytes()).is_err() {
                        return;
                    }
                }
                // Backspace / DEL
                0x08 | 0x7f => {
                    if line.pop().is_some() {
                        let _ = writer.write_all(b"\x08 \x08");
                    }
                }
                b if b.is_ascii_graphic() || b == b' ' => {
                    line.push(b as char);
                    let _ = writer.write_all(&[b]);
                }
                _ => {}
            }
            prev = byte;
        }
        let _ = writer.flush();
    }
}
