//! Diagnostic shell commands
//!
//! Every command takes zero arguments, reports on demand, and is idempotent.
//! Commands are read-only observers of the lifecycle: they never mutate
//! controller state, and a command caught by an asynchronous removal
//! surfaces the I/O error as text instead of crashing the session.

use std::io::{self, Write};

use crate::error::AppError;
use crate::state::AppState;
use crate::volume::Volume;

/// What the session loop should do after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Keep the session alive
    Continue,
    /// Terminate the session (the supervisor respawns a fresh one)
    Exit,
}

/// Parse and run one input line
///
/// I/O errors from `out` propagate (the console is gone, the session ends);
/// everything else is reported as text.
pub fn dispatch(line: &str, out: &mut impl Write, state: &AppState) -> io::Result<CommandOutcome> {
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else {
        return Ok(CommandOutcome::Continue);
    };
    let has_args = words.next().is_some();

    match cmd {
        "mem" | "threads" | "tree" | "card" | "help" | "exit" if has_args => {
            write!(out, "Usage: {}\r\n", cmd)?;
        }
        "mem" => cmd_mem(out)?,
        "threads" => cmd_threads(out, state)?,
        "tree" => cmd_tree(out, state)?,
        "card" => cmd_card(out, state)?,
        "help" => {
            write!(out, "commands: mem threads tree card help exit\r\n")?;
        }
        "exit" => return Ok(CommandOutcome::Exit),
        other => {
            write!(out, "{}: unknown command (try 'help')\r\n", other)?;
        }
    }
    Ok(CommandOutcome::Continue)
}

/// `mem`: system and process memory figures
fn cmd_mem(out: &mut impl Write) -> io::Result<()> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").unwrap_or_default();
    let status = std::fs::read_to_string("/proc/self/status").unwrap_or_default();

    write!(
        out,
        "mem total     : {} KiB\r\n",
        kib_field(&meminfo, "MemTotal").unwrap_or(0)
    )?;
    write!(
        out,
        "mem free      : {} KiB\r\n",
        kib_field(&meminfo, "MemFree").unwrap_or(0)
    )?;
    write!(
        out,
        "mem available : {} KiB\r\n",
        kib_field(&meminfo, "MemAvailable").unwrap_or(0)
    )?;
    write!(
        out,
        "process rss   : {} KiB\r\n",
        kib_field(&status, "VmRSS").unwrap_or(0)
    )?;
    Ok(())
}

/// Extract a `Key:   1234 kB` figure from /proc-style text
fn kib_field(content: &str, key: &str) -> Option<u64> {
    content
        .lines()
        .find(|l| l.starts_with(key) && l[key.len()..].starts_with(':'))
        .and_then(|l| l[key.len() + 1..].split_whitespace().next())
        .and_then(|v| v.parse().ok())
}

/// `threads`: registered task listing
fn cmd_threads(out: &mut impl Write, state: &AppState) -> io::Result<()> {
    write!(out, "up {}s\r\n", state.started_at.elapsed().as_secs())?;
    write!(out, "{:<16} {:<9} uptime\r\n", "name", "state")?;
    for task in state.tasks.snapshot() {
        write!(
            out,
            "{:<16} {:<9} {}s\r\n",
            task.name,
            if task.running { "running" } else { "finished" },
            task.uptime.as_secs()
        )?;
    }
    Ok(())
}

/// `tree`: free-space summary plus recursive file listing
fn cmd_tree(out: &mut impl Write, state: &AppState) -> io::Result<()> {
    if !state.controller.is_ready() {
        write!(out, "File System not mounted\r\n")?;
        return Ok(());
    }

    match state.volume.stats() {
        Ok(stats) => {
            let cluster = stats.block_size.max(1);
            write!(
                out,
                "FS: {} free clusters, {} bytes per cluster, {} bytes free\r\n",
                stats.free_bytes / cluster,
                cluster,
                stats.free_bytes
            )?;
        }
        Err(e) => {
            write!(out, "FS: stats failed: {}\r\n", surface(e, state))?;
            return Ok(());
        }
    }

    let mut path = String::new();
    if let Err(e) = scan_files(out, state.volume.as_ref(), &mut path) {
        match e {
            ScanError::Console(io) => return Err(io),
            ScanError::Volume(e) => write!(out, "FS: listing failed: {}\r\n", surface(e, state))?,
        }
    }
    Ok(())
}

enum ScanError {
    /// Console writer failed; ends the session
    Console(io::Error),
    /// Volume read failed; reported as text
    Volume(AppError),
}

/// Walk the volume depth-first, printing leaf paths
///
/// Containers recurse, leaves print. Dotted names are skipped, matching the
/// 8.3-volume convention of hiding metadata entries. Terminates on any real
/// (cycle-free) tree; a corrupted volume surfaces as a read error from the
/// collaborator rather than a hang.
fn scan_files(out: &mut impl Write, volume: &dyn Volume, path: &mut String) -> Result<(), ScanError> {
    let entries = volume
        .read_dir(if path.is_empty() { "/" } else { path })
        .map_err(ScanError::Volume)?;
    for entry in entries {
        if entry.name.starts_with('.') {
            continue;
        }
        if entry.is_dir {
            let len = path.len();
            path.push('/');
            path.push_str(&entry.name);
            scan_files(out, volume, path)?;
            path.truncate(len);
        } else {
            write!(out, "{}/{}\r\n", path, entry.name).map_err(ScanError::Console)?;
        }
    }
    Ok(())
}

/// `card`: probe readings, lifecycle state, and attach counters
fn cmd_card(out: &mut impl Write, state: &AppState) -> io::Result<()> {
    match state.probe.is_present() {
        Ok(present) => write!(out, "inserted  : {}\r\n", if present { 1 } else { 0 })?,
        Err(e) => write!(out, "inserted  : read failed ({})\r\n", e)?,
    }
    match state.probe.is_protected() {
        Ok(protected) => write!(out, "protected : {}\r\n", if protected { 1 } else { 0 })?,
        Err(e) => write!(out, "protected : read failed ({})\r\n", e)?,
    }

    let status = state.controller.status();
    write!(out, "state     : {}\r\n", status.state.name_str())?;
    write!(
        out,
        "attempts {}, ok {}, connect-failed {}, mount-failed {}\r\n",
        status.attempts, status.successes, status.connect_failures, status.mount_failures
    )?;
    if let Some(ref err) = status.last_error {
        write!(out, "last error: {}\r\n", err)?;
    }
    Ok(())
}

/// Reclassify a volume error that raced a removal
///
/// The ready check and the I/O are not transactional; when the flag has
/// dropped by the time the error is reported, the operator should see a
/// detach, not a bare I/O failure.
fn surface(e: AppError, state: &AppState) -> AppError {
    if state.controller.is_ready() {
        e
    } else {
        AppError::Detached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::events::EventBus;
    use crate::medium::{BlockTransport, MediumController};
    use crate::probe::MediumProbe;
    use crate::utils::TaskRegistry;
    use crate::volume::{DirEntry, VolumeStats};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct FakeProbe {
        present: AtomicBool,
    }

    impl MediumProbe for FakeProbe {
        fn is_present(&self) -> Result<bool> {
            Ok(self.present.load(Ordering::Relaxed))
        }
        fn is_protected(&self) -> Result<bool> {
            Ok(false)
        }
    }

    struct OkTransport;

    #[async_trait]
    impl BlockTransport for OkTransport {
        async fn connect(&self) -> Result<()> {
            Ok(())
        }
        async fn disconnect(&self) -> Result<()> {
            Ok(())
        }
    }

    struct TreeVolume {
        detached: AtomicBool,
    }

    #[async_trait]
    impl Volume for TreeVolume {
        async fn mount(&self) -> Result<()> {
            Ok(())
        }

        fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
            if self.detached.load(Ordering::Relaxed) {
                return Err(AppError::Io(std::io::Error::from(
                    std::io::ErrorKind::NotConnected,
                )));
            }
            match path {
                "/" => Ok(vec![
                    DirEntry {
                        name: "logs".to_string(),
                        is_dir: true,
                    },
                    DirEntry {
                        name: "boot.cfg".to_string(),
                        is_dir: false,
                    },
                    DirEntry {
                        name: ".metadata".to_string(),
                        is_dir: false,
                    },
                ]),
                "/logs" => Ok(vec![DirEntry {
                    name: "sys.log".to_string(),
                    is_dir: false,
                }]),
                _ => Ok(Vec::new()),
            }
        }

        fn stats(&self) -> Result<VolumeStats> {
            Ok(VolumeStats {
                total_bytes: 1 << 30,
                free_bytes: 8192,
                block_size: 4096,
            })
        }
    }

    fn rig() -> (Arc<TreeVolume>, Arc<AppState>) {
        let probe = Arc::new(FakeProbe {
            present: AtomicBool::new(true),
        });
        let volume = Arc::new(TreeVolume {
            detached: AtomicBool::new(false),
        });
        let controller = Arc::new(MediumController::new(Arc::new(OkTransport), volume.clone()));
        let state = AppState::new(
            controller,
            probe,
            volume.clone(),
            Arc::new(TaskRegistry::new()),
            Arc::new(EventBus::new()),
        );
        (volume, state)
    }

    fn run(line: &str, state: &AppState) -> (String, CommandOutcome) {
        let mut out = Vec::new();
        let outcome = dispatch(line, &mut out, state).unwrap();
        (String::from_utf8(out).unwrap(), outcome)
    }

    #[test]
    fn test_kib_field_parsing() {
        let text = "MemTotal:  1024 kB\nMemFree:     512 kB\nVmRSS:\t  64 kB\n";
        assert_eq!(kib_field(text, "MemTotal"), Some(1024));
        assert_eq!(kib_field(text, "MemFree"), Some(512));
        assert_eq!(kib_field(text, "VmRSS"), Some(64));
        assert_eq!(kib_field(text, "Mem"), None);
        assert_eq!(kib_field(text, "MemAvailable"), None);
    }

    #[tokio::test]
    async fn test_tree_not_mounted() {
        let (_volume, state) = rig();
        let (output, outcome) = run("tree", &state);
        assert!(output.contains("File System not mounted"));
        assert_eq!(outcome, CommandOutcome::Continue);
    }

    #[tokio::test]
    async fn test_tree_lists_leaves_recursively() {
        let (_volume, state) = rig();
        state.controller.on_insertion().await;

        let (output, _) = run("tree", &state);
        assert!(output.contains("FS: 2 free clusters, 4096 bytes per cluster, 8192 bytes free"));
        assert!(output.contains("/boot.cfg"));
        assert!(output.contains("/logs/sys.log"));
        assert!(!output.contains(".metadata"));
    }

    #[tokio::test]
    async fn test_tree_reports_volume_error_while_ready() {
        let (volume, state) = rig();
        state.controller.on_insertion().await;

        volume.detached.store(true, Ordering::Relaxed);
        let (output, outcome) = run("tree", &state);
        assert!(output.contains("listing failed"));
        assert_eq!(outcome, CommandOutcome::Continue);
    }

    #[tokio::test]
    async fn test_volume_error_after_removal_maps_to_detached() {
        let (_volume, state) = rig();
        state.controller.on_insertion().await;
        state.controller.on_removal().await;

        // A command that checked the flag before the removal sees its I/O
        // failure reclassified once the flag is down
        let err = surface(
            AppError::Io(std::io::Error::from(std::io::ErrorKind::NotConnected)),
            &state,
        );
        assert!(matches!(err, AppError::Detached));
    }

    #[tokio::test]
    async fn test_card_reports_counters() {
        let (_volume, state) = rig();
        state.controller.on_insertion().await;

        let (output, _) = run("card", &state);
        assert!(output.contains("inserted  : 1"));
        assert!(output.contains("protected : 0"));
        assert!(output.contains("state     : ready"));
        assert!(output.contains("attempts 1, ok 1, connect-failed 0, mount-failed 0"));
    }

    #[tokio::test]
    async fn test_zero_arg_commands_reject_arguments() {
        let (_volume, state) = rig();
        let (output, _) = run("card now", &state);
        assert_eq!(output, "Usage: card\r\n");
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let (_volume, state) = rig();
        let (output, _) = run("reboot", &state);
        assert!(output.contains("unknown command"));
    }

    #[tokio::test]
    async fn test_exit_ends_session() {
        let (_volume, state) = rig();
        let (_, outcome) = run("exit", &state);
        assert_eq!(outcome, CommandOutcome::Exit);
    }

    #[tokio::test]
    async fn test_mem_reports_figures() {
        let (_volume, state) = rig();
        let (output, _) = run("mem", &state);
        assert!(output.contains("mem total"));
        assert!(output.contains("process rss"));
    }

    #[tokio::test]
    async fn test_threads_lists_registered_tasks() {
        let (_volume, state) = rig();
        let _guard = state.tasks.register("dispatch");
        let (output, _) = run("threads", &state);
        assert!(output.contains("dispatch"));
        assert!(output.contains("running"));
    }
}
