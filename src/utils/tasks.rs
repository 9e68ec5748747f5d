//! Task registry
//!
//! Tracks the fixed set of long-running tasks (dispatch loop, indicator,
//! presence watcher) plus the current shell session, so the `threads`
//! console command can list them with state and uptime.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Snapshot of one registered task
#[derive(Debug, Clone)]
pub struct TaskInfo {
    /// Task name
    pub name: String,
    /// Whether the task is still running
    pub running: bool,
    /// Time since the task was registered
    pub uptime: Duration,
}

struct TaskEntry {
    name: String,
    started: Instant,
    done: Arc<AtomicBool>,
}

/// Registry of long-running tasks
///
/// Registration hands back a [`TaskGuard`]; the task is reported as running
/// until the guard is dropped. Finished entries stay listed so a crashed
/// task is visible from the console rather than silently missing.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: Mutex<Vec<TaskEntry>>,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task and return its liveness guard
    pub fn register(&self, name: &str) -> TaskGuard {
        let done = Arc::new(AtomicBool::new(false));
        self.tasks.lock().push(TaskEntry {
            name: name.to_string(),
            started: Instant::now(),
            done: done.clone(),
        });
        TaskGuard { done }
    }

    /// Remove finished entries matching `name`
    ///
    /// Used by the shell supervisor so respawned sessions do not pile up in
    /// the listing.
    pub fn prune_finished(&self, name: &str) {
        self.tasks
            .lock()
            .retain(|t| !(t.name == name && t.done.load(Ordering::Relaxed)));
    }

    /// Snapshot all registered tasks
    pub fn snapshot(&self) -> Vec<TaskInfo> {
        self.tasks
            .lock()
            .iter()
            .map(|t| TaskInfo {
                name: t.name.clone(),
                running: !t.done.load(Ordering::Relaxed),
                uptime: t.started.elapsed(),
            })
            .collect()
    }

    /// Number of currently running tasks
    pub fn running_count(&self) -> usize {
        self.tasks
            .lock()
            .iter()
            .filter(|t| !t.done.load(Ordering::Relaxed))
            .count()
    }
}

/// RAII guard marking a registered task as finished on drop
pub struct TaskGuard {
    done: Arc<AtomicBool>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.done.store(true, Ordering::Relaxed);
    }
}
