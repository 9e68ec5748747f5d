//! Medium lifecycle data types

use serde::{Deserialize, Serialize};

/// Attach/detach lifecycle state of the removable medium
///
/// Single source of truth for whether filesystem operations may be
/// attempted: only `Ready` permits them, and `Ready` is only entered after a
/// successful connect followed by a successful mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediumState {
    /// No medium in the slot (initial state)
    #[default]
    Absent,
    /// Medium present but the transport refused the connect
    ConnectFailed,
    /// Transport connected but the filesystem mount failed; the transport
    /// has already been released
    MountFailed,
    /// Connected and mounted; filesystem operations are valid
    Ready,
    /// Transient: releasing the transport after a mount failure
    Disconnecting,
}

impl MediumState {
    /// State name as printed by the `card` command
    pub fn name_str(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::ConnectFailed => "connect-failed",
            Self::MountFailed => "mount-failed",
            Self::Ready => "ready",
            Self::Disconnecting => "disconnecting",
        }
    }
}

/// Physical presence transition reported by the watcher
///
/// Consumed exactly once per physical transition; rapid toggles are
/// coalesced by the watcher's debounce before an event is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceEvent {
    /// A medium was seated in the slot
    Inserted,
    /// The medium left the slot
    Removed,
}

/// Diagnostic snapshot of the controller, read by the `card` command
#[derive(Debug, Clone, Serialize)]
pub struct MediumStatus {
    /// Current lifecycle state
    pub state: MediumState,
    /// Derived service-ready flag (`true` iff state is `Ready`)
    pub ready: bool,
    /// Insertion handler invocations since start
    pub attempts: u64,
    /// Attempts that reached `Ready`
    pub successes: u64,
    /// Attempts that failed at connect
    pub connect_failures: u64,
    /// Attempts that failed at mount
    pub mount_failures: u64,
    /// Text of the most recent connect/mount failure, if any
    pub last_error: Option<String>,
}
