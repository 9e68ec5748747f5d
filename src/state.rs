use std::sync::Arc;
use std::time::Instant;

use crate::events::EventBus;
use crate::medium::MediumController;
use crate::probe::MediumProbe;
use crate::utils::TaskRegistry;
use crate::volume::Volume;

/// Shared handles the diagnostic shell commands read from
///
/// Everything here is an observer surface: commands read controller and
/// collaborator state on demand and never mutate the lifecycle.
pub struct AppState {
    /// Lifecycle controller
    pub controller: Arc<MediumController>,
    /// Presence / write-protect probe
    pub probe: Arc<dyn MediumProbe>,
    /// Filesystem volume
    pub volume: Arc<dyn Volume>,
    /// Long-running task registry
    pub tasks: Arc<TaskRegistry>,
    /// Event bus
    pub events: Arc<EventBus>,
    /// Process start time
    pub started_at: Instant,
}

impl AppState {
    /// Create the shared state container
    pub fn new(
        controller: Arc<MediumController>,
        probe: Arc<dyn MediumProbe>,
        volume: Arc<dyn Volume>,
        tasks: Arc<TaskRegistry>,
        events: Arc<EventBus>,
    ) -> Arc<Self> {
        Arc::new(Self {
            controller,
            probe,
            volume,
            tasks,
            events,
            started_at: Instant::now(),
        })
    }
}
