//! Status indicator
//!
//! A periodic task that blinks a lamp so an operator can read the service
//! state from across the room: fast blink while the medium is in service,
//! slow blink while it is not.

use gpio_cdev::{Chip, LineHandle, LineRequestFlags};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::IndicatorConfig;
use crate::error::Result;
use crate::medium::MediumController;

/// Output the indicator toggles
pub trait StatusLamp: Send + Sync {
    /// Invert the lamp state
    fn toggle(&self) -> Result<()>;
}

/// Lamp on a GPIO output line
pub struct GpioLamp {
    handle: Mutex<LineHandle>,
    lit: AtomicBool,
}

impl GpioLamp {
    /// Request the configured line as an output, initially off
    pub fn open(config: &IndicatorConfig) -> Result<Self> {
        let mut chip = Chip::new(&config.gpio_chip)?;
        let handle = chip
            .get_line(config.pin)?
            .request(LineRequestFlags::OUTPUT, 0, "cardhost-lamp")?;
        debug!(
            "Lamp line requested on {} pin {}",
            config.gpio_chip, config.pin
        );
        Ok(Self {
            handle: Mutex::new(handle),
            lit: AtomicBool::new(false),
        })
    }
}

impl StatusLamp for GpioLamp {
    fn toggle(&self) -> Result<()> {
        let next = !self.lit.load(Ordering::Relaxed);
        self.handle.lock().set_value(u8::from(next))?;
        self.lit.store(next, Ordering::Relaxed);
        Ok(())
    }
}

/// Periodic blink task
///
/// Each period: toggle the lamp, then sleep for a duration chosen by
/// reading the ready flag at the start of that period. The task carries no
/// state besides the lamp's toggle phase, so a flag change is reflected at
/// most one period late.
pub struct StatusIndicator {
    lamp: Arc<dyn StatusLamp>,
    controller: Arc<MediumController>,
    ready_period: Duration,
    idle_period: Duration,
}

impl StatusIndicator {
    /// Create an indicator reading `controller`'s ready flag
    pub fn new(
        lamp: Arc<dyn StatusLamp>,
        controller: Arc<MediumController>,
        config: &IndicatorConfig,
    ) -> Self {
        Self {
            lamp,
            controller,
            ready_period: Duration::from_millis(config.ready_period_ms),
            idle_period: Duration::from_millis(config.idle_period_ms),
        }
    }

    /// Blink until shutdown
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            "Status indicator started ({:?} in service, {:?} idle)",
            self.ready_period, self.idle_period
        );
        loop {
            let period = if self.controller.is_ready() {
                self.ready_period
            } else {
                self.idle_period
            };

            if let Err(e) = self.lamp.toggle() {
                // Bounded output on a fixed line; a failure here is a wiring
                // problem, not a reason to stop reporting state.
                debug!("Lamp toggle failed: {}", e);
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Status indicator stopping");
                    return;
                }
                _ = tokio::time::sleep(period) => {}
            }
        }
    }
}
