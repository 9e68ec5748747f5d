//! Medium presence and write-protect probe
//!
//! Two idempotent boolean queries sourced from hardware signal lines. Safe
//! to call from any task at any time; reads have no side effects.

pub mod watcher;

pub use watcher::PresenceWatcher;

use gpio_cdev::{Chip, LineHandle, LineRequestFlags};
use parking_lot::Mutex;
use tracing::debug;

use crate::config::ProbeConfig;
use crate::error::Result;

/// Probe for the medium's card-detect and write-protect lines
pub trait MediumProbe: Send + Sync {
    /// Whether a medium is seated in the slot
    fn is_present(&self) -> Result<bool>;

    /// Whether the medium's write-protect tab is set
    fn is_protected(&self) -> Result<bool>;
}

/// GPIO-backed probe
///
/// Both lines are requested as inputs once at startup and held for the
/// process lifetime. Card-detect switches are commonly grounded when a card
/// is seated, so each line carries its own active-low flag.
pub struct GpioProbe {
    config: ProbeConfig,
    present: Mutex<LineHandle>,
    protect: Mutex<LineHandle>,
}

impl GpioProbe {
    /// Request both probe lines from the configured GPIO chip
    pub fn open(config: &ProbeConfig) -> Result<Self> {
        let mut chip = Chip::new(&config.gpio_chip)?;

        let present = chip
            .get_line(config.present_pin)?
            .request(LineRequestFlags::INPUT, 0, "cardhost-detect")?;
        let protect = chip
            .get_line(config.protect_pin)?
            .request(LineRequestFlags::INPUT, 0, "cardhost-protect")?;

        debug!(
            "Probe lines requested on {} (detect {}, protect {})",
            config.gpio_chip, config.present_pin, config.protect_pin
        );

        Ok(Self {
            config: config.clone(),
            present: Mutex::new(present),
            protect: Mutex::new(protect),
        })
    }

    fn read_line(handle: &Mutex<LineHandle>, active_low: bool) -> Result<bool> {
        let value = handle.lock().get_value()?;
        Ok(if active_low { value == 0 } else { value == 1 })
    }
}

impl MediumProbe for GpioProbe {
    fn is_present(&self) -> Result<bool> {
        Self::read_line(&self.present, self.config.present_active_low)
    }

    fn is_protected(&self) -> Result<bool> {
        Self::read_line(&self.protect, self.config.protect_active_low)
    }
}
