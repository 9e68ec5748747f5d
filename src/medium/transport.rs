//! Block transport collaborator
//!
//! Establishes and releases the electrical/protocol session with the medium.
//! The medium is treated as a dumb synchronous block device: no caching, no
//! write buffering, no protocol timing concerns at this layer.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fs::File;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::TransportConfig;
use crate::error::{AppError, Result};
use crate::probe::MediumProbe;

/// One sector, the unit of the identification read
const SECTOR_SIZE: usize = 512;

/// Block transport for the removable medium
#[async_trait]
pub trait BlockTransport: Send + Sync {
    /// Establish the protocol session with the medium
    ///
    /// Fails when the medium is unresponsive or absent. Must not be followed
    /// by filesystem operations unless it returned `Ok`.
    async fn connect(&self) -> Result<()>;

    /// Release the protocol session
    ///
    /// Idempotent; safe to call when not connected.
    async fn disconnect(&self) -> Result<()>;
}

/// Card-slot transport over the kernel's SPI/MMC block driver
///
/// Constructed with the slot's low/high speed clock profiles and the probe
/// queries, mirroring how the driver object is wired on the board. `connect`
/// verifies the medium answers an identification read of sector 0; the open
/// device handle is the held session and is dropped on `disconnect`.
pub struct SpiCardTransport {
    config: TransportConfig,
    probe: Arc<dyn MediumProbe>,
    session: Mutex<Option<File>>,
    connected: AtomicBool,
}

impl SpiCardTransport {
    /// Create a transport for the configured slot
    pub fn new(config: TransportConfig, probe: Arc<dyn MediumProbe>) -> Self {
        Self {
            config,
            probe,
            session: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Whether a session is currently held
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl BlockTransport for SpiCardTransport {
    async fn connect(&self) -> Result<()> {
        if self.connected.load(Ordering::Relaxed) {
            debug!("Transport already connected");
            return Ok(());
        }

        match self.probe.is_present() {
            Ok(true) => {}
            Ok(false) => {
                return Err(AppError::TransportConnect(
                    "no medium present at connect time".to_string(),
                ))
            }
            Err(e) => return Err(AppError::TransportConnect(format!("probe read: {}", e))),
        }

        debug!(
            "Identifying medium on {} at {} Hz",
            self.config.device, self.config.low_speed_hz
        );

        let mut file = File::open(&self.config.device)
            .map_err(|e| AppError::TransportConnect(format!("{}: {}", self.config.device, e)))?;

        let mut sector = [0u8; SECTOR_SIZE];
        file.read_exact(&mut sector)
            .map_err(|e| AppError::TransportConnect(format!("identification read: {}", e)))?;

        *self.session.lock() = Some(file);
        self.connected.store(true, Ordering::Relaxed);
        info!(
            "Transport connected on {} ({} Hz)",
            self.config.device, self.config.high_speed_hz
        );
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let held = self.session.lock().take();
        if held.is_none() && !self.connected.load(Ordering::Relaxed) {
            debug!("Transport not connected, nothing to release");
            return Ok(());
        }
        self.connected.store(false, Ordering::Relaxed);
        info!("Transport disconnected");
        Ok(())
    }
}

impl Drop for SpiCardTransport {
    fn drop(&mut self) {
        if self.connected.load(Ordering::Relaxed) {
            warn!("Transport dropped while connected");
        }
    }
}
