//! Console transport
//!
//! The shell talks to the operator over a byte pipe. Production uses the
//! board's UART via `serialport`; tests substitute in-memory pipes.

use std::io::{Read, Write};
use std::time::Duration;

use crate::config::ConsoleConfig;
use crate::error::Result;

/// Read timeout for the console port
///
/// Short enough that a session notices shutdown promptly, long enough not
/// to spin.
const READ_TIMEOUT_MS: u64 = 200;

/// One opened console: a reader and a writer over the same channel
pub struct ConsoleIo {
    /// Byte source (operator keystrokes)
    pub reader: Box<dyn Read + Send>,
    /// Byte sink (command output)
    pub writer: Box<dyn Write + Send>,
}

/// Factory for console connections
///
/// `open` is called once per shell session; the handles it returns live for
/// that session's lifetime.
pub trait ConsoleTransport: Send + Sync {
    /// Open the console for a new session
    fn open(&self) -> Result<ConsoleIo>;
}

/// Serial UART console
pub struct SerialConsole {
    config: ConsoleConfig,
}

impl SerialConsole {
    /// Create a console on the configured port
    pub fn new(config: ConsoleConfig) -> Self {
        Self { config }
    }
}

impl ConsoleTransport for SerialConsole {
    fn open(&self) -> Result<ConsoleIo> {
        let port = serialport::new(self.config.port.as_str(), self.config.baud_rate)
            .timeout(Duration::from_millis(READ_TIMEOUT_MS))
            .open()?;
        let writer = port.try_clone()?;
        Ok(ConsoleIo {
            reader: Box::new(port),
            writer: Box::new(writer),
        })
    }
}
