use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Transport connect failed: {0}")]
    TransportConnect(String),

    #[error("Mount failed: {0}")]
    Mount(String),

    /// An operation reached the medium after it was asynchronously removed.
    /// Surfaced synchronously to the caller (typically a shell command);
    /// never fatal to the process.
    #[error("Medium detached during operation")]
    Detached,

    #[error("GPIO error: {0}")]
    Gpio(String),

    #[error("Serial error: {0}")]
    Serial(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<gpio_cdev::Error> for AppError {
    fn from(e: gpio_cdev::Error) -> Self {
        AppError::Gpio(e.to_string())
    }
}

impl From<serialport::Error> for AppError {
    fn from(e: serialport::Error) -> Self {
        AppError::Serial(e.to_string())
    }
}

impl From<nix::Error> for AppError {
    fn from(e: nix::Error) -> Self {
        AppError::Io(std::io::Error::from_raw_os_error(e as i32))
    }
}

/// Result type alias used across the crate
pub type Result<T> = std::result::Result<T, AppError>;
