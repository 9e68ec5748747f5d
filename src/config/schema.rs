//! Configuration schema
//!
//! All sections default to values matching the reference board (card-detect
//! and write-protect on gpiochip0, console on ttyS1, lamp on gpiochip0 pin 7)
//! so a missing or partial config file still produces a runnable daemon.

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Card-detect / write-protect probe settings
    pub probe: ProbeConfig,
    /// Presence watcher settings
    pub watcher: WatcherConfig,
    /// Block transport settings
    pub transport: TransportConfig,
    /// Filesystem volume settings
    pub volume: VolumeConfig,
    /// Serial console settings
    pub console: ConsoleConfig,
    /// Status lamp settings
    pub indicator: IndicatorConfig,
}

/// Card-detect / write-protect probe configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProbeConfig {
    /// GPIO chip device path
    pub gpio_chip: String,
    /// Card-detect line offset
    pub present_pin: u32,
    /// Card-detect line is active low (grounded when a card is seated)
    pub present_active_low: bool,
    /// Write-protect line offset
    pub protect_pin: u32,
    /// Write-protect line is active low
    pub protect_active_low: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            gpio_chip: "/dev/gpiochip0".to_string(),
            present_pin: 8,
            present_active_low: true,
            protect_pin: 9,
            protect_active_low: false,
        }
    }
}

/// Presence watcher configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WatcherConfig {
    /// Probe poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// Consecutive identical samples required before an edge is reported
    pub debounce_samples: u32,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            debounce_samples: 3,
        }
    }
}

/// Block transport configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    /// Block device node the card slot exposes once powered
    pub device: String,
    /// Clock rate used for the identification phase (Hz)
    pub low_speed_hz: u32,
    /// Clock rate used once the card is identified (Hz)
    pub high_speed_hz: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            device: "/dev/mmcblk0".to_string(),
            low_speed_hz: 281_250,
            high_speed_hz: 18_000_000,
        }
    }
}

/// Filesystem volume configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VolumeConfig {
    /// Block device node exposing the medium
    pub device: String,
    /// Mountpoint directory
    pub mountpoint: String,
    /// Filesystem type passed to mount(2)
    pub fstype: String,
    /// Mount read-only
    pub read_only: bool,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            device: "/dev/mmcblk0p1".to_string(),
            mountpoint: "/mnt/card".to_string(),
            fstype: "vfat".to_string(),
            read_only: false,
        }
    }
}

/// Serial console configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Serial port device path
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyS1".to_string(),
            baud_rate: 115_200,
        }
    }
}

/// Status lamp configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndicatorConfig {
    /// GPIO chip device path
    pub gpio_chip: String,
    /// Lamp line offset
    pub pin: u32,
    /// Blink period while the medium is in service (milliseconds)
    pub ready_period_ms: u64,
    /// Blink period while it is not (milliseconds)
    pub idle_period_ms: u64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            gpio_chip: "/dev/gpiochip0".to_string(),
            pin: 7,
            ready_period_ms: 200,
            idle_period_ms: 500,
        }
    }
}
