//! Configuration loading and schema

pub mod schema;
pub mod store;

pub use schema::{
    AppConfig, ConsoleConfig, IndicatorConfig, ProbeConfig, TransportConfig, VolumeConfig,
    WatcherConfig,
};
pub use store::ConfigStore;
