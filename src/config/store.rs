//! Configuration persistence
//!
//! The daemon keeps its configuration in a single JSON file. A missing file
//! is not an error: defaults are written back so the operator has something
//! to edit.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::schema::AppConfig;
use crate::error::Result;

/// File-backed configuration store
pub struct ConfigStore {
    path: PathBuf,
    config: AppConfig,
}

impl ConfigStore {
    /// Load configuration from `path`, creating it with defaults if missing
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let config = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            info!("No config at {}, writing defaults", path.display());
            let config = AppConfig::default();
            if let Err(e) = Self::write(&path, &config) {
                warn!("Failed to write default config: {}", e);
            }
            config
        };

        Ok(Self { path, config })
    }

    /// Current configuration
    pub fn get(&self) -> &AppConfig {
        &self.config
    }

    /// Config file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(path: &Path, config: &AppConfig) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(config)?)?;
        Ok(())
    }
}
