//! Filesystem volume collaborator
//!
//! Binds a filesystem to the connected medium and answers the directory and
//! free-space queries the diagnostic shell needs. The on-disk format is
//! entirely the kernel driver's concern.

use async_trait::async_trait;
use nix::mount::{mount, umount2, MntFlags, MsFlags};
use nix::sys::statvfs::statvfs;
use std::path::Path;
use tracing::{debug, info};

use crate::config::VolumeConfig;
use crate::error::{AppError, Result};

/// One directory entry as the shell's tree listing sees it
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Entry name (no path components)
    pub name: String,
    /// `true` for a container (directory), `false` for a leaf (file)
    pub is_dir: bool,
}

/// Free-space accounting for the mounted volume
#[derive(Debug, Clone, Copy)]
pub struct VolumeStats {
    /// Volume size in bytes
    pub total_bytes: u64,
    /// Free bytes
    pub free_bytes: u64,
    /// Filesystem block size in bytes
    pub block_size: u64,
}

/// Filesystem operations against the medium
#[async_trait]
pub trait Volume: Send + Sync {
    /// Bind the filesystem to the connected medium
    async fn mount(&self) -> Result<()>;

    /// Enumerate one directory, `path` relative to the volume root
    ///
    /// Must surface an error rather than hang on a corrupted volume; the
    /// caller recurses over `is_dir` entries.
    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>>;

    /// Free-space accounting for the volume
    fn stats(&self) -> Result<VolumeStats>;
}

/// Volume backed by mount(2) on the medium's partition
pub struct LinuxVolume {
    config: VolumeConfig,
}

impl LinuxVolume {
    /// Create a volume for the configured partition and mountpoint
    pub fn new(config: VolumeConfig) -> Self {
        Self { config }
    }

    fn resolve(&self, path: &str) -> std::path::PathBuf {
        Path::new(&self.config.mountpoint).join(path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Volume for LinuxVolume {
    async fn mount(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config.mountpoint)?;

        // A prior insert cycle may have left a stale binding: removal does
        // not unmount (the medium is already gone), so clear it lazily here
        // before binding the fresh one.
        if umount2(self.config.mountpoint.as_str(), MntFlags::MNT_DETACH).is_ok() {
            debug!("Cleared stale mount at {}", self.config.mountpoint);
        }

        let mut flags = MsFlags::empty();
        if self.config.read_only {
            flags |= MsFlags::MS_RDONLY;
        }

        mount(
            Some(self.config.device.as_str()),
            self.config.mountpoint.as_str(),
            Some(self.config.fstype.as_str()),
            flags,
            None::<&str>,
        )
        .map_err(|e| {
            AppError::Mount(format!(
                "{} on {}: {}",
                self.config.device, self.config.mountpoint, e
            ))
        })?;

        info!(
            "Mounted {} ({}) at {}",
            self.config.device, self.config.fstype, self.config.mountpoint
        );
        Ok(())
    }

    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let full = self.resolve(path);
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&full)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: file_type.is_dir(),
            });
        }
        Ok(entries)
    }

    fn stats(&self) -> Result<VolumeStats> {
        let vfs = statvfs(self.config.mountpoint.as_str())?;
        let frag = vfs.fragment_size() as u64;
        Ok(VolumeStats {
            total_bytes: vfs.blocks() as u64 * frag,
            free_bytes: vfs.blocks_available() as u64 * frag,
            block_size: vfs.block_size() as u64,
        })
    }
}
