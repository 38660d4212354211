// PID file management for the daemon process

use crate::error::{Result, WatchdeckError};
use crate::process::{Prober, SysinfoProber};
use std::fs;
use std::path::{Path, PathBuf};

/// Manages the daemon PID file
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Write the current process PID to the file
    pub fn write(&self) -> Result<()> {
        fs::write(&self.path, std::process::id().to_string()).map_err(|e| {
            WatchdeckError::PidFileError(format!("Failed to write PID file: {}", e))
        })
    }

    /// Read the PID from the file
    pub fn read(&self) -> Result<u32> {
        let content = fs::read_to_string(&self.path)
            .map_err(|e| WatchdeckError::PidFileError(format!("Failed to read PID file: {}", e)))?;

        content
            .trim()
            .parse::<u32>()
            .map_err(|e| WatchdeckError::PidFileError(format!("Invalid PID in file: {}", e)))
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn remove(&self) -> Result<()> {
        if self.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                WatchdeckError::PidFileError(format!("Failed to remove PID file: {}", e))
            })?;
        }
        Ok(())
    }

    /// PID of a live daemon recorded in the file, if any
    pub fn running_pid(&self) -> Option<u32> {
        if !self.exists() {
            return None;
        }

        self.read()
            .ok()
            .filter(|pid| SysinfoProber::new().is_alive(*pid))
    }

    /// Claim the file for this process, replacing a stale one
    pub fn acquire(&self) -> Result<()> {
        if let Some(pid) = self.running_pid() {
            if pid != std::process::id() {
                return Err(WatchdeckError::DaemonAlreadyRunning(pid));
            }
        }

        self.remove()?;
        self.write()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
