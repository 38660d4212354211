use crate::error::{Result, WatchdeckError};
use crate::state::validate_name;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};

/// A freshly launched monitor process
#[derive(Debug)]
pub struct LaunchedMonitor {
    /// The child process handle
    pub child: Child,

    /// Process ID assigned by the OS
    pub pid: u32,

    /// Validated instance name
    pub name: String,

    /// Validated target URL
    pub target: String,
}

/// Starts the external monitor binary for an instance
#[derive(Debug, Clone)]
pub struct MonitorLauncher {
    executable: PathBuf,
}

impl MonitorLauncher {
    pub fn new<P: AsRef<Path>>(executable: P) -> Self {
        Self {
            executable: executable.as_ref().to_path_buf(),
        }
    }

    /// Launch `<executable> --name <name> --url <target>`
    ///
    /// Inputs are trimmed before validation. A failed launch is reported once
    /// and never retried.
    pub async fn launch(&self, name: &str, target: &str) -> Result<LaunchedMonitor> {
        let name = name.trim();
        let target = target.trim();

        if name.is_empty() {
            return Err(WatchdeckError::EmptyField("name"));
        }
        if target.is_empty() {
            return Err(WatchdeckError::EmptyField("target"));
        }
        validate_name(name)?;

        if !self.executable.exists() {
            return Err(WatchdeckError::ExecutableMissing(self.executable.clone()));
        }

        let mut command = Command::new(&self.executable);
        command
            .arg("--name")
            .arg(name)
            .arg("--url")
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = command
            .spawn()
            .map_err(|e| WatchdeckError::SpawnFailed(e.to_string()))?;

        let pid = child.id().ok_or_else(|| {
            WatchdeckError::SpawnFailed(format!("no PID reported for monitor '{}'", name))
        })?;

        tracing::info!(
            "Launched monitor {} for {} (PID: {})",
            name,
            target,
            pid
        );

        Ok(LaunchedMonitor {
            child,
            pid,
            name: name.to_string(),
            target: target.to_string(),
        })
    }
}
