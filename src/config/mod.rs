use crate::error::{Result, WatchdeckError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How process liveness is checked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProberKind {
    /// Process-table lookup; zombies count as dead
    #[default]
    Sysinfo,
    /// `kill(pid, 0)`; unix only
    Signal,
}

/// Fixed configuration of the registry and its daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Directory holding `<name>.log` files written by the monitors
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// JSON file holding the instance mapping
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// Monitor binary launched for every instance
    #[serde(default = "default_executable")]
    pub executable: PathBuf,

    /// Unix socket the daemon listens on
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// PID file guarding against a second daemon
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    /// How long a stop waits for the monitor to exit (in seconds)
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,

    /// Log lines attached to each instance in the list view
    #[serde(default = "default_list_log_lines")]
    pub list_log_lines: usize,

    /// Log lines attached to the detail view
    #[serde(default = "default_detail_log_lines")]
    pub detail_log_lines: usize,

    #[serde(default)]
    pub prober: ProberKind,
}

// Default value functions for serde
fn default_log_dir() -> PathBuf {
    PathBuf::from("log")
}

fn default_state_path() -> PathBuf {
    PathBuf::from("instances.json")
}

fn default_executable() -> PathBuf {
    PathBuf::from("app/auto_easycheck")
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/watchdeck.sock")
}

fn default_pid_file() -> PathBuf {
    PathBuf::from("/tmp/watchdeck.pid")
}

fn default_stop_timeout() -> u64 {
    5
}

fn default_list_log_lines() -> usize {
    3
}

fn default_detail_log_lines() -> usize {
    50
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            state_path: default_state_path(),
            executable: default_executable(),
            socket_path: default_socket_path(),
            pid_file: default_pid_file(),
            stop_timeout_secs: default_stop_timeout(),
            list_log_lines: default_list_log_lines(),
            detail_log_lines: default_detail_log_lines(),
            prober: ProberKind::default(),
        }
    }
}

impl DashboardConfig {
    /// Load configuration from a file (supports TOML and JSON)
    pub fn from_file(path: &Path) -> Result<DashboardConfig> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            WatchdeckError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        let mut config = match extension {
            "toml" => Self::parse_toml(&contents)?,
            "json" => Self::parse_json(&contents)?,
            _ => {
                return Err(WatchdeckError::InvalidConfig(format!(
                    "Unsupported file format: {}. Use .toml or .json",
                    extension
                )))
            }
        };

        config.expand_env_vars();
        config.validate()?;

        Ok(config)
    }

    fn parse_toml(contents: &str) -> Result<DashboardConfig> {
        toml::from_str(contents)
            .map_err(|e| WatchdeckError::InvalidConfig(format!("Failed to parse TOML: {}", e)))
    }

    fn parse_json(contents: &str) -> Result<DashboardConfig> {
        serde_json::from_str(contents)
            .map_err(|e| WatchdeckError::InvalidConfig(format!("Failed to parse JSON: {}", e)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let paths = [
            ("log_dir", &self.log_dir),
            ("state_path", &self.state_path),
            ("executable", &self.executable),
            ("socket_path", &self.socket_path),
            ("pid_file", &self.pid_file),
        ];
        for (field, path) in paths {
            if path.as_os_str().is_empty() {
                return Err(WatchdeckError::ConfigValidationError(format!(
                    "{} must not be empty",
                    field
                )));
            }
        }

        if self.stop_timeout_secs == 0 {
            return Err(WatchdeckError::ConfigValidationError(
                "stop_timeout_secs must be at least 1".to_string(),
            ));
        }

        if self.list_log_lines == 0 || self.detail_log_lines == 0 {
            return Err(WatchdeckError::ConfigValidationError(
                "list_log_lines and detail_log_lines must be at least 1".to_string(),
            ));
        }

        if self.prober == ProberKind::Signal && !cfg!(unix) {
            return Err(WatchdeckError::ConfigValidationError(
                "prober \"signal\" is only available on unix".to_string(),
            ));
        }

        if self.log_dir.exists() && !self.log_dir.is_dir() {
            return Err(WatchdeckError::ConfigValidationError(format!(
                "Log directory is not a directory: {}",
                self.log_dir.display()
            )));
        }

        Ok(())
    }

    /// Expand environment variables in every configured path
    fn expand_env_vars(&mut self) {
        for path in [
            &mut self.log_dir,
            &mut self.state_path,
            &mut self.executable,
            &mut self.socket_path,
            &mut self.pid_file,
        ] {
            *path = Self::expand_env_in_path(path);
        }
    }

    /// Expand `$VAR` and `${VAR}` in a string
    fn expand_env_in_string(s: &str) -> String {
        let mut result = s.to_string();

        // Longest names first so $HOME_DIR is not eaten by $HOME
        let mut vars: Vec<(String, String)> = std::env::vars().collect();
        vars.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        for (key, value) in vars {
            result = result.replace(&format!("${{{}}}", key), &value);
            result = result.replace(&format!("${}", key), &value);
        }

        result
    }

    fn expand_env_in_path(path: &Path) -> PathBuf {
        let path_str = path.to_string_lossy();
        PathBuf::from(Self::expand_env_in_string(&path_str))
    }

    /// Get stop timeout as Duration
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}
