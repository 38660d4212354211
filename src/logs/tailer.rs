use crate::state::validate_name;
use std::path::{Path, PathBuf};

/// Line returned in place of a log that cannot be read
pub const NO_LOG_PLACEHOLDER: &str = "No logs available";

/// Reads the tail of per-instance log files in a fixed directory
///
/// The tailer never writes to the directory and never fails: a log that is
/// missing, unreadable or addressed by an unsafe name yields
/// [`NO_LOG_PLACEHOLDER`].
#[derive(Debug, Clone)]
pub struct LogTailer {
    log_dir: PathBuf,
}

impl LogTailer {
    pub fn new<P: AsRef<Path>>(log_dir: P) -> Self {
        Self {
            log_dir: log_dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the log file for an instance name
    pub fn log_path(&self, name: &str) -> PathBuf {
        self.log_dir.join(format!("{}.log", name))
    }

    /// Last `lines` non-empty lines of `<name>.log`, most recent last
    pub async fn tail(&self, name: &str, lines: usize) -> Vec<String> {
        if validate_name(name).is_err() {
            return placeholder();
        }

        let path = self.log_path(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => last_non_empty_lines(&String::from_utf8_lossy(&bytes), lines),
            Err(e) => {
                tracing::debug!("Log {} unavailable: {}", path.display(), e);
                placeholder()
            }
        }
    }
}

fn placeholder() -> Vec<String> {
    vec![NO_LOG_PLACEHOLDER.to_string()]
}

/// Trimmed, non-blank lines of `content`, keeping only the last `lines`
fn last_non_empty_lines(content: &str, lines: usize) -> Vec<String> {
    let all: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let start_index = all.len().saturating_sub(lines);

    all[start_index..].iter().map(|s| s.to_string()).collect()
}
