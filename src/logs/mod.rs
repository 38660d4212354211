// Logs module - Read-only access to monitor log files

mod tailer;

pub use tailer::{LogTailer, NO_LOG_PLACEHOLDER};
