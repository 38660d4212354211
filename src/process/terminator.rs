use super::prober::Prober;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How a termination request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationOutcome {
    /// The process exited within the timeout
    Terminated,
    /// The process was signalled but was still alive when the wait ran out
    TimedOut,
    /// There was no process of ours to signal
    NotFound,
}

impl std::fmt::Display for TerminationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationOutcome::Terminated => write!(f, "terminated"),
            TerminationOutcome::TimedOut => write!(f, "timed out"),
            TerminationOutcome::NotFound => write!(f, "not found"),
        }
    }
}

/// Best-effort graceful termination with a bounded wait
///
/// Sends a termination request and polls the prober until the process is
/// gone or the timeout runs out. Never escalates to a forced kill.
pub struct Terminator {
    prober: Arc<dyn Prober>,
    timeout: Duration,
}

impl Terminator {
    pub fn new(prober: Arc<dyn Prober>, timeout: Duration) -> Self {
        Self { prober, timeout }
    }

    pub async fn terminate(&self, pid: u32) -> TerminationOutcome {
        if !self.prober.is_alive(pid) {
            return TerminationOutcome::NotFound;
        }

        if !request_termination(pid) {
            return TerminationOutcome::NotFound;
        }

        let prober = Arc::clone(&self.prober);
        let wait = async move {
            while prober.is_alive(pid) {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };

        match tokio::time::timeout(self.timeout, wait).await {
            Ok(()) => TerminationOutcome::Terminated,
            Err(_) => {
                tracing::warn!(
                    "Process {} still alive {:?} after termination request",
                    pid,
                    self.timeout
                );
                TerminationOutcome::TimedOut
            }
        }
    }
}

/// Send SIGTERM; false when there is nothing of ours to signal
#[cfg(unix)]
fn request_termination(pid: u32) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }

    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!("Failed to send SIGTERM to {}: {}", pid, e);
            false
        }
    }
}

#[cfg(not(unix))]
fn request_termination(pid: u32) -> bool {
    use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, Signal, System};

    let sys_pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[sys_pid]),
        true,
        ProcessRefreshKind::new(),
    );

    system
        .process(sys_pid)
        .and_then(|process| process.kill_with(Signal::Term))
        .unwrap_or(false)
}
