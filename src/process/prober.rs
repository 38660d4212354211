use std::sync::Mutex;
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};

/// Answers whether a recorded OS process is still alive
///
/// Implementations never fail. Anything that prevents a positive answer
/// (unknown pid, a process we cannot attach to, a zombie) is reported as
/// not alive.
pub trait Prober: Send + Sync {
    fn is_alive(&self, pid: u32) -> bool;
}

/// Process-table lookup through `sysinfo`
pub struct SysinfoProber {
    system: Mutex<System>,
}

impl SysinfoProber {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoProber {
    fn default() -> Self {
        Self::new()
    }
}

impl Prober for SysinfoProber {
    fn is_alive(&self, pid: u32) -> bool {
        if pid == 0 {
            return false;
        }

        let sys_pid = Pid::from_u32(pid);
        let mut system = self
            .system
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[sys_pid]),
            true,
            ProcessRefreshKind::new(),
        );

        let alive = match system.process(sys_pid) {
            Some(process) => !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead),
            None => false,
        };

        tracing::debug!("Probed PID {}: alive={}", pid, alive);
        alive
    }
}

/// Signal-0 probe through `kill(2)`
///
/// A process owned by another user (EPERM) is not ours and counts as dead.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalProber;

#[cfg(unix)]
impl Prober for SignalProber {
    fn is_alive(&self, pid: u32) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid as NixPid;

        // 0 and negative values address process groups, never a single process
        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        if raw <= 0 {
            return false;
        }

        kill(NixPid::from_raw(raw), None).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::process::Command;

    #[test]
    fn test_current_process_is_alive() {
        let prober = SysinfoProber::new();
        assert!(prober.is_alive(std::process::id()));
    }

    #[test]
    fn test_pid_zero_is_not_alive() {
        assert!(!SysinfoProber::new().is_alive(0));
    }

    #[tokio::test]
    async fn test_exited_process_is_not_alive() {
        let prober = SysinfoProber::new();

        let mut child = Command::new("/bin/sleep")
            .arg("5")
            .spawn()
            .expect("Failed to spawn process");
        let pid = child.id().expect("Failed to get PID");

        assert!(prober.is_alive(pid));

        child.kill().await.expect("Failed to kill process");
        let _ = child.wait().await;
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        assert!(!prober.is_alive(pid));
    }

    #[tokio::test]
    async fn test_zombie_is_not_alive() {
        let prober = SysinfoProber::new();

        // Exits immediately but stays unreaped until wait()
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg("exit 0")
            .spawn()
            .expect("Failed to spawn process");
        let pid = child.id().expect("Failed to get PID");

        tokio::time::sleep(tokio::time::Duration::from_millis(300)).await;
        assert!(!prober.is_alive(pid));

        let _ = child.wait().await;
    }

    #[cfg(unix)]
    #[test]
    fn test_signal_prober() {
        let prober = SignalProber;
        assert!(prober.is_alive(std::process::id()));
        assert!(!prober.is_alive(0));
        assert!(!prober.is_alive(u32::MAX));
    }
}
