// Process module - Launching, probing and terminating monitor processes

mod launcher;
mod prober;
mod terminator;

pub use launcher::{LaunchedMonitor, MonitorLauncher};
#[cfg(unix)]
pub use prober::SignalProber;
pub use prober::{Prober, SysinfoProber};
pub use terminator::{TerminationOutcome, Terminator};
