// Library exports for the watchdeck instance registry

pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod ipc;
pub mod logs;
pub mod process;
pub mod registry;
pub mod state;
