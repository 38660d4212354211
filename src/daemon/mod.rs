// Daemon module - Pieces shared by the daemon binary

pub mod handler;
pub mod pid;

pub use handler::handle_command;
pub use pid::PidFile;
