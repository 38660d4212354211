// CLI module - User-facing command-line interface

mod output;

use crate::error::{Result, WatchdeckError};
use crate::ipc::client::IpcClient;
use crate::ipc::protocol::{Command, ResponseData};
use crate::ipc::server::DEFAULT_SOCKET_PATH;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// watchdeck - Launch, inspect and stop URL monitors
#[derive(Debug, Parser)]
#[command(name = "watchdeck")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Socket the daemon listens on
    #[arg(long, global = true, default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List every instance with its latest log lines
    List,

    /// Show one instance with its full recent log
    Show {
        /// Instance ID
        id: String,
    },

    /// Launch a monitor for a URL
    Create {
        /// Instance name, also the log file name
        #[arg(short, long)]
        name: String,

        /// URL the monitor watches
        #[arg(short, long)]
        url: String,
    },

    /// Stop an instance and forget it
    Stop {
        /// Instance ID
        id: String,
    },

    /// Report whether each instance is running
    Status {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Run the CLI application
    pub fn run() -> Result<()> {
        let cli = Cli::parse();
        cli.execute()
    }

    /// Execute the parsed command
    fn execute(&self) -> Result<()> {
        let client = IpcClient::with_socket_path(&self.socket);
        let command = self.build_command();

        let response = match &self.command {
            // A stop can take up to the daemon's stop timeout
            Commands::Stop { id } => {
                let pb = output::create_progress_bar(&format!("Stopping instance {}...", id));
                let response = client.send_command(command);
                pb.finish_and_clear();
                response?
            }
            _ => client.send_command(command)?,
        };

        match (response.result, &self.command) {
            (Ok(ResponseData::Instance(None)), Commands::Show { id }) => {
                Err(WatchdeckError::InstanceNotFound(id.clone()))
            }
            (Ok(data), Commands::Status { json: true }) => output::print_json(&data),
            (Ok(data), _) => {
                output::print_success(&data);
                Ok(())
            }
            (Err(error_msg), _) => Err(WatchdeckError::Other(error_msg)),
        }
    }

    /// Build an IPC command from the CLI arguments
    fn build_command(&self) -> Command {
        match &self.command {
            Commands::List => Command::List,
            Commands::Show { id } => Command::Get { id: id.clone() },
            Commands::Create { name, url } => Command::Create {
                name: name.clone(),
                target: url.clone(),
            },
            Commands::Stop { id } => Command::Stop { id: id.clone() },
            Commands::Status { .. } => Command::Status,
        }
    }
}
