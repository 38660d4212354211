// IPC Protocol definitions for client-daemon communication

use crate::registry::{InstanceView, StatusSnapshot, StopReport};
use serde::{Deserialize, Serialize};

/// All available commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Every instance with a short log tail
    List,
    /// One instance with the long log tail
    Get { id: String },
    /// Launch a monitor for `target` under `name`
    Create { name: String, target: String },
    /// Terminate and forget an instance
    Stop { id: String },
    /// Liveness of every instance
    Status,
}

/// Response data variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponseData {
    InstanceList(Vec<InstanceView>),
    /// `None` when the id is unknown
    Instance(Option<InstanceView>),
    Created(InstanceView),
    Stopped(StopReport),
    Status(StatusSnapshot),
}

/// Request message from client to daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub command: Command,
}

/// Response message from daemon to client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    pub result: Result<ResponseData, String>,
}

impl Request {
    pub fn new(id: u64, command: Command) -> Self {
        Self { id, command }
    }
}

impl Response {
    pub fn success(id: u64, data: ResponseData) -> Self {
        Self {
            id,
            result: Ok(data),
        }
    }

    pub fn error(id: u64, error: String) -> Self {
        Self {
            id,
            result: Err(error),
        }
    }
}
