// Maps IPC commands onto registry operations

use crate::error::Result;
use crate::ipc::{Command, Response, ResponseData};
use crate::registry::InstanceRegistry;

/// Run one command against the registry
///
/// Only a failed create produces an error; every other operation degrades
/// instead of failing.
pub async fn handle_command(registry: &InstanceRegistry, command: Command) -> Result<Response> {
    tracing::debug!("Handling command: {:?}", command);

    let data = match command {
        Command::List => ResponseData::InstanceList(registry.list_instances().await),
        Command::Get { id } => ResponseData::Instance(registry.get_instance(&id).await),
        Command::Create { name, target } => {
            match registry.create_instance(&name, &target).await {
                Ok(view) => ResponseData::Created(view),
                Err(e) => {
                    if e.is_validation() {
                        tracing::debug!("Rejected create for '{}': {}", name, e);
                    } else {
                        tracing::warn!("Failed to create instance '{}': {}", name, e);
                    }
                    return Err(e);
                }
            }
        }
        Command::Stop { id } => ResponseData::Stopped(registry.stop_instance(&id).await),
        Command::Status => ResponseData::Status(registry.status_snapshot().await),
    };

    Ok(Response::success(0, data))
}
