// IPC Server - Listens for client connections and handles requests

use crate::error::{Result, WatchdeckError};
use crate::ipc::{Command, Request, Response};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Default socket path for daemon communication
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/watchdeck.sock";

/// Upper bound on one request line, newline included
pub const MAX_REQUEST_BYTES: u64 = 64 * 1024;

/// IPC server for handling client connections
pub struct IpcServer {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
}

impl IpcServer {
    /// Create a new IPC server with the default socket path
    pub fn new() -> Self {
        Self::with_socket_path(DEFAULT_SOCKET_PATH)
    }

    /// Create a new IPC server with a custom socket path
    pub fn with_socket_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            socket_path: path.as_ref().to_path_buf(),
            listener: None,
        }
    }

    /// Bind to the Unix socket. Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<()> {
        // A stale socket from a crashed daemon blocks the bind
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| {
                WatchdeckError::IpcError(format!("Failed to remove existing socket: {}", e))
            })?;
        }

        let listener = UnixListener::bind(&self.socket_path)
            .map_err(|e| WatchdeckError::IpcError(format!("Failed to bind to socket: {}", e)))?;

        // Owner-only access
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.socket_path, permissions).map_err(|e| {
                WatchdeckError::IpcError(format!("Failed to set socket permissions: {}", e))
            })?;
        }

        self.listener = Some(listener);
        Ok(())
    }

    /// Run the accept loop, handling each connection on its own task
    pub async fn run<F, Fut>(&self, handler: F) -> Result<()>
    where
        F: Fn(Command) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response>> + Send,
    {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| WatchdeckError::IpcError("Server not started".to_string()))?;

        let handler = Arc::new(handler);

        loop {
            let stream = match listener.accept().await {
                Ok((stream, _addr)) => stream,
                Err(e) => {
                    tracing::warn!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let handler = Arc::clone(&handler);

            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(stream, handler.as_ref()).await {
                    tracing::warn!("Failed to handle connection: {}", e);
                }
            });
        }
    }

    /// Serve a single request/response exchange on `stream`
    pub async fn handle_connection<F, Fut>(stream: UnixStream, handler: &F) -> Result<()>
    where
        F: Fn(Command) -> Fut,
        Fut: Future<Output = Result<Response>>,
    {
        let (read_half, mut write_half) = stream.into_split();

        let mut reader = BufReader::new(read_half.take(MAX_REQUEST_BYTES));
        let mut request_line = String::new();
        let read = reader
            .read_line(&mut request_line)
            .await
            .map_err(|e| WatchdeckError::IpcError(format!("Failed to read request: {}", e)))?;

        if read as u64 >= MAX_REQUEST_BYTES && !request_line.ends_with('\n') {
            return Err(WatchdeckError::IpcError(format!(
                "Request exceeds {} bytes",
                MAX_REQUEST_BYTES
            )));
        }

        let request: Request = serde_json::from_str(&request_line).map_err(|e| {
            WatchdeckError::DeserializationError(format!("Failed to deserialize request: {}", e))
        })?;

        let response = match handler(request.command).await {
            Ok(resp) => Response {
                id: request.id,
                result: resp.result,
            },
            Err(e) => Response::error(request.id, e.to_string()),
        };

        let mut response_json = serde_json::to_string(&response).map_err(|e| {
            WatchdeckError::SerializationError(format!("Failed to serialize response: {}", e))
        })?;
        response_json.push('\n');

        write_half
            .write_all(response_json.as_bytes())
            .await
            .map_err(|e| WatchdeckError::IpcError(format!("Failed to write response: {}", e)))?;

        write_half
            .flush()
            .await
            .map_err(|e| WatchdeckError::IpcError(format!("Failed to flush stream: {}", e)))?;

        Ok(())
    }

    /// Stop the server and clean up the socket file
    pub fn stop(&mut self) -> Result<()> {
        self.listener = None;

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| {
                WatchdeckError::IpcError(format!("Failed to remove socket file: {}", e))
            })?;
        }

        Ok(())
    }

    /// Get the socket path being used
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Default for IpcServer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        if self.listener.is_some() {
            let _ = self.stop();
        }
    }
}
