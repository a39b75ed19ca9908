//! Error types shared across the mock server subsystems.

use thiserror::Error;

/// Errors surfaced synchronously to callers of start/stop/send operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Port {0} is already in use")]
    PortInUse(u16),
    #[error("Failed to bind port {0}: {1}")]
    BindError(u16, String),
    #[error("Service '{0}' not found")]
    ServiceNotFound(String),
    #[error("WebSocket server '{0}' not found")]
    WsServerNotFound(String),
    #[error("WebSocket server '{0}' is not running")]
    WsServerNotRunning(String),
    #[error("Client '{0}' is not connected")]
    ClientNotConnected(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Store document error: {0}")]
    Document(#[from] serde_json::Error),
}

/// Errors raised while rendering a resolved response descriptor.
///
/// Each variant maps to the HTTP status the handler must answer with;
/// none of them may terminate the listener.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Rule is configured for a binary response but has no file path")]
    MissingFilePath,
    #[error("Response file not found: {0}")]
    FileNotFound(String),
    #[error("Failed to read response file '{0}': {1}")]
    FileRead(String, String),
    #[error("{0}")]
    Script(String),
}

impl RenderError {
    pub fn status_code(&self) -> u16 {
        match self {
            RenderError::MissingFilePath => 400,
            RenderError::FileNotFound(_) => 404,
            RenderError::FileRead(_, _) => 500,
            RenderError::Script(_) => 500,
        }
    }
}
