use std::time::Duration;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind the listening socket.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The WebSocket layer reported a protocol or socket failure.
    #[error("websocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),

    /// `connect` was called on a transport that is already serving.
    #[error("transport already started")]
    AlreadyStarted,

    /// No viewer connected within the configured wait.
    #[error("no peer connected within {0:?}")]
    ConnectTimeout(Duration),

    /// Interface enumeration failed.
    #[error("failed to enumerate network interfaces: {0}")]
    Interfaces(std::io::Error),

    /// The transport has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

impl From<tungstenite::Error> for TransportError {
    fn from(err: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
