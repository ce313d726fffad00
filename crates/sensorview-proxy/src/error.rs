use std::path::PathBuf;

use sensorview_codec::CodecError;
use sensorview_queue::QueueError;
use sensorview_transport::TransportError;
use sensorview_wire::WireError;

/// Errors that can occur while running the streaming proxy.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// A frame could not be scaled or encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The frame worker pool failed.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// The viewer transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An envelope could not be built.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// A JSON document could not be serialized.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// A zero-sized frame was submitted.
    #[error("empty frame ({width}x{height})")]
    EmptyFrame { width: u16, height: u16 },

    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`ProxyConfig`](crate::ProxyConfig).
    #[error("invalid config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ProxyError>;
