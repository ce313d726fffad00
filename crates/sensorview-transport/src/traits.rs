use std::sync::Arc;

use crate::error::Result;

/// Connection lifecycle as seen by the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not serving.
    Disconnected,
    /// Serving, waiting for a viewer.
    Connecting,
    /// A viewer is attached.
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}

/// Receiver for inbound traffic.
///
/// Called from the transport's I/O thread; implementations must not block
/// for long.
pub trait TransportEvents: Send + Sync {
    /// A binary message arrived.
    fn on_binary(&self, data: &[u8]);

    /// A text message arrived.
    fn on_text(&self, text: &str);

    /// The active peer went away.
    fn on_disconnect(&self) {}
}

/// A duplex connection to at most one viewer.
///
/// Sends while no viewer is attached succeed without doing anything: the
/// message is dropped, not queued.
pub trait Transport: Send + Sync {
    /// Start serving and block until the first viewer attaches.
    fn connect(&self, events: Arc<dyn TransportEvents>) -> Result<()>;

    /// Stop serving and drop the peer. Safe to call repeatedly.
    fn disconnect(&self);

    /// Send one binary message made of several slices.
    fn send_vectored(&self, parts: &[&[u8]]) -> Result<()>;

    /// Send one text message.
    fn send_text(&self, text: &str) -> Result<()>;

    /// Current lifecycle state.
    fn state(&self) -> ConnectionState;

    /// Send one binary message.
    fn send_bytes(&self, data: &[u8]) -> Result<()> {
        self.send_vectored(&[data])
    }

    /// Whether a viewer is attached.
    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

/// Join scatter slices into one contiguous message body.
pub(crate) fn concat(parts: &[&[u8]]) -> Vec<u8> {
    let len = parts.iter().map(|p| p.len()).sum();
    let mut out = Vec::with_capacity(len);
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}
