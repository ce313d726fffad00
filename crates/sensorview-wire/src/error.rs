/// Errors that can occur while encoding or decoding envelopes.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// A binary message with no bytes.
    #[error("empty binary message")]
    Empty,

    /// The leading byte is not a known message kind.
    #[error("unknown message kind 0x{0:02x}")]
    UnknownKind(u8),

    /// Fewer bytes than the header for this kind requires.
    #[error("truncated {kind} header ({len} bytes, need {need})")]
    Truncated {
        kind: &'static str,
        len: usize,
        need: usize,
    },

    /// The image encoding byte is neither raw nor JPEG.
    #[error("unknown image encoding {0}")]
    UnknownEncoding(u8),

    /// Raw pixel payload disagrees with the header geometry.
    #[error("raw payload is {len} bytes, header implies {expected}")]
    PayloadMismatch { len: usize, expected: usize },

    /// Map payload is not a whole number of tiles.
    #[error("map payload of {0} bytes is not a multiple of the tile size")]
    RaggedMap(usize),

    /// A scale that does not fit the 16-bit millimetre field.
    #[error("map scale {0} m is out of range")]
    ScaleOutOfRange(f32),

    /// Text message is not valid JSON or lacks the expected fields.
    #[error("invalid JSON message: {0}")]
    Json(#[from] serde_json::Error),

    /// Well-formed JSON that is not a recognised control command.
    #[error("unhandled message type {msg_type:?} (command {command:?})")]
    Unhandled {
        msg_type: String,
        command: Option<String>,
    },
}

pub type Result<T> = std::result::Result<T, WireError>;
