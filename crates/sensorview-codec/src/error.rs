use crate::format::PixelFormat;

/// Errors that can occur while scaling or encoding an image plane.
///
/// All of these are caller errors: the pipeline controls format and geometry.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A downscale factor of zero was requested.
    #[error("downscale factor must be at least 1")]
    ZeroFactor,

    /// The input buffer is shorter than the declared geometry requires.
    #[error("{format} buffer too small for {width}x{height} ({len} bytes, need {need})")]
    BufferTooSmall {
        format: PixelFormat,
        width: u16,
        height: u16,
        len: usize,
        need: usize,
    },

    /// Zero-sized images cannot be encoded.
    #[error("empty image ({width}x{height})")]
    EmptyImage { width: u16, height: u16 },

    /// JPEG quality outside 0..=100.
    #[error("jpeg quality {0} out of range (0-100)")]
    InvalidQuality(u8),

    /// The underlying JPEG encoder failed.
    #[error("jpeg encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, CodecError>;
