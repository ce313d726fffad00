//! Image plane reduction for network transit.
//!
//! Two operations, both cheap enough to run on a streaming path:
//! - [`downscale`]: nearest-neighbor subsampling by an integer factor
//! - [`JpegCompressor`]: reusable JPEG encoder for 3-channel and 1-channel planes
//!
//! No interpolation is done anywhere in this crate. Latency matters more than
//! image quality for a live preview.

pub mod error;
pub mod format;
pub mod jpeg;
pub mod scale;

pub use error::{CodecError, Result};
pub use format::PixelFormat;
pub use jpeg::{JpegCompressor, DEFAULT_QUALITY};
pub use scale::{downscale, scaled_dimensions, Scaled};
