//! Pixel layouts accepted by the codec.

use std::fmt;

use crate::error::{CodecError, Result};

/// Layout of one image plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Packed 8-bit RGB, 3 bytes per pixel.
    Rgb8,
    /// Raw 8-bit sensor plane (fisheye), 1 byte per pixel.
    Raw8,
    /// 8-bit luminance, 1 byte per pixel.
    Y8,
}

impl PixelFormat {
    /// Bytes occupied by a single pixel.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Raw8 | PixelFormat::Y8 => 1,
        }
    }

    /// Number of bytes a `width` x `height` plane occupies.
    pub fn plane_len(self, width: u16, height: u16) -> usize {
        usize::from(width) * usize::from(height) * self.bytes_per_pixel()
    }

    /// Fail unless `buf` holds at least a full `width` x `height` plane.
    pub fn check_plane(self, buf: &[u8], width: u16, height: u16) -> Result<()> {
        let need = self.plane_len(width, height);
        if buf.len() < need {
            return Err(CodecError::BufferTooSmall {
                format: self,
                width,
                height,
                len: buf.len(),
                need,
            });
        }
        Ok(())
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelFormat::Rgb8 => "rgb8",
            PixelFormat::Raw8 => "raw8",
            PixelFormat::Y8 => "y8",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_len_accounts_for_channels() {
        assert_eq!(PixelFormat::Rgb8.plane_len(4, 2), 24);
        assert_eq!(PixelFormat::Raw8.plane_len(4, 2), 8);
        assert_eq!(PixelFormat::Y8.plane_len(0, 100), 0);
    }

    #[test]
    fn check_plane_rejects_short_buffer() {
        let err = PixelFormat::Rgb8.check_plane(&[0u8; 10], 2, 2).unwrap_err();
        assert!(matches!(
            err,
            CodecError::BufferTooSmall { len: 10, need: 12, .. }
        ));
    }

    #[test]
    fn check_plane_allows_trailing_bytes() {
        PixelFormat::Raw8
            .check_plane(&[0u8; 9], 2, 2)
            .expect("longer buffers carry the plane at the front");
    }
}
