use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use tracing::trace;

use crate::error::{CodecError, Result};
use crate::format::PixelFormat;
use crate::scale::downscale;

/// Quality used when none is configured.
pub const DEFAULT_QUALITY: u8 = 80;

const MAX_QUALITY: u8 = 100;

/// Reusable JPEG encoder.
///
/// Holds the quality setting and the size of the previous output, which is
/// used to pre-size the next buffer. Encoding takes `&mut self`, so an
/// instance shared between worker threads has to sit behind a mutex.
#[derive(Debug)]
pub struct JpegCompressor {
    quality: u8,
    size_hint: usize,
}

impl Default for JpegCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl JpegCompressor {
    /// Create an encoder at [`DEFAULT_QUALITY`].
    pub fn new() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            size_hint: 0,
        }
    }

    /// Create an encoder at an explicit quality (0-100).
    pub fn with_quality(quality: u8) -> Result<Self> {
        let mut compressor = Self::new();
        compressor.set_quality(quality)?;
        Ok(compressor)
    }

    /// Change the quality for subsequent calls.
    pub fn set_quality(&mut self, quality: u8) -> Result<()> {
        if quality > MAX_QUALITY {
            return Err(CodecError::InvalidQuality(quality));
        }
        self.quality = quality;
        Ok(())
    }

    /// Current quality setting.
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode a full plane as a baseline JPEG.
    ///
    /// `Rgb8` is encoded as 3-channel color; `Raw8` and `Y8` as grayscale.
    pub fn compress(
        &mut self,
        input: &[u8],
        format: PixelFormat,
        width: u16,
        height: u16,
    ) -> Result<Vec<u8>> {
        if width == 0 || height == 0 {
            return Err(CodecError::EmptyImage { width, height });
        }
        format.check_plane(input, width, height)?;

        let color = match format {
            PixelFormat::Rgb8 => ExtendedColorType::Rgb8,
            PixelFormat::Raw8 | PixelFormat::Y8 => ExtendedColorType::L8,
        };

        let mut out = Vec::with_capacity(self.size_hint);
        // The encoder's quantization tables are undefined at 0.
        JpegEncoder::new_with_quality(&mut out, self.quality.max(1)).encode(
            &input[..format.plane_len(width, height)],
            u32::from(width),
            u32::from(height),
            color,
        )?;
        self.size_hint = out.len();

        trace!(
            %format,
            width,
            height,
            quality = self.quality,
            size = out.len(),
            "jpeg encoded"
        );
        Ok(out)
    }

    /// Downscale by `factor` and encode the result in one step.
    ///
    /// Returns the encoded bytes together with the encoded geometry.
    pub fn downscale_and_compress(
        &mut self,
        factor: u16,
        input: &[u8],
        format: PixelFormat,
        width: u16,
        height: u16,
    ) -> Result<(Vec<u8>, u16, u16)> {
        let scaled = downscale(factor, format, input, width, height)?;
        let encoded = self.compress(&scaled.pixels, format, scaled.width, scaled.height)?;
        Ok((encoded, scaled.width, scaled.height))
    }
}

#[cfg(test)]
mod tests {
    use image::{ColorType, ImageFormat};

    use super::*;

    fn decode(bytes: &[u8]) -> image::DynamicImage {
        image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
            .expect("encoder output should decode")
    }

    fn checker(format: PixelFormat, width: u16, height: u16) -> Vec<u8> {
        let bpp = format.bytes_per_pixel();
        let mut buf = Vec::with_capacity(format.plane_len(width, height));
        for y in 0..height {
            for x in 0..width {
                let v = if (x / 8 + y / 8) % 2 == 0 { 230 } else { 20 };
                buf.extend(std::iter::repeat(v).take(bpp));
            }
        }
        buf
    }

    #[test]
    fn rgb_roundtrip_keeps_geometry() {
        let mut jpeg = JpegCompressor::new();
        let input = checker(PixelFormat::Rgb8, 64, 48);
        let out = jpeg.compress(&input, PixelFormat::Rgb8, 64, 48).unwrap();

        let decoded = decode(&out);
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
        assert_eq!(decoded.color(), ColorType::Rgb8);
    }

    #[test]
    fn gray_formats_encode_single_channel() {
        let mut jpeg = JpegCompressor::new();
        for format in [PixelFormat::Raw8, PixelFormat::Y8] {
            let input = checker(format, 40, 30);
            let out = jpeg.compress(&input, format, 40, 30).unwrap();
            let decoded = decode(&out);
            assert_eq!((decoded.width(), decoded.height()), (40, 30));
            assert_eq!(decoded.color(), ColorType::L8);
        }
    }

    #[test]
    fn every_quality_decodes() {
        let input = checker(PixelFormat::Rgb8, 16, 16);
        for quality in [0u8, 1, 25, 50, 80, 99, 100] {
            let mut jpeg = JpegCompressor::with_quality(quality).unwrap();
            let out = jpeg.compress(&input, PixelFormat::Rgb8, 16, 16).unwrap();
            let decoded = decode(&out);
            assert_eq!((decoded.width(), decoded.height()), (16, 16));
        }
    }

    #[test]
    fn reusable_across_calls() {
        let mut jpeg = JpegCompressor::new();
        let small = checker(PixelFormat::Y8, 8, 8);
        let large = checker(PixelFormat::Y8, 64, 64);

        let first = jpeg.compress(&large, PixelFormat::Y8, 64, 64).unwrap();
        let second = jpeg.compress(&small, PixelFormat::Y8, 8, 8).unwrap();
        let third = jpeg.compress(&large, PixelFormat::Y8, 64, 64).unwrap();

        assert_eq!(decode(&second).width(), 8);
        assert_eq!(first, third);
    }

    #[test]
    fn quality_above_hundred_rejected() {
        let mut jpeg = JpegCompressor::new();
        assert!(matches!(
            jpeg.set_quality(101),
            Err(CodecError::InvalidQuality(101))
        ));
        assert_eq!(jpeg.quality(), DEFAULT_QUALITY);
    }

    #[test]
    fn empty_image_rejected() {
        let mut jpeg = JpegCompressor::new();
        let err = jpeg.compress(&[], PixelFormat::Rgb8, 0, 10).unwrap_err();
        assert!(matches!(err, CodecError::EmptyImage { .. }));
    }

    #[test]
    fn downscale_then_compress() {
        let mut jpeg = JpegCompressor::new();
        let input = checker(PixelFormat::Rgb8, 640, 480);
        let (out, w, h) = jpeg
            .downscale_and_compress(2, &input, PixelFormat::Rgb8, 640, 480)
            .unwrap();
        assert_eq!((w, h), (320, 240));
        let decoded = decode(&out);
        assert_eq!((decoded.width(), decoded.height()), (320, 240));
    }
}
