use crate::error::{CodecError, Result};
use crate::format::PixelFormat;

/// A downscaled image plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scaled {
    pub pixels: Vec<u8>,
    pub width: u16,
    pub height: u16,
}

/// Output geometry for a downscale by `factor`.
///
/// Each dimension is `max(dim / factor, 1)`. `factor` must be non-zero.
pub fn scaled_dimensions(factor: u16, width: u16, height: u16) -> (u16, u16) {
    ((width / factor).max(1), (height / factor).max(1))
}

/// Nearest-neighbor subsample of `input` by `factor`.
///
/// Output pixel `(x, y)` is input pixel `(x * factor, y * factor)`. With
/// `factor == 1` this is a straight copy of the plane.
pub fn downscale(
    factor: u16,
    format: PixelFormat,
    input: &[u8],
    width: u16,
    height: u16,
) -> Result<Scaled> {
    if factor == 0 {
        return Err(CodecError::ZeroFactor);
    }
    format.check_plane(input, width, height)?;

    if factor == 1 {
        return Ok(Scaled {
            pixels: input[..format.plane_len(width, height)].to_vec(),
            width,
            height,
        });
    }

    let (out_w, out_h) = scaled_dimensions(factor, width, height);
    if width == 0 || height == 0 {
        // Nothing to sample from; keep the geometry contract with an empty plane.
        return Ok(Scaled {
            pixels: Vec::new(),
            width: out_w,
            height: out_h,
        });
    }

    let bpp = format.bytes_per_pixel();
    let step = usize::from(factor);
    let in_stride = usize::from(width) * bpp;
    let mut pixels = Vec::with_capacity(format.plane_len(out_w, out_h));

    for y in 0..usize::from(out_h) {
        let row = &input[y * step * in_stride..][..in_stride];
        for x in 0..usize::from(out_w) {
            let at = x * step * bpp;
            pixels.extend_from_slice(&row[at..at + bpp]);
        }
    }

    Ok(Scaled {
        pixels,
        width: out_w,
        height: out_h,
    })
}
