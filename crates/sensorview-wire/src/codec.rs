use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, WireError};
use crate::kind::{MsgKind, ACK};

/// Image header: kind (1) + encoding (1) + width (2) + height (2) + pad (2) + timestamp (8).
pub const IMAGE_HEADER_SIZE: usize = 16;

/// Map header: kind (1) + pad (1) + scale in millimetres (2).
pub const MAP_HEADER_SIZE: usize = 4;

/// One occupancy tile: x, z, occupancy as little-endian i32.
pub const TILE_SIZE: usize = 12;

/// Ack message: 0xFF + acked kind.
pub const ACK_SIZE: usize = 2;

/// How the pixel payload of an image envelope is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ImageEncoding {
    /// Uncompressed pixels, row-major.
    Raw = 0,
    /// Baseline JPEG stream.
    Jpeg = 1,
}

impl TryFrom<u8> for ImageEncoding {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Raw),
            1 => Ok(Self::Jpeg),
            other => Err(WireError::UnknownEncoding(other)),
        }
    }
}

/// Fixed header in front of every image payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub kind: MsgKind,
    pub encoding: ImageEncoding,
    pub width: u16,
    pub height: u16,
    /// Capture time in microseconds.
    pub timestamp: u64,
}

impl ImageHeader {
    /// Bytes per pixel of a raw payload of this kind.
    pub fn bytes_per_pixel(&self) -> usize {
        match self.kind {
            MsgKind::Rgb => 3,
            _ => 1,
        }
    }

    /// Length of a raw payload matching this header.
    pub fn raw_len(&self) -> usize {
        usize::from(self.width) * usize::from(self.height) * self.bytes_per_pixel()
    }
}

/// A single occupancy map cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub x: i32,
    pub z: i32,
    pub occupancy: i32,
}

/// A decoded binary message.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// An image frame; `payload` is raw pixels or a JPEG stream.
    Image { header: ImageHeader, payload: Bytes },
    /// A batch of occupancy tiles.
    Map { scale_mm: u16, tiles: Vec<Tile> },
    /// Viewer acknowledgement. The acked byte is kept verbatim so that
    /// out-of-range values can be reported and ignored by the receiver.
    Ack { kind: u8 },
}

impl Envelope {
    /// The kind byte this envelope was decoded from.
    pub fn kind(&self) -> MsgKind {
        match self {
            Self::Image { header, .. } => header.kind,
            Self::Map { .. } => MsgKind::MapUpdate,
            Self::Ack { .. } => MsgKind::Ack,
        }
    }
}

/// Encode an image header.
///
/// Wire format (little-endian):
/// ```text
/// ┌──────┬──────────┬─────────┬──────────┬─────────┬───────────────┐
/// │ Kind │ Encoding │ Width   │ Height   │ Pad     │ Timestamp µs  │
/// │ (1B) │ (1B)     │ (2B)    │ (2B)     │ (2B)    │ (8B)          │
/// └──────┴──────────┴─────────┴──────────┴─────────┴───────────────┘
/// ```
/// The payload follows immediately and is sent as a separate slice.
pub fn encode_image_header(header: &ImageHeader, dst: &mut BytesMut) {
    dst.reserve(IMAGE_HEADER_SIZE);
    dst.put_u8(header.kind.as_u8());
    dst.put_u8(header.encoding as u8);
    dst.put_u16_le(header.width);
    dst.put_u16_le(header.height);
    dst.put_u16_le(0);
    dst.put_u64_le(header.timestamp);
}

/// Encode an occupancy map update.
///
/// Wire format: `[1][pad][scale_mm:u16]` followed by `x, z, occupancy` i32
/// triples.
pub fn encode_map(scale_mm: u16, tiles: &[Tile], dst: &mut BytesMut) {
    dst.reserve(MAP_HEADER_SIZE + tiles.len() * TILE_SIZE);
    dst.put_u8(MsgKind::MapUpdate.as_u8());
    dst.put_u8(0);
    dst.put_u16_le(scale_mm);
    for tile in tiles {
        dst.put_i32_le(tile.x);
        dst.put_i32_le(tile.z);
        dst.put_i32_le(tile.occupancy);
    }
}

/// Convert a map scale in metres to the 16-bit millimetre header field.
///
/// Returns the truncated value and whether the conversion was exact.
pub fn scale_to_mm(scale_m: f32) -> Result<(u16, bool)> {
    let mm = scale_m * 1000.0;
    if !mm.is_finite() || mm < 0.0 || mm > f32::from(u16::MAX) {
        return Err(WireError::ScaleOutOfRange(scale_m));
    }
    Ok((mm as u16, mm.fract() == 0.0))
}

/// Encode an acknowledgement of `kind`.
pub fn encode_ack(kind: MsgKind) -> [u8; ACK_SIZE] {
    [ACK, kind.as_u8()]
}

/// Decode one complete binary message.
///
/// WebSocket messages are already delimited, so unlike a stream codec there
/// is no partial-read state: anything short is an error.
pub fn decode_binary(src: &[u8]) -> Result<Envelope> {
    let Some(&first) = src.first() else {
        return Err(WireError::Empty);
    };

    match MsgKind::try_from(first)? {
        MsgKind::Ack => {
            if src.len() != ACK_SIZE {
                return Err(WireError::PayloadMismatch {
                    len: src.len(),
                    expected: ACK_SIZE,
                });
            }
            Ok(Envelope::Ack { kind: src[1] })
        }
        MsgKind::MapUpdate => decode_map(src),
        kind => decode_image(kind, src),
    }
}

fn decode_map(src: &[u8]) -> Result<Envelope> {
    if src.len() < MAP_HEADER_SIZE {
        return Err(WireError::Truncated {
            kind: "MAP_UPDATE",
            len: src.len(),
            need: MAP_HEADER_SIZE,
        });
    }

    let mut buf = &src[2..];
    let scale_mm = buf.get_u16_le();
    if buf.len() % TILE_SIZE != 0 {
        return Err(WireError::RaggedMap(buf.len()));
    }

    let mut tiles = Vec::with_capacity(buf.len() / TILE_SIZE);
    while buf.has_remaining() {
        tiles.push(Tile {
            x: buf.get_i32_le(),
            z: buf.get_i32_le(),
            occupancy: buf.get_i32_le(),
        });
    }
    Ok(Envelope::Map { scale_mm, tiles })
}

fn decode_image(kind: MsgKind, src: &[u8]) -> Result<Envelope> {
    if src.len() < IMAGE_HEADER_SIZE {
        return Err(WireError::Truncated {
            kind: crate::kind::kind_name(kind.as_u8()),
            len: src.len(),
            need: IMAGE_HEADER_SIZE,
        });
    }

    let mut buf = &src[1..IMAGE_HEADER_SIZE];
    let encoding = ImageEncoding::try_from(buf.get_u8())?;
    let width = buf.get_u16_le();
    let height = buf.get_u16_le();
    buf.advance(2);
    let timestamp = buf.get_u64_le();

    let header = ImageHeader {
        kind,
        encoding,
        width,
        height,
        timestamp,
    };
    let payload = &src[IMAGE_HEADER_SIZE..];
    if encoding == ImageEncoding::Raw && payload.len() != header.raw_len() {
        return Err(WireError::PayloadMismatch {
            len: payload.len(),
            expected: header.raw_len(),
        });
    }

    Ok(Envelope::Image {
        header,
        payload: Bytes::copy_from_slice(payload),
    })
}
