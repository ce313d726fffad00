//! Wire protocol between a sensorview producer and a browser viewer.
//!
//! Binary messages carry image frames, occupancy map updates and acks; each
//! starts with a [`MsgKind`] byte. Text messages are JSON documents with a
//! mandatory `"type"` field, modelled by [`ViewerMessage`] outbound and
//! [`ControlCommand`] inbound.

pub mod codec;
pub mod control;
pub mod error;
pub mod kind;
pub mod messages;

pub use codec::{
    decode_binary, encode_ack, encode_image_header, encode_map, scale_to_mm, Envelope,
    ImageEncoding, ImageHeader, Tile, ACK_SIZE, IMAGE_HEADER_SIZE, MAP_HEADER_SIZE, TILE_SIZE,
};
pub use control::{parse_control, ControlCommand, TYPE_CONTROL, TYPE_TRACK};
pub use error::{Result, WireError};
pub use kind::{kind_name, MsgKind, ACK, KIND_SLOTS};
pub use messages::{
    BoundingBox, FpsReport, ObjectEntry, PersonEntry, Point2, Point3, ViewerMessage,
};
