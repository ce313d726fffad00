//! Message kind identifiers.
//!
//! The first byte of every binary message. Kinds below [`KIND_SLOTS`] own an
//! unacked-message counter on the producer side; [`ACK`] is viewer-to-producer
//! only.

use crate::error::WireError;

/// Byte value of [`MsgKind::Ack`].
pub const ACK: u8 = 0xFF;

/// Number of per-kind counter slots (kinds `0..KIND_SLOTS`).
pub const KIND_SLOTS: usize = 6;

/// Binary message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MsgKind {
    /// Occupancy map tiles.
    MapUpdate = 1,
    /// Grayscale fisheye frame.
    FishEye = 2,
    /// Color frame.
    Rgb = 3,
    /// Reserved for person tracking overlays.
    PersonTracking = 4,
    /// Reserved for object recognition overlays.
    ObjectRecognition = 5,
    /// Viewer acknowledgement of a previously received kind.
    Ack = ACK,
}

impl MsgKind {
    /// Wire byte for this kind.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Counter slot for this kind, if it has one.
    pub fn slot(self) -> Option<usize> {
        let slot = self as usize;
        (slot < KIND_SLOTS).then_some(slot)
    }
}

impl TryFrom<u8> for MsgKind {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::MapUpdate),
            2 => Ok(Self::FishEye),
            3 => Ok(Self::Rgb),
            4 => Ok(Self::PersonTracking),
            5 => Ok(Self::ObjectRecognition),
            ACK => Ok(Self::Ack),
            other => Err(WireError::UnknownKind(other)),
        }
    }
}

impl std::fmt::Display for MsgKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(kind_name(self.as_u8()))
    }
}

/// Returns a human-readable name for a kind byte.
pub fn kind_name(id: u8) -> &'static str {
    match id {
        1 => "MAP_UPDATE",
        2 => "FISHEYE",
        3 => "RGB",
        4 => "PT",
        5 => "OR",
        ACK => "ACK",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_are_stable() {
        assert_eq!(MsgKind::MapUpdate.as_u8(), 1);
        assert_eq!(MsgKind::FishEye.as_u8(), 2);
        assert_eq!(MsgKind::Rgb.as_u8(), 3);
        assert_eq!(MsgKind::PersonTracking.as_u8(), 4);
        assert_eq!(MsgKind::ObjectRecognition.as_u8(), 5);
        assert_eq!(MsgKind::Ack.as_u8(), 0xFF);
    }

    #[test]
    fn slots_exclude_ack() {
        assert_eq!(MsgKind::Rgb.slot(), Some(3));
        assert_eq!(MsgKind::MapUpdate.slot(), Some(1));
        assert_eq!(MsgKind::Ack.slot(), None);
    }

    #[test]
    fn unknown_bytes_rejected() {
        assert!(matches!(MsgKind::try_from(0), Err(WireError::UnknownKind(0))));
        assert!(matches!(MsgKind::try_from(6), Err(WireError::UnknownKind(6))));
        assert_eq!(MsgKind::try_from(0xFF).unwrap(), MsgKind::Ack);
    }

    #[test]
    fn names() {
        assert_eq!(kind_name(3), "RGB");
        assert_eq!(kind_name(0x42), "UNKNOWN");
        assert_eq!(MsgKind::FishEye.to_string(), "FISHEYE");
    }
}
