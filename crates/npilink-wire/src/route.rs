//! Frame routing fields: message type and subsystem.
//!
//! Both are packed into the single header byte on the wire (bits 7-5 for
//! the message type, bits 4-0 for the subsystem). The named constants
//! cover the catalog the protocol defines; other in-range values are
//! valid but opaque to this layer.

/// 3-bit message class (0-7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageType(pub(crate) u8);

impl MessageType {
    /// Poll request for queued data.
    pub const POLL: Self = Self(0);
    /// Synchronous request; the remote replies with an SRSP.
    pub const SREQ: Self = Self(1);
    /// Asynchronous request or indication.
    pub const AREQ: Self = Self(2);
    /// Synchronous response.
    pub const SRSP: Self = Self(3);

    /// Create a message type, rejecting values that do not fit in 3 bits.
    pub fn new(raw: u8) -> Option<Self> {
        (raw <= 0x07).then_some(Self(raw))
    }

    /// The raw 3-bit value.
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Human-readable name for diagnostics.
    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "POLL",
            1 => "SREQ",
            2 => "AREQ",
            3 => "SRSP",
            _ => "RESERVED",
        }
    }
}

/// 5-bit routing target on the remote processor (0-31).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subsystem(pub(crate) u8);

impl Subsystem {
    /// Reserved.
    pub const RES: Self = Self(0);
    /// System interface.
    pub const SYS: Self = Self(1);
    /// Medium access control layer.
    pub const MAC: Self = Self(2);
    /// Network layer.
    pub const NWK: Self = Self(3);
    /// Application framework.
    pub const AF: Self = Self(4);
    /// Device object layer.
    pub const ZDO: Self = Self(5);
    /// Simple API.
    pub const SAPI: Self = Self(6);
    /// Utilities.
    pub const UTIL: Self = Self(7);
    /// Debug interface.
    pub const DEBUG: Self = Self(8);
    /// Application-defined.
    pub const APP: Self = Self(9);
    /// Bootloader.
    pub const BOOT: Self = Self(13);

    /// Create a subsystem id, rejecting values that do not fit in 5 bits.
    pub fn new(raw: u8) -> Option<Self> {
        (raw <= 0x1F).then_some(Self(raw))
    }

    /// The raw 5-bit value.
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Human-readable name for diagnostics.
    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "RES",
            1 => "SYS",
            2 => "MAC",
            3 => "NWK",
            4 => "AF",
            5 => "ZDO",
            6 => "SAPI",
            7 => "UTIL",
            8 => "DEBUG",
            9 => "APP",
            13 => "BOOT",
            _ => "UNKNOWN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_rejects_out_of_range() {
        assert_eq!(MessageType::new(7), Some(MessageType(7)));
        assert_eq!(MessageType::new(8), None);
    }

    #[test]
    fn subsystem_rejects_out_of_range() {
        assert_eq!(Subsystem::new(31), Some(Subsystem(31)));
        assert_eq!(Subsystem::new(32), None);
    }

    #[test]
    fn known_names() {
        assert_eq!(MessageType::SREQ.name(), "SREQ");
        assert_eq!(MessageType::new(6).unwrap().name(), "RESERVED");
        assert_eq!(Subsystem::ZDO.name(), "ZDO");
        assert_eq!(Subsystem::new(21).unwrap().name(), "UNKNOWN");
    }

    #[test]
    fn raw_roundtrip() {
        assert_eq!(MessageType::AREQ.raw(), 2);
        assert_eq!(Subsystem::UTIL.raw(), 7);
    }
}
