use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, WireError};
use crate::route::{MessageType, Subsystem};

/// Start-of-frame marker. Excluded from the checksum; used only to
/// (re)synchronize the stream.
pub const SOF: u8 = 0xFE;

/// Wire bytes besides the length field and payload: SOF + header + opcode + FCS.
pub const FIXED_OVERHEAD: usize = 4;

/// Width of the length field, chosen once per link session.
///
/// The protocol defines a 2-byte length field, but some transports narrow
/// it to a single byte on the physical layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LenWidth {
    /// Single-byte length; payloads up to 255 bytes.
    One,
    /// Two-byte little-endian length; payloads up to 65535 bytes.
    #[default]
    Two,
}

impl LenWidth {
    /// Number of bytes the length field occupies on the wire.
    pub const fn field_len(self) -> usize {
        match self {
            LenWidth::One => 1,
            LenWidth::Two => 2,
        }
    }

    /// Largest payload this width can describe.
    pub const fn max_payload(self) -> usize {
        match self {
            LenWidth::One => u8::MAX as usize,
            LenWidth::Two => u16::MAX as usize,
        }
    }
}

/// One protocol message: routing header, opcode, and payload.
///
/// Immutable value object. The packed header byte and the checksum are
/// derived during encode/decode and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// 3-bit message class.
    pub message_type: MessageType,
    /// 5-bit routing target.
    pub subsystem: Subsystem,
    /// Command identifier, meaning defined by (message type, subsystem).
    pub opcode: u8,
    /// Command parameters.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(
        message_type: MessageType,
        subsystem: Subsystem,
        opcode: u8,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            message_type,
            subsystem,
            opcode,
            payload: payload.into(),
        }
    }

    /// The packed header byte: bits 7-5 message type, bits 4-0 subsystem.
    pub fn header_byte(&self) -> u8 {
        (self.message_type.0 << 5) | self.subsystem.0
    }

    /// The total wire size of this frame for the given length-field width.
    pub fn wire_size(&self, width: LenWidth) -> usize {
        FIXED_OVERHEAD + width.field_len() + self.payload.len()
    }
}

/// XOR frame check sequence over everything after the SOF byte.
fn fcs(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Encode a frame into the wire format.
///
/// Wire format (W = length-field width, L = payload length):
/// ```text
/// ┌──────────┬─────────────┬─────────────┬──────────┬────────────┬─────────┐
/// │ SOF (1B) │ Length (WB) │ Header (1B) │ Op (1B)  │ Payload    │ FCS (1B)│
/// │ 0xFE     │ L, LE       │ type|subsys │          │ (L bytes)  │ XOR     │
/// └──────────┴─────────────┴─────────────┴──────────┴────────────┴─────────┘
/// ```
/// The FCS covers the length field through the last payload byte; the SOF
/// is excluded.
pub fn encode_frame(frame: &Frame, width: LenWidth, dst: &mut BytesMut) -> Result<()> {
    if frame.payload.len() > width.max_payload() {
        return Err(WireError::PayloadTooLarge {
            size: frame.payload.len(),
            max: width.max_payload(),
        });
    }
    dst.reserve(frame.wire_size(width));
    let start = dst.len();
    dst.put_u8(SOF);
    match width {
        LenWidth::One => dst.put_u8(frame.payload.len() as u8),
        LenWidth::Two => dst.put_u16_le(frame.payload.len() as u16),
    }
    dst.put_u8(frame.header_byte());
    dst.put_u8(frame.opcode);
    dst.put_slice(&frame.payload);
    let check = fcs(&dst[start + 1..]);
    dst.put_u8(check);
    Ok(())
}

/// Why a candidate frame was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// The first byte is not the start marker.
    BadStartMarker { found: u8 },
    /// The received FCS does not match the recomputed value.
    ChecksumMismatch { computed: u8, received: u8 },
}

/// Outcome of attempting to parse one frame from the front of a buffer.
///
/// `Incomplete` is a normal, frequent result while a frame is still
/// arriving, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// A complete, checksum-verified frame spanning `consumed` bytes
    /// (SOF through FCS inclusive).
    Frame { frame: Frame, consumed: usize },
    /// Not enough bytes buffered to decide.
    Incomplete,
    /// The candidate frame is malformed.
    Invalid(InvalidReason),
}

/// Attempt to parse exactly one frame from the front of `buf`.
///
/// Never inspects bytes beyond what the frame's own length field declares;
/// anything after belongs to the next frame.
pub fn try_decode_one(buf: &[u8], width: LenWidth) -> DecodeOutcome {
    let Some(&first) = buf.first() else {
        return DecodeOutcome::Incomplete;
    };
    if first != SOF {
        return DecodeOutcome::Invalid(InvalidReason::BadStartMarker { found: first });
    }

    let w = width.field_len();
    if buf.len() < 1 + w {
        return DecodeOutcome::Incomplete;
    }
    let len = match width {
        LenWidth::One => buf[1] as usize,
        LenWidth::Two => u16::from_le_bytes([buf[1], buf[2]]) as usize,
    };

    let total = FIXED_OVERHEAD + w + len;
    if buf.len() < total {
        return DecodeOutcome::Incomplete;
    }

    let computed = fcs(&buf[1..total - 1]);
    let received = buf[total - 1];
    if computed != received {
        return DecodeOutcome::Invalid(InvalidReason::ChecksumMismatch { computed, received });
    }

    let header = buf[1 + w];
    let frame = Frame {
        message_type: MessageType((header >> 5) & 0x07),
        subsystem: Subsystem(header & 0x1F),
        opcode: buf[2 + w],
        payload: Bytes::copy_from_slice(&buf[3 + w..3 + w + len]),
    };
    DecodeOutcome::Frame {
        frame,
        consumed: total,
    }
}
