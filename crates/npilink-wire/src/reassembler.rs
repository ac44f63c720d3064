use bytes::{Buf, BytesMut};
use tracing::{trace, warn};

use crate::codec::{try_decode_one, DecodeOutcome, Frame, InvalidReason, LenWidth, SOF};

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// One item in the reassembled stream, emitted in byte order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A complete, checksum-verified frame.
    Frame(Frame),
    /// Bytes preceding a start marker (or a markerless buffer) were
    /// discarded while resynchronizing.
    Desync { discarded: usize },
    /// A candidate frame at a start marker failed validation. Only the
    /// marker byte itself was dropped.
    Invalid(InvalidReason),
}

/// Recovers frame boundaries from a raw byte stream.
///
/// Chunks may arrive at arbitrary boundaries: a single chunk can hold
/// zero, one, several, or a fraction of a frame, with noise in between.
/// [`feed`](Reassembler::feed) appends a chunk; [`poll`](Reassembler::poll)
/// or [`drain`](Reassembler::drain) then yield validated frames and
/// diagnostic events without ever losing or duplicating a byte.
#[derive(Debug)]
pub struct Reassembler {
    buf: BytesMut,
    width: LenWidth,
}

impl Reassembler {
    /// Create a reassembler for the given length-field width.
    pub fn new(width: LenWidth) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            width,
        }
    }

    /// Append a received chunk to the accumulation buffer.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Produce the next stream event, or `None` once the buffered bytes
    /// cannot be decided without more data.
    pub fn poll(&mut self) -> Option<StreamEvent> {
        if self.buf.is_empty() {
            return None;
        }

        // Hunt for the start marker; everything before it is noise.
        let Some(pos) = self.buf.iter().position(|&b| b == SOF) else {
            let discarded = self.buf.len();
            self.buf.clear();
            warn!(discarded, "stream desynchronized, no start marker");
            return Some(StreamEvent::Desync { discarded });
        };
        if pos > 0 {
            self.buf.advance(pos);
            warn!(discarded = pos, "stream desynchronized, skipped to marker");
            return Some(StreamEvent::Desync { discarded: pos });
        }

        match try_decode_one(&self.buf, self.width) {
            DecodeOutcome::Incomplete => None,
            DecodeOutcome::Invalid(reason) => {
                // Drop only the failed marker byte. A corrupted length field
                // could otherwise hide a real frame start inside the span it
                // claims.
                self.buf.advance(1);
                warn!(?reason, "dropped invalid frame candidate");
                Some(StreamEvent::Invalid(reason))
            }
            DecodeOutcome::Frame { frame, consumed } => {
                self.buf.advance(consumed);
                trace!(consumed, opcode = frame.opcode, "frame reassembled");
                Some(StreamEvent::Frame(frame))
            }
        }
    }

    /// Iterate over all events decidable from the bytes buffered so far.
    pub fn drain(&mut self) -> Drain<'_> {
        Drain { inner: self }
    }

    /// Discard all accumulated bytes, including any partial frame.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Number of bytes buffered but not yet consumed into a decided frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// The length-field width this reassembler decodes with.
    pub fn width(&self) -> LenWidth {
        self.width
    }
}

/// Iterator over [`Reassembler::poll`] until more data is needed.
#[derive(Debug)]
pub struct Drain<'a> {
    inner: &'a mut Reassembler,
}

impl Iterator for Drain<'_> {
    type Item = StreamEvent;

    fn next(&mut self) -> Option<StreamEvent> {
        self.inner.poll()
    }
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};

    use super::*;
    use crate::codec::encode_frame;
    use crate::route::{MessageType, Subsystem};

    fn encoded(frame: &Frame, width: LenWidth) -> Vec<u8> {
        let mut wire = BytesMut::new();
        encode_frame(frame, width, &mut wire).unwrap();
        wire.to_vec()
    }

    fn sample_frame(opcode: u8) -> Frame {
        Frame::new(
            MessageType::SREQ,
            Subsystem::SYS,
            opcode,
            vec![0x10, 0x20, 0x30],
        )
    }

    #[test]
    fn single_frame_single_chunk() {
        let frame = sample_frame(0x01);
        let mut reassembler = Reassembler::new(LenWidth::One);
        reassembler.feed(&encoded(&frame, LenWidth::One));

        assert_eq!(reassembler.poll(), Some(StreamEvent::Frame(frame)));
        assert_eq!(reassembler.poll(), None);
        assert_eq!(reassembler.pending(), 0);
    }

    #[test]
    fn split_at_every_boundary() {
        let frame = sample_frame(0x42);
        let wire = encoded(&frame, LenWidth::One);

        for cut in 0..wire.len() {
            let mut reassembler = Reassembler::new(LenWidth::One);
            reassembler.feed(&wire[..cut]);
            let early: Vec<_> = reassembler.drain().collect();
            assert!(early.is_empty(), "no event before the frame completes");

            reassembler.feed(&wire[cut..]);
            let events: Vec<_> = reassembler.drain().collect();
            assert_eq!(
                events,
                vec![StreamEvent::Frame(frame.clone())],
                "split at {cut}"
            );
        }
    }

    #[test]
    fn byte_by_byte_feed() {
        let frame = sample_frame(0x07);
        let wire = encoded(&frame, LenWidth::Two);

        let mut reassembler = Reassembler::new(LenWidth::Two);
        let mut events = Vec::new();
        for byte in &wire {
            reassembler.feed(std::slice::from_ref(byte));
            events.extend(reassembler.drain());
        }
        assert_eq!(events, vec![StreamEvent::Frame(frame)]);
    }

    #[test]
    fn multiple_frames_one_chunk() {
        let frames: Vec<Frame> = (0..4).map(sample_frame).collect();
        let mut wire = Vec::new();
        for frame in &frames {
            wire.extend(encoded(frame, LenWidth::One));
        }

        let mut reassembler = Reassembler::new(LenWidth::One);
        reassembler.feed(&wire);
        let events: Vec<_> = reassembler.drain().collect();

        let expected: Vec<_> = frames.into_iter().map(StreamEvent::Frame).collect();
        assert_eq!(events, expected);
    }

    #[test]
    fn noise_before_frame() {
        let frame = sample_frame(0x09);
        let mut wire = vec![0x00, 0x13, 0x37];
        wire.extend(encoded(&frame, LenWidth::One));

        let mut reassembler = Reassembler::new(LenWidth::One);
        reassembler.feed(&wire);
        let events: Vec<_> = reassembler.drain().collect();

        assert_eq!(
            events,
            vec![
                StreamEvent::Desync { discarded: 3 },
                StreamEvent::Frame(frame)
            ]
        );
    }

    #[test]
    fn markerless_buffer_fully_discarded() {
        let mut reassembler = Reassembler::new(LenWidth::One);
        reassembler.feed(&[0x01, 0x02, 0x03, 0x04]);

        assert_eq!(
            reassembler.poll(),
            Some(StreamEvent::Desync { discarded: 4 })
        );
        assert_eq!(reassembler.poll(), None);
        assert_eq!(reassembler.pending(), 0);
    }

    #[test]
    fn corrupt_frame_then_valid_frame() {
        let good = sample_frame(0x11);
        // Payload chosen so the corrupted span contains no 0xFE byte.
        let mut wire = encoded(&sample_frame(0x22), LenWidth::One);
        let bad_len = wire.len();
        let last = wire.len() - 1;
        wire[last] ^= 0x55;
        wire.extend(encoded(&good, LenWidth::One));

        let mut reassembler = Reassembler::new(LenWidth::One);
        reassembler.feed(&wire);
        let events: Vec<_> = reassembler.drain().collect();

        assert_eq!(events.len(), 3);
        assert!(matches!(
            events[0],
            StreamEvent::Invalid(InvalidReason::ChecksumMismatch { .. })
        ));
        // Only the marker byte was dropped for the bad candidate; the rest
        // of its span is discarded while hunting the next marker.
        assert_eq!(
            events[1],
            StreamEvent::Desync {
                discarded: bad_len - 1
            }
        );
        assert_eq!(events[2], StreamEvent::Frame(good));
    }

    #[test]
    fn one_byte_skip_recovers_frame_inside_corrupt_span() {
        // A frame whose payload is itself a complete encoded frame. With the
        // outer FCS corrupted, skipping the whole declared span would lose
        // the inner frame; dropping only the marker byte must recover it.
        let inner = Frame::new(MessageType::SREQ, Subsystem::MAC, 0x06, Bytes::new());
        let inner_wire = encoded(&inner, LenWidth::One);
        let outer = Frame::new(
            MessageType::AREQ,
            Subsystem::UTIL,
            0x33,
            inner_wire.clone(),
        );
        let mut wire = encoded(&outer, LenWidth::One);
        let last = wire.len() - 1;
        wire[last] ^= 0xA5;

        let mut reassembler = Reassembler::new(LenWidth::One);
        reassembler.feed(&wire);
        let events: Vec<_> = reassembler.drain().collect();

        assert!(matches!(
            events[0],
            StreamEvent::Invalid(InvalidReason::ChecksumMismatch { .. })
        ));
        // Length byte, header byte, opcode precede the inner marker.
        assert_eq!(events[1], StreamEvent::Desync { discarded: 3 });
        assert_eq!(events[2], StreamEvent::Frame(inner));
        // The corrupted FCS byte after the inner frame remains as noise.
        assert_eq!(events[3], StreamEvent::Desync { discarded: 1 });
        assert_eq!(events.len(), 4);
    }

    #[test]
    fn partial_frame_retained_across_polls() {
        let frame = sample_frame(0x55);
        let wire = encoded(&frame, LenWidth::One);

        let mut reassembler = Reassembler::new(LenWidth::One);
        reassembler.feed(&wire[..2]);
        assert_eq!(reassembler.poll(), None);
        assert_eq!(reassembler.pending(), 2);

        reassembler.feed(&wire[2..]);
        assert_eq!(reassembler.poll(), Some(StreamEvent::Frame(frame)));
    }

    #[test]
    fn clear_discards_partial_frame() {
        let frame = sample_frame(0x66);
        let wire = encoded(&frame, LenWidth::One);

        let mut reassembler = Reassembler::new(LenWidth::One);
        reassembler.feed(&wire[..wire.len() - 1]);
        reassembler.clear();
        assert_eq!(reassembler.pending(), 0);
        assert_eq!(reassembler.poll(), None);

        // The tail of the old frame is now noise, not a resumed parse.
        reassembler.feed(&wire[wire.len() - 1..]);
        assert_eq!(
            reassembler.poll(),
            Some(StreamEvent::Desync { discarded: 1 })
        );
    }

    #[test]
    fn two_byte_width_roundtrip_through_stream() {
        let frame = Frame::new(MessageType::SRSP, Subsystem::ZDO, 0x02, vec![0xAB; 400]);
        let wire = encoded(&frame, LenWidth::Two);

        let mut reassembler = Reassembler::new(LenWidth::Two);
        let (a, b) = wire.split_at(wire.len() / 2);
        reassembler.feed(a);
        assert_eq!(reassembler.poll(), None);
        reassembler.feed(b);
        assert_eq!(reassembler.poll(), Some(StreamEvent::Frame(frame)));
    }
}
