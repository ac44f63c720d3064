//! Frame codec and stream reassembly for NPI-style serial radio links.
//!
//! This is the core value-add layer of npilink. Every message is framed
//! with:
//! - A 1-byte start marker (0xFE) for stream synchronization
//! - A 1- or 2-byte payload length (little-endian when 2)
//! - A packed header byte carrying the 3-bit message type and 5-bit subsystem
//! - A 1-byte opcode
//! - A trailing XOR frame check sequence
//!
//! The [`Reassembler`] recovers frame boundaries from a byte stream that
//! may split or merge frames arbitrarily; callers always get complete,
//! checksum-verified frames.

pub mod codec;
pub mod error;
pub mod reassembler;
pub mod route;

pub use codec::{
    encode_frame, try_decode_one, DecodeOutcome, Frame, InvalidReason, LenWidth, FIXED_OVERHEAD,
    SOF,
};
pub use error::{Result, WireError};
pub use reassembler::{Drain, Reassembler, StreamEvent};
pub use route::{MessageType, Subsystem};
