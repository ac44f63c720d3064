//! Link port management for NPI-style radio coprocessors.
//!
//! This is the "just works" layer. A [`NpiPort`] owns the byte-stream
//! connection to the coprocessor, encodes outbound command frames, and
//! pumps inbound bytes through the wire-level reassembler, surfacing
//! frames and faults to the host on an event channel.

pub mod error;
pub mod port;
pub mod stream;

pub use error::{PortError, Result};
pub use port::{LinkConfig, LinkEvent, LinkFault, NpiPort};
pub use stream::{LinkStream, LinkTransport};
