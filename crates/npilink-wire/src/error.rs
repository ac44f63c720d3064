/// Errors that can occur while encoding frames.
///
/// Decode-time anomalies (bad marker, checksum mismatch) are not errors;
/// they are ordinary outcomes carried by [`crate::codec::DecodeOutcome`]
/// and [`crate::reassembler::StreamEvent`].
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The payload exceeds what the configured length-field width can carry.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, WireError>;
