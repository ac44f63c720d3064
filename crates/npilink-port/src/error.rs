use npilink_wire::WireError;

/// Errors that can occur in port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// `open` was called while the connection is already live.
    #[error("link already open")]
    AlreadyOpen,

    /// The transport failed to establish the connection.
    #[error("failed to open link: {source}")]
    Connect { source: std::io::Error },

    /// The stream closed underneath a write.
    #[error("link disconnected")]
    Disconnected,

    /// Frame encoding failed.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// An I/O error occurred on the underlying stream.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PortError>;
