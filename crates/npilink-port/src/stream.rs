use std::io::{Read, Write};
use std::time::Duration;

/// A connected duplex byte stream carrying the framed link.
///
/// The physical transport (a serial line in production, a socket pair in
/// tests) lives behind this trait. The port needs independent read and
/// write handles over the same resource, and a way to unblock a pending
/// read when the link is closed.
pub trait LinkStream: Read + Write + Send + Sized + 'static {
    /// Clone the stream into an independent handle for the reader thread.
    fn try_clone(&self) -> std::io::Result<Self>;

    /// Tear the stream down, promptly unblocking any pending read.
    fn shutdown(&self) -> std::io::Result<()>;

    /// Set a read timeout on the stream, if supported.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()>;

    /// Set a write timeout on the stream, if supported.
    fn set_write_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()>;
}

#[cfg(unix)]
impl LinkStream for std::os::unix::net::UnixStream {
    fn try_clone(&self) -> std::io::Result<Self> {
        std::os::unix::net::UnixStream::try_clone(self)
    }

    fn shutdown(&self) -> std::io::Result<()> {
        match std::os::unix::net::UnixStream::shutdown(self, std::net::Shutdown::Both) {
            // Already torn down by the peer; close must stay idempotent.
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        std::os::unix::net::UnixStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        std::os::unix::net::UnixStream::set_write_timeout(self, timeout)
    }
}

/// Opens the byte-stream connection a port runs over.
///
/// The port holds the transport for its whole lifetime and may open it
/// again after a `close`; each `open` call must produce a fresh stream or
/// fail (resource busy, unavailable).
pub trait LinkTransport: Send {
    type Stream: LinkStream;

    /// Establish the connection.
    fn open(&self) -> std::io::Result<Self::Stream>;
}
