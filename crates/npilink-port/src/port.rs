use std::io::{ErrorKind, Read, Write as _};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use npilink_wire::{
    encode_frame, Frame, InvalidReason, LenWidth, MessageType, Reassembler, StreamEvent, Subsystem,
};
use tracing::{debug, info, warn};

use crate::error::{PortError, Result};
use crate::stream::{LinkStream, LinkTransport};

const READ_CHUNK_SIZE: usize = 1024;

/// Configuration for a link port.
#[derive(Debug, Clone, Default)]
pub struct LinkConfig {
    /// Width of the length field, fixed for the whole session.
    pub len_width: LenWidth,
    /// Read timeout applied to the inbound half of the stream.
    pub read_timeout: Option<Duration>,
    /// Write timeout applied to the outbound half of the stream.
    pub write_timeout: Option<Duration>,
}

/// Notifications surfaced to the host on the event channel.
#[derive(Debug)]
pub enum LinkEvent {
    /// The connection was established.
    Opened,
    /// The connection was released by `close`.
    Closed,
    /// A complete, validated frame arrived.
    Frame(Frame),
    /// A non-fatal link fault. The stream keeps running where possible;
    /// corrupt bytes on a live link are an operating condition, not a bug.
    Fault(LinkFault),
}

/// Faults reported on the event channel.
#[derive(Debug)]
pub enum LinkFault {
    /// A candidate frame failed validation and was dropped.
    Invalid(InvalidReason),
    /// Noise bytes were discarded while hunting for a start marker.
    Desync { discarded: usize },
    /// The remote end closed the stream.
    Disconnected,
    /// The inbound read failed.
    Io(std::io::Error),
}

struct Live<S> {
    stream: S,
    reader: JoinHandle<()>,
    closing: Arc<AtomicBool>,
}

/// A framed link port over an injected byte-stream transport.
///
/// Owns the connection lifecycle between `open` and `close`. Outbound
/// frames go through [`send`](NpiPort::send); inbound bytes are pumped by
/// a reader thread through a [`Reassembler`] and surfaced on the event
/// channel returned by [`NpiPort::new`], in the exact byte order they
/// appeared on the stream.
pub struct NpiPort<T: LinkTransport> {
    transport: T,
    config: LinkConfig,
    events: Sender<LinkEvent>,
    state: Mutex<Option<Live<T::Stream>>>,
}

impl<T: LinkTransport> NpiPort<T> {
    /// Create a port and the event channel the host drains.
    pub fn new(transport: T, config: LinkConfig) -> (Self, Receiver<LinkEvent>) {
        let (events, receiver) = mpsc::channel();
        let port = Self {
            transport,
            config,
            events,
            state: Mutex::new(None),
        };
        (port, receiver)
    }

    /// Establish the connection and start the reader thread.
    pub fn open(&self) -> Result<()> {
        let mut state = self.lock_state();
        if state.is_some() {
            return Err(PortError::AlreadyOpen);
        }
        self.ensure_open(&mut state)?;
        Ok(())
    }

    /// Whether the connection is currently live.
    pub fn is_open(&self) -> bool {
        self.lock_state().is_some()
    }

    /// Release the connection. Closing an already-closed port is a no-op.
    ///
    /// Unblocks the pending read, joins the reader thread, and discards any
    /// partially accumulated frame. No notification fires after this
    /// returns except the final `Closed`.
    pub fn close(&self) {
        let mut state = self.lock_state();
        let Some(live) = state.take() else {
            return;
        };
        live.closing.store(true, Ordering::SeqCst);
        if let Err(err) = live.stream.shutdown() {
            debug!(error = %err, "stream shutdown failed");
        }
        let _ = live.reader.join();
        drop(live.stream);
        info!("link closed");
        let _ = self.events.send(LinkEvent::Closed);
    }

    /// Encode and send a command frame, opening the connection first if it
    /// is not already open. Returns the exact bytes written.
    pub fn send(
        &self,
        message_type: MessageType,
        subsystem: Subsystem,
        opcode: u8,
        payload: impl Into<Bytes>,
    ) -> Result<Bytes> {
        self.send_frame(&Frame::new(message_type, subsystem, opcode, payload))
    }

    /// Encode and send a prepared frame. Returns the exact bytes written.
    pub fn send_frame(&self, frame: &Frame) -> Result<Bytes> {
        let mut wire = BytesMut::with_capacity(frame.wire_size(self.config.len_width));
        encode_frame(frame, self.config.len_width, &mut wire)?;
        let wire = wire.freeze();

        let mut state = self.lock_state();
        let live = self.ensure_open(&mut state)?;

        let mut offset = 0usize;
        while offset < wire.len() {
            match live.stream.write(&wire[offset..]) {
                Ok(0) => return Err(PortError::Disconnected),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(PortError::Io(err)),
            }
        }
        loop {
            match live.stream.flush() {
                Ok(()) => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(PortError::Io(err)),
            }
        }

        debug!(
            bytes = wire.len(),
            msg_type = frame.message_type.name(),
            subsystem = frame.subsystem.name(),
            opcode = frame.opcode,
            "frame sent"
        );
        Ok(wire)
    }

    /// Current port configuration.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    fn lock_state(&self) -> MutexGuard<'_, Option<Live<T::Stream>>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connect and spawn the reader thread if the port is not open yet.
    fn ensure_open<'a>(
        &self,
        state: &'a mut Option<Live<T::Stream>>,
    ) -> Result<&'a mut Live<T::Stream>> {
        match state {
            Some(live) => Ok(live),
            None => {
                let stream = self
                    .transport
                    .open()
                    .map_err(|source| PortError::Connect { source })?;
                stream.set_read_timeout(self.config.read_timeout)?;
                stream.set_write_timeout(self.config.write_timeout)?;
                let reader_stream = stream.try_clone()?;

                // Opened must hit the channel before the reader thread can
                // emit its first frame.
                info!("link opened");
                let _ = self.events.send(LinkEvent::Opened);

                let closing = Arc::new(AtomicBool::new(false));
                let spawned = std::thread::Builder::new()
                    .name("npilink-read".into())
                    .spawn({
                        let events = self.events.clone();
                        let closing = Arc::clone(&closing);
                        let width = self.config.len_width;
                        move || read_loop(reader_stream, width, &events, &closing)
                    });
                let reader = match spawned {
                    Ok(handle) => handle,
                    Err(err) => {
                        // Balance the Opened already emitted; the stream is
                        // dropped and the port stays closed.
                        let _ = self.events.send(LinkEvent::Closed);
                        return Err(PortError::Io(err));
                    }
                };
                Ok(state.insert(Live {
                    stream,
                    reader,
                    closing,
                }))
            }
        }
    }
}

impl<T: LinkTransport> Drop for NpiPort<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Pump raw chunks from the stream through the reassembler until the
/// stream ends or the port starts closing.
fn read_loop<S: Read>(
    mut stream: S,
    width: LenWidth,
    events: &Sender<LinkEvent>,
    closing: &AtomicBool,
) {
    let mut reassembler = Reassembler::new(width);
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        if closing.load(Ordering::SeqCst) {
            return;
        }
        let read = match stream.read(&mut chunk) {
            Ok(0) => {
                if !closing.load(Ordering::SeqCst) {
                    warn!("link disconnected by remote");
                    let _ = events.send(LinkEvent::Fault(LinkFault::Disconnected));
                }
                return;
            }
            Ok(n) => n,
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
                ) =>
            {
                continue;
            }
            Err(err) => {
                if !closing.load(Ordering::SeqCst) {
                    warn!(error = %err, "link read failed");
                    let _ = events.send(LinkEvent::Fault(LinkFault::Io(err)));
                }
                return;
            }
        };

        reassembler.feed(&chunk[..read]);
        for event in reassembler.drain() {
            if closing.load(Ordering::SeqCst) {
                return;
            }
            let event = match event {
                StreamEvent::Frame(frame) => {
                    debug!(
                        opcode = frame.opcode,
                        len = frame.payload.len(),
                        "frame received"
                    );
                    LinkEvent::Frame(frame)
                }
                StreamEvent::Desync { discarded } => {
                    LinkEvent::Fault(LinkFault::Desync { discarded })
                }
                StreamEvent::Invalid(reason) => LinkEvent::Fault(LinkFault::Invalid(reason)),
            };
            if events.send(event).is_err() {
                // Host dropped the receiver; nothing left to notify.
                return;
            }
        }
    }
}
