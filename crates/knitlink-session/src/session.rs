use std::collections::VecDeque;
use std::path::Path;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use knitlink_frame::{FrameConfig, SlipDecoder};
use knitlink_proto::{
    decode_message, encode_message, ConfirmLine, Decoded, LineFlags, MachineType, Message,
    MessageKind, NeedleSelection, PeekRequest, PokeRequest, ProtoError, RequestInit, RequestStart,
    WireVariant,
};
use knitlink_transport::BoxedTransport;
#[cfg(unix)]
use knitlink_transport::{SerialConfig, SerialDevice};
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};

/// Bytes requested from the transport per poll.
pub const DEFAULT_READ_CHUNK: usize = 1000;

/// Session configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum bytes read from the transport in one poll.
    pub read_chunk: usize,
    /// Layout table used to encode and decode messages.
    pub variant: WireVariant,
    /// SLIP decoder limits.
    pub frame: FrameConfig,
    /// Line settings used by [`Session::open`].
    #[cfg(unix)]
    pub serial: SerialConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_chunk: DEFAULT_READ_CHUNK,
            variant: WireVariant::default(),
            frame: FrameConfig::default(),
            #[cfg(unix)]
            serial: SerialConfig::default(),
        }
    }
}

/// Counters kept for the lifetime of a session object (not reset on close).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Complete SLIP frames taken off the wire.
    pub frames_received: u64,
    /// Decoded messages handed to the caller, corrupt ones included.
    pub messages_delivered: u64,
    /// Payloads dropped because their length did not match the layout.
    pub rejected: u64,
    /// Delivered messages whose CRC did not match.
    pub checksum_failures: u64,
    /// Malformed escapes and oversized frames seen by the decoder.
    pub frame_anomalies: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

/// A payload that was dropped instead of delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub error: ProtoError,
    pub payload: Bytes,
}

/// One host-side connection to a knitting controller.
///
/// Owns the transport handle, the SLIP frame buffer and the queue of
/// payloads completed but not yet returned. All operations take
/// `&mut self`; share a session between threads behind a `Mutex`.
///
/// Dropping the session closes the transport.
pub struct Session {
    transport: Option<BoxedTransport>,
    port: Option<String>,
    decoder: SlipDecoder,
    pending: VecDeque<Bytes>,
    unclaimed: VecDeque<Decoded>,
    read_buf: Vec<u8>,
    config: SessionConfig,
    stats: SessionStats,
    last_rejection: Option<Rejection>,
}

impl Session {
    /// Create a closed session.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            transport: None,
            port: None,
            decoder: SlipDecoder::with_config(config.frame),
            pending: VecDeque::new(),
            unclaimed: VecDeque::new(),
            read_buf: Vec::new(),
            config,
            stats: SessionStats::default(),
            last_rejection: None,
        }
    }

    /// Create a session bound to an already acquired transport.
    pub fn with_transport(transport: BoxedTransport, config: SessionConfig) -> Self {
        let mut session = Self::new(config);
        session.bind(transport, None);
        session
    }

    /// Open the serial device at `port`. Does nothing if already open.
    pub fn open(&mut self, port: impl AsRef<Path>) -> Result<()> {
        let path = port.as_ref();
        if self.is_open() {
            debug!(port = %path.display(), "session already open");
            return Ok(());
        }

        #[cfg(unix)]
        {
            let device = SerialDevice::open_with_config(path, self.config.serial).map_err(
                |source| SessionError::Open {
                    port: path.display().to_string(),
                    source,
                },
            )?;
            self.bind(Box::new(device), Some(path.display().to_string()));
            Ok(())
        }

        #[cfg(not(unix))]
        {
            Err(SessionError::Open {
                port: path.display().to_string(),
                source: knitlink_transport::TransportError::Open {
                    path: path.to_path_buf(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::Unsupported,
                        "serial devices are only supported on unix",
                    ),
                },
            })
        }
    }

    /// Bind an injected transport. Does nothing if already open; the
    /// offered transport is dropped in that case.
    pub fn open_with(&mut self, transport: BoxedTransport) {
        if self.is_open() {
            debug!(offered = %transport.describe(), "session already open");
            return;
        }
        self.bind(transport, None);
    }

    fn bind(&mut self, transport: BoxedTransport, port: Option<String>) {
        info!(
            transport = %transport.describe(),
            variant = ?self.config.variant,
            "session opened"
        );
        self.clear_buffers();
        self.transport = Some(transport);
        self.port = port;
    }

    /// Release the transport and discard buffered data.
    ///
    /// Closing a session that is not open is a no-op.
    pub fn close(&mut self) {
        let Some(mut transport) = self.transport.take() else {
            return;
        };
        let name = transport.describe();
        if let Err(err) = transport.close() {
            warn!(transport = %name, error = %err, "error closing transport");
        }
        drop(transport);

        let discarded = self.pending.len() + self.unclaimed.len();
        self.clear_buffers();
        info!(transport = %name, discarded, "session closed");
        self.port = None;
    }

    fn clear_buffers(&mut self) {
        self.decoder.reset();
        self.pending.clear();
        self.unclaimed.clear();
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Path of the serial device opened with [`Session::open`].
    ///
    /// `None` when closed or bound to an injected transport.
    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    /// Encode, frame and write one message.
    pub fn send(&mut self, message: &Message) -> Result<()> {
        let payload = encode_message(message, self.config.variant);
        debug!(kind = %message.kind(), payload = ?&payload[..], "tx");
        self.send_raw(&payload)
    }

    /// Frame and write an already encoded payload.
    pub fn send_raw(&mut self, payload: &[u8]) -> Result<()> {
        let transport = self.transport.as_mut().ok_or(SessionError::NotOpen)?;

        let mut frame = BytesMut::with_capacity(payload.len() * 2 + 2);
        knitlink_frame::encode(payload, &mut frame);
        transport
            .write_all_bytes(&frame)
            .map_err(SessionError::Write)?;

        self.stats.bytes_written += frame.len() as u64;
        Ok(())
    }

    /// Perform at most one bounded read and return the oldest complete
    /// message, if any.
    ///
    /// `Ok(None)` means no message is available yet, or the session is
    /// closed. Payloads with the wrong length for their kind are skipped and
    /// recorded (see [`Session::last_rejection`]); messages with a bad CRC
    /// are returned with the mismatch flagged.
    pub fn poll_next_message(&mut self) -> Result<Option<Decoded>> {
        if let Some(decoded) = self.unclaimed.pop_front() {
            return Ok(Some(decoded));
        }
        self.poll_transport()
    }

    fn poll_transport(&mut self) -> Result<Option<Decoded>> {
        let Some(transport) = self.transport.as_mut() else {
            return Ok(None);
        };

        self.read_buf.resize(self.config.read_chunk, 0);
        let n = transport
            .read_available(&mut self.read_buf)
            .map_err(SessionError::Read)?;

        if n > 0 {
            self.stats.bytes_read += n as u64;
            let frames = self.decoder.decode(&self.read_buf[..n]);
            self.stats.frames_received += frames.len() as u64;
            self.stats.frame_anomalies = self.decoder.anomalies();
            self.pending.extend(frames);
        }

        Ok(self.next_pending())
    }

    fn next_pending(&mut self) -> Option<Decoded> {
        while let Some(payload) = self.pending.pop_front() {
            match decode_message(&payload, self.config.variant) {
                Ok(decoded) => {
                    if decoded.is_corrupt() {
                        self.stats.checksum_failures += 1;
                    }
                    self.stats.messages_delivered += 1;
                    debug!(kind = ?decoded.kind(), payload = ?&payload[..], "rx");
                    return Some(decoded);
                }
                Err(error) => {
                    warn!(error = %error, payload = ?&payload[..], "rejected payload");
                    self.stats.rejected += 1;
                    self.last_rejection = Some(Rejection { error, payload });
                }
            }
        }
        None
    }

    /// Poll until a message of `kind` arrives or `timeout` elapses,
    /// sleeping `idle` between empty polls.
    ///
    /// Other messages received meanwhile are kept and returned first by
    /// later calls to [`Session::poll_next_message`], in arrival order.
    /// Returns `Ok(None)` on timeout.
    pub fn wait_for(
        &mut self,
        kind: MessageKind,
        timeout: Duration,
        idle: Duration,
    ) -> Result<Option<Decoded>> {
        if let Some(pos) = self.unclaimed.iter().position(|d| d.kind() == Some(kind)) {
            return Ok(self.unclaimed.remove(pos));
        }
        if !self.is_open() {
            return Err(SessionError::NotOpen);
        }

        let deadline = Instant::now() + timeout;
        loop {
            match self.poll_transport()? {
                Some(decoded) if decoded.kind() == Some(kind) => return Ok(Some(decoded)),
                Some(other) => {
                    debug!(waiting_for = %kind, got = ?other.kind(), "holding message");
                    self.unclaimed.push_back(other);
                }
                None => {
                    let now = Instant::now();
                    if now >= deadline {
                        debug!(%kind, ?timeout, "wait timed out");
                        return Ok(None);
                    }
                    std::thread::sleep(idle.min(deadline - now));
                }
            }
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// The most recent payload dropped for a length mismatch.
    pub fn last_rejection(&self) -> Option<&Rejection> {
        self.last_rejection.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn variant(&self) -> WireVariant {
        self.config.variant
    }

    /// Switch layout tables. Applies to messages sent and payloads decoded
    /// from now on.
    pub fn set_variant(&mut self, variant: WireVariant) {
        self.config.variant = variant;
    }

    pub fn request_reset(&mut self) -> Result<()> {
        self.send(&Message::RequestReset)
    }

    pub fn request_info(&mut self) -> Result<()> {
        self.send(&Message::RequestInfo)
    }

    pub fn request_state(&mut self) -> Result<()> {
        self.send(&Message::RequestState)
    }

    pub fn request_init(&mut self, machine: MachineType) -> Result<()> {
        self.send(&Message::RequestInit(RequestInit { machine }))
    }

    pub fn request_start(
        &mut self,
        start_needle: u8,
        stop_needle: u8,
        continuous: bool,
    ) -> Result<()> {
        self.send(&Message::RequestStart(RequestStart {
            start_needle,
            stop_needle,
            continuous_reporting: continuous,
            machine: None,
        }))
    }

    pub fn confirm_line(
        &mut self,
        line_number: u8,
        needles: &NeedleSelection,
        flags: LineFlags,
    ) -> Result<()> {
        self.send(&Message::ConfirmLine(ConfirmLine {
            line_number,
            needles: *needles,
            flags,
            color: 0,
        }))
    }

    pub fn peek(&mut self, address: u16) -> Result<()> {
        self.send(&Message::DebugPeekRequest(PeekRequest { address }))
    }

    pub fn poke(&mut self, address: u16, value: u8) -> Result<()> {
        self.send(&Message::DebugPokeRequest(PokeRequest { address, value }))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("port", &self.port)
            .field("variant", &self.config.variant)
            .field("pending", &self.pending.len())
            .field("unclaimed", &self.unclaimed.len())
            .field("stats", &self.stats)
            .finish()
    }
}

/// Whether a confirm-style reply reports success.
pub fn confirm_ok(decoded: &Decoded) -> Option<bool> {
    match decoded.message()? {
        Message::ConfirmInit(confirm) | Message::ConfirmStart(confirm) => {
            Some(confirm.is_success())
        }
        _ => None,
    }
}
