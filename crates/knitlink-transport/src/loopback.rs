use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::traits::ByteTransport;

#[derive(Debug, Default)]
struct LoopbackState {
    inbound: VecDeque<Vec<u8>>,
    written: Vec<u8>,
    fail_writes: bool,
    closed: bool,
}

/// In-memory transport standing in for a serial device.
///
/// The paired [`LoopbackHandle`] plays the controller side: it queues bytes
/// for the host to read and collects whatever the host wrote. Each queued
/// chunk is delivered by at most one `read_available` call, which lets tests
/// control exactly where read boundaries fall.
#[derive(Debug)]
pub struct LoopbackTransport {
    state: Arc<Mutex<LoopbackState>>,
}

/// Controller-side handle of a [`LoopbackTransport`].
#[derive(Debug, Clone)]
pub struct LoopbackHandle {
    state: Arc<Mutex<LoopbackState>>,
}

impl LoopbackTransport {
    /// Create a transport and the handle that drives it.
    pub fn pair() -> (Self, LoopbackHandle) {
        let state = Arc::new(Mutex::new(LoopbackState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            LoopbackHandle { state },
        )
    }
}

fn lock(state: &Mutex<LoopbackState>) -> MutexGuard<'_, LoopbackState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ByteTransport for LoopbackTransport {
    fn read_available(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(std::io::Error::from(ErrorKind::NotConnected));
        }
        let Some(mut chunk) = state.inbound.pop_front() else {
            return Ok(0);
        };

        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            let rest = chunk.split_off(n);
            state.inbound.push_front(rest);
        }
        Ok(n)
    }

    fn write_all_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(std::io::Error::from(ErrorKind::NotConnected));
        }
        if state.fail_writes {
            return Err(std::io::Error::new(
                ErrorKind::BrokenPipe,
                "loopback write failure injected",
            ));
        }
        state.written.extend_from_slice(bytes);
        Ok(())
    }

    fn close(&mut self) -> std::io::Result<()> {
        let mut state = lock(&self.state);
        if !state.closed {
            debug!("closing loopback transport");
        }
        state.closed = true;
        state.inbound.clear();
        Ok(())
    }

    fn describe(&self) -> String {
        "loopback".to_string()
    }
}

impl LoopbackHandle {
    /// Queue bytes to be returned by the next read.
    pub fn feed(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        lock(&self.state).inbound.push_back(bytes.to_vec());
    }

    /// Queue bytes split into reads of at most `chunk_size` bytes each.
    pub fn feed_chunked(&self, bytes: &[u8], chunk_size: usize) {
        let chunk_size = chunk_size.max(1);
        let mut state = lock(&self.state);
        for chunk in bytes.chunks(chunk_size) {
            state.inbound.push_back(chunk.to_vec());
        }
    }

    /// Take everything the host has written so far.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut lock(&self.state).written)
    }

    /// Make subsequent host writes fail with `BrokenPipe`.
    pub fn fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }

    /// Whether the host side has closed the transport.
    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    /// Number of queued reads not yet consumed by the host.
    pub fn pending_reads(&self) -> usize {
        lock(&self.state).inbound.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_read_returns_zero() {
        let (mut transport, _handle) = LoopbackTransport::pair();
        let mut buf = [0u8; 16];
        assert_eq!(transport.read_available(&mut buf).unwrap(), 0);
    }

    #[test]
    fn each_chunk_is_its_own_read() {
        let (mut transport, handle) = LoopbackTransport::pair();
        handle.feed_chunked(b"abcde", 2);

        let mut buf = [0u8; 16];
        assert_eq!(transport.read_available(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ab");
        assert_eq!(transport.read_available(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"cd");
        assert_eq!(transport.read_available(&mut buf).unwrap(), 1);
        assert_eq!(&buf[..1], b"e");
        assert_eq!(transport.read_available(&mut buf).unwrap(), 0);
    }

    #[test]
    fn short_buffer_keeps_remainder_for_next_read() {
        let (mut transport, handle) = LoopbackTransport::pair();
        handle.feed(b"hello");

        let mut buf = [0u8; 3];
        assert_eq!(transport.read_available(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(transport.read_available(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"lo");
    }

    #[test]
    fn writes_are_collected() {
        let (mut transport, handle) = LoopbackTransport::pair();
        transport.write_all_bytes(b"one").unwrap();
        transport.write_all_bytes(b"two").unwrap();
        assert_eq!(handle.take_written(), b"onetwo");
        assert!(handle.take_written().is_empty());
    }

    #[test]
    fn injected_write_failure() {
        let (mut transport, handle) = LoopbackTransport::pair();
        handle.fail_writes(true);
        let err = transport.write_all_bytes(b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
    }

    #[test]
    fn close_is_idempotent_and_blocks_io() {
        let (mut transport, handle) = LoopbackTransport::pair();
        handle.feed(b"pending");
        transport.close().unwrap();
        transport.close().unwrap();

        assert!(handle.is_closed());
        assert_eq!(handle.pending_reads(), 0);
        let mut buf = [0u8; 4];
        assert!(transport.read_available(&mut buf).is_err());
        assert!(transport.write_all_bytes(b"x").is_err());
    }
}
