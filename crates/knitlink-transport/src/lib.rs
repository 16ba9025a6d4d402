//! Byte-stream transport abstraction for the AYAB serial link.
//!
//! Provides a unified interface over the ways a host can reach the knitting
//! machine controller:
//! - Serial TTY devices and pseudo-terminals (Linux/macOS)
//! - An in-memory loopback for tests and self-checks
//!
//! This is the lowest layer of knitlink. Everything else builds on top of
//! the [`ByteTransport`] trait provided here.

pub mod error;
pub mod loopback;
pub mod traits;

#[cfg(unix)]
pub mod serial;

pub use error::{Result, TransportError};
pub use loopback::{LoopbackHandle, LoopbackTransport};
pub use traits::{BoxedTransport, ByteTransport, IoTransport};

#[cfg(unix)]
pub use serial::{SerialConfig, SerialDevice, DEFAULT_BAUD_RATE};
