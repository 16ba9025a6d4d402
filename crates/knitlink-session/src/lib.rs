//! Transport session for the AYAB serial protocol.
//!
//! A [`Session`] pumps bytes between a [`ByteTransport`](knitlink_transport::ByteTransport)
//! and typed messages: outbound messages are encoded and SLIP framed in one
//! write, inbound bytes are reassembled into frames and decoded on demand by
//! [`Session::poll_next_message`]. Polling never blocks for a full message;
//! callers run their own loop, or use [`Session::wait_for`] for a single
//! request/confirm exchange.

pub mod error;
pub mod session;

pub use error::{Result, SessionError};
pub use session::{
    confirm_ok, Rejection, Session, SessionConfig, SessionStats, DEFAULT_READ_CHUNK,
};
