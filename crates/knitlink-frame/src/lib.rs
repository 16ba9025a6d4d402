//! SLIP framing for the AYAB serial protocol.
//!
//! The controller link is a plain byte stream; message boundaries are
//! marked with SLIP (RFC 1055):
//! - `0xC0` ends a frame (and the encoder also opens each frame with one)
//! - `0xDB` escapes a literal `0xC0` (`DB DC`) or `0xDB` (`DB DD`)
//!
//! Decoding is incremental: feed raw chunks as they arrive and collect
//! whole payloads. Malformed input is never fatal; it is reported as a
//! [`FrameAnomaly`] and the decoder resynchronizes at the next end marker.

#[cfg(feature = "async")]
pub mod codec;
pub mod error;
pub mod slip;

#[cfg(feature = "async")]
pub use codec::SlipCodec;
pub use error::FrameAnomaly;
pub use slip::{
    encode, encode_to_vec, FrameConfig, SlipDecoder, DEFAULT_MAX_FRAME_LEN, END, ESC, ESC_END,
    ESC_ESC,
};
