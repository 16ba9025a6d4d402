//! Host side of the AYAB knitting controller serial protocol.
//!
//! knitlink talks to the controller over a serial link using SLIP framed,
//! CRC-8 checked messages.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte-stream transport abstraction (serial TTY, loopback)
//! - [`frame`]: SLIP framing
//! - [`proto`]: Message catalog, wire layouts, CRC-8 and needle selection
//! - [`session`]: Open/close lifecycle, send and poll
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use knitlink::proto::MessageKind;
//! use knitlink::session::{Session, SessionConfig};
//!
//! let mut session = Session::new(SessionConfig::default());
//! session.open("/dev/ttyACM0")?;
//! session.request_info()?;
//! if let Some(reply) = session.wait_for(
//!     MessageKind::ConfirmInfo,
//!     Duration::from_secs(2),
//!     Duration::from_millis(10),
//! )? {
//!     println!("{:?}", reply.message());
//! }
//! # Ok::<(), knitlink::session::SessionError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use knitlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use knitlink_frame::*;
}

/// Re-export message types.
pub mod proto {
    pub use knitlink_proto::*;
}

/// Re-export session types.
pub mod session {
    pub use knitlink_session::*;
}
