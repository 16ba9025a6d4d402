//! AYAB knitting controller message layer.
//!
//! Every payload is `[kind:1][fields][crc8:1]`. The field layout of each
//! kind depends on the firmware generation, selected up front with a
//! [`WireVariant`]; see [`layout()`] for the table.
//!
//! Decoding is lenient where the protocol allows it:
//! - unknown kind bytes decode to [`Inbound::Unknown`] carrying the raw bytes
//! - a CRC mismatch still yields the parsed message, flagged in [`Decoded::checksum`]
//! - only a length that does not match the layout is rejected

pub mod codec;
pub mod crc;
pub mod error;
pub mod fields;
pub mod kind;
pub mod layout;
pub mod message;
pub mod needles;

pub use codec::{decode_message, encode_into, encode_message};
pub use crc::{crc8, Crc8};
pub use error::{ProtoError, Result};
pub use fields::{BeltShift, Carriage, Direction, FixedString, LineFlags, MachineType};
pub use kind::{MessageKind, Origin};
pub use layout::{layout, FieldSpec, Layout, WireVariant};
pub use message::{
    ChecksumStatus, Confirm, ConfirmInfo, ConfirmLine, Decoded, IndicateState, Inbound, Message,
    PeekConfirm, PeekRequest, PokeRequest, RequestInit, RequestLine, RequestStart, FW_VERSION_LEN,
};
pub use needles::{NeedleSelection, NEEDLE_COUNT, NEEDLE_MASK_LEN};
