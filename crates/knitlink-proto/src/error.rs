use crate::kind::MessageKind;

/// Errors that can occur while encoding or decoding messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtoError {
    /// The payload has no kind byte.
    #[error("empty payload")]
    Empty,

    /// The payload length does not match the layout for its kind.
    #[error("{kind} payload length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        kind: MessageKind,
        expected: usize,
        actual: usize,
    },

    /// A needle index outside 0..=199.
    #[error("needle {needle} out of range (0..=199)")]
    NeedleOutOfRange { needle: usize },

    /// A byte that is not in the message catalog.
    #[error("unknown message kind 0x{0:02X}")]
    UnknownKind(u8),
}

pub type Result<T> = std::result::Result<T, ProtoError>;
