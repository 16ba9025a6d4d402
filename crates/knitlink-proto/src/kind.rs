use crate::error::ProtoError;

/// Which side of the link originates a message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Origin {
    Host,
    Device,
}

/// One-byte message discriminator.
///
/// Request and confirm kinds are distinct values; the pairing between them
/// is by convention only and is never inferred from the numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[repr(u8)]
pub enum MessageKind {
    RequestReset = 0x00,
    RequestStart = 0x01,
    RequestInfo = 0x03,
    RequestInit = 0x05,
    ConfirmLine = 0x42,
    RequestState = 0x44,
    RequestLine = 0x82,
    IndicateState = 0x84,
    ConfirmStart = 0xC1,
    ConfirmInfo = 0xC3,
    ConfirmInit = 0xC5,
    DebugPeekRequest = 0xF8,
    DebugPeekConfirm = 0xF9,
    DebugPokeRequest = 0xFA,
}

impl MessageKind {
    /// Every kind in the catalog, in wire-value order.
    pub const ALL: [MessageKind; 14] = [
        MessageKind::RequestReset,
        MessageKind::RequestStart,
        MessageKind::RequestInfo,
        MessageKind::RequestInit,
        MessageKind::ConfirmLine,
        MessageKind::RequestState,
        MessageKind::RequestLine,
        MessageKind::IndicateState,
        MessageKind::ConfirmStart,
        MessageKind::ConfirmInfo,
        MessageKind::ConfirmInit,
        MessageKind::DebugPeekRequest,
        MessageKind::DebugPeekConfirm,
        MessageKind::DebugPokeRequest,
    ];

    /// The wire value.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Kebab-case name used in logs and CLI output.
    pub const fn name(self) -> &'static str {
        match self {
            MessageKind::RequestReset => "request-reset",
            MessageKind::RequestStart => "request-start",
            MessageKind::RequestInfo => "request-info",
            MessageKind::RequestInit => "request-init",
            MessageKind::ConfirmLine => "confirm-line",
            MessageKind::RequestState => "request-state",
            MessageKind::RequestLine => "request-line",
            MessageKind::IndicateState => "indicate-state",
            MessageKind::ConfirmStart => "confirm-start",
            MessageKind::ConfirmInfo => "confirm-info",
            MessageKind::ConfirmInit => "confirm-init",
            MessageKind::DebugPeekRequest => "debug-peek-request",
            MessageKind::DebugPeekConfirm => "debug-peek-confirm",
            MessageKind::DebugPokeRequest => "debug-poke-request",
        }
    }

    /// Which side sends this kind.
    pub const fn origin(self) -> Origin {
        match self {
            MessageKind::RequestReset
            | MessageKind::RequestStart
            | MessageKind::RequestInfo
            | MessageKind::RequestInit
            | MessageKind::ConfirmLine
            | MessageKind::RequestState
            | MessageKind::DebugPeekRequest
            | MessageKind::DebugPokeRequest => Origin::Host,
            MessageKind::RequestLine
            | MessageKind::IndicateState
            | MessageKind::ConfirmStart
            | MessageKind::ConfirmInfo
            | MessageKind::ConfirmInit
            | MessageKind::DebugPeekConfirm => Origin::Device,
        }
    }

    /// Look up a kind by its kebab-case name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = ProtoError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_u8() == value)
            .ok_or(ProtoError::UnknownKind(value))
    }
}

impl From<MessageKind> for u8 {
    fn from(kind: MessageKind) -> Self {
        kind.as_u8()
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
