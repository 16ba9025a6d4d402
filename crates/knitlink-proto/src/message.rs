use bytes::Bytes;

use crate::fields::{BeltShift, Carriage, Direction, FixedString, LineFlags, MachineType};
use crate::kind::MessageKind;
use crate::needles::NeedleSelection;

/// Length of the firmware version string in `confirm-info`.
pub const FW_VERSION_LEN: usize = 16;

/// `request-start`: begin knitting between two needles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RequestStart {
    pub start_needle: u8,
    pub stop_needle: u8,
    pub continuous_reporting: bool,
    /// Only carried by the legacy layout.
    pub machine: Option<MachineType>,
}

/// `request-init`: select the machine model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RequestInit {
    pub machine: MachineType,
}

/// `confirm-init` / `confirm-start`: zero means success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Confirm {
    pub error: u8,
}

impl Confirm {
    pub fn is_success(&self) -> bool {
        self.error == 0
    }
}

/// `request-line`: the device asks for the next row of the pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RequestLine {
    pub row: u8,
    /// Always zero in the legacy layout.
    pub error: u8,
}

/// `confirm-line`: needle selection for one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ConfirmLine {
    pub line_number: u8,
    pub needles: NeedleSelection,
    pub flags: LineFlags,
    /// Only carried by the legacy layout.
    pub color: u8,
}

/// `confirm-info`: API and firmware versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ConfirmInfo {
    pub api_version: u8,
    pub fw_major: u8,
    pub fw_minor: u8,
    pub fw_patch: u8,
    pub fw_version: FixedString<FW_VERSION_LEN>,
}

impl ConfirmInfo {
    /// `major.minor.patch`.
    pub fn version_triple(&self) -> String {
        format!("{}.{}.{}", self.fw_major, self.fw_minor, self.fw_patch)
    }
}

/// `indicate-state`: carriage and sensor snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct IndicateState {
    pub error: u8,
    pub state: u8,
    pub hall_left: u16,
    pub hall_right: u16,
    pub carriage: Carriage,
    pub position: u8,
    pub direction: Direction,
    pub hall_active: Direction,
    pub belt_shift: BeltShift,
}

/// `debug-peek-request`: read one byte of controller memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PeekRequest {
    pub address: u16,
}

/// `debug-peek-confirm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PeekConfirm {
    pub value: u8,
}

/// `debug-poke-request`: write one byte of controller memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PokeRequest {
    pub address: u16,
    pub value: u8,
}

/// A message from the catalog, with typed fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "kebab-case"))]
pub enum Message {
    RequestReset,
    RequestStart(RequestStart),
    RequestInit(RequestInit),
    ConfirmInit(Confirm),
    ConfirmStart(Confirm),
    RequestLine(RequestLine),
    ConfirmLine(ConfirmLine),
    RequestInfo,
    ConfirmInfo(ConfirmInfo),
    RequestState,
    IndicateState(IndicateState),
    DebugPeekRequest(PeekRequest),
    DebugPeekConfirm(PeekConfirm),
    DebugPokeRequest(PokeRequest),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::RequestReset => MessageKind::RequestReset,
            Message::RequestStart(_) => MessageKind::RequestStart,
            Message::RequestInit(_) => MessageKind::RequestInit,
            Message::ConfirmInit(_) => MessageKind::ConfirmInit,
            Message::ConfirmStart(_) => MessageKind::ConfirmStart,
            Message::RequestLine(_) => MessageKind::RequestLine,
            Message::ConfirmLine(_) => MessageKind::ConfirmLine,
            Message::RequestInfo => MessageKind::RequestInfo,
            Message::ConfirmInfo(_) => MessageKind::ConfirmInfo,
            Message::RequestState => MessageKind::RequestState,
            Message::IndicateState(_) => MessageKind::IndicateState,
            Message::DebugPeekRequest(_) => MessageKind::DebugPeekRequest,
            Message::DebugPeekConfirm(_) => MessageKind::DebugPeekConfirm,
            Message::DebugPokeRequest(_) => MessageKind::DebugPokeRequest,
        }
    }
}

/// Outcome of checking the trailing CRC byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumStatus {
    Valid,
    /// `expected` is the computed CRC, `actual` the byte received.
    Mismatch { expected: u8, actual: u8 },
    /// Not checked: the layout of the message is unknown.
    Unchecked,
}

impl ChecksumStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, ChecksumStatus::Valid)
    }
}

/// A decoded inbound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Known(Message),
    /// Kind byte not in the catalog; the whole payload, kind byte included.
    Unknown(Bytes),
}

/// Result of decoding one frame payload.
///
/// Corrupted-but-parseable payloads are still decoded; check
/// [`Decoded::is_corrupt`] before trusting the fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub inbound: Inbound,
    pub checksum: ChecksumStatus,
    /// The payload exactly as received.
    pub raw: Bytes,
}

impl Decoded {
    pub fn is_corrupt(&self) -> bool {
        matches!(self.checksum, ChecksumStatus::Mismatch { .. })
    }

    /// The catalog kind, or `None` for unknown payloads.
    pub fn kind(&self) -> Option<MessageKind> {
        match &self.inbound {
            Inbound::Known(message) => Some(message.kind()),
            Inbound::Unknown(_) => None,
        }
    }

    pub fn message(&self) -> Option<&Message> {
        match &self.inbound {
            Inbound::Known(message) => Some(message),
            Inbound::Unknown(_) => None,
        }
    }

    /// The received CRC byte (last payload byte), if one was checked.
    pub fn crc_byte(&self) -> Option<u8> {
        match self.checksum {
            ChecksumStatus::Unchecked => None,
            _ => self.raw.last().copied(),
        }
    }
}
