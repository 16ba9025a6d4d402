//! Static wire layout table keyed by `(kind, variant)`.
//!
//! ```text
//! ┌──────────┬──────────────────────────────┬──────────┐
//! │ kind (1) │ fields, in table order       │ crc8 (1) │
//! └──────────┴──────────────────────────────┴──────────┘
//! ```
//!
//! The CRC covers every byte before it, kind byte included, seed 0.
//! Legacy firmware sends its own messages without the CRC byte; it only
//! checks the CRC on what the host sends.

use crate::kind::{MessageKind, Origin};
use crate::needles::NEEDLE_MASK_LEN;

/// Firmware generation whose layouts are used on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum WireVariant {
    /// API v6 firmware.
    #[default]
    Current,
    /// Older firmware with shorter info/line messages and big-endian hall values.
    Legacy,
}

/// One fixed-width field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSpec {
    U8,
    U16Le,
    U16Be,
    Bytes(usize),
    NeedleMask,
}

impl FieldSpec {
    pub const fn width(self) -> usize {
        match self {
            FieldSpec::U8 => 1,
            FieldSpec::U16Le | FieldSpec::U16Be => 2,
            FieldSpec::Bytes(n) => n,
            FieldSpec::NeedleMask => NEEDLE_MASK_LEN,
        }
    }
}

/// Field layout of one kind under one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub kind: MessageKind,
    pub variant: WireVariant,
    fields: &'static [FieldSpec],
}

impl Layout {
    /// Whether a CRC byte follows the fields.
    pub fn has_crc(&self) -> bool {
        match self.variant {
            WireVariant::Current => true,
            WireVariant::Legacy => self.kind.origin() == Origin::Host,
        }
    }

    /// Fields between the kind byte and the CRC byte.
    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    /// Width of the fields alone.
    pub fn body_len(&self) -> usize {
        self.fields.iter().map(|f| f.width()).sum()
    }

    /// Full payload length: kind byte, fields, CRC byte if any.
    pub fn wire_len(&self) -> usize {
        1 + self.body_len() + usize::from(self.has_crc())
    }
}

use FieldSpec::{Bytes, NeedleMask, U16Be, U16Le, U8};

const NONE: &[FieldSpec] = &[];
const ONE: &[FieldSpec] = &[U8];
const TWO: &[FieldSpec] = &[U8, U8];
const THREE: &[FieldSpec] = &[U8, U8, U8];

// error, state, hall-left, hall-right, carriage, position, direction, hall-active, belt-shift
const INDICATE_STATE: &[FieldSpec] = &[U8, U8, U16Le, U16Le, U8, U8, U8, U8, U8];
// ready, hall-left, hall-right, carriage, position, direction
const INDICATE_STATE_LEGACY: &[FieldSpec] = &[U8, U16Be, U16Be, U8, U8, U8];

// line, mask, flags
const CONFIRM_LINE: &[FieldSpec] = &[U8, NeedleMask, U8];
// line, color, flags, mask
const CONFIRM_LINE_LEGACY: &[FieldSpec] = &[U8, U8, U8, NeedleMask];

// api, major, minor, patch, version string
const CONFIRM_INFO: &[FieldSpec] = &[U8, U8, U8, U8, Bytes(16)];

// machine, start, stop, continuous
const REQUEST_START_LEGACY: &[FieldSpec] = &[U8, U8, U8, U8];

/// Look up the layout of `kind` under `variant`.
pub fn layout(kind: MessageKind, variant: WireVariant) -> Layout {
    let fields = match (kind, variant) {
        (MessageKind::RequestReset, _)
        | (MessageKind::RequestInfo, _)
        | (MessageKind::RequestState, _) => NONE,

        (MessageKind::RequestStart, WireVariant::Current) => THREE,
        (MessageKind::RequestStart, WireVariant::Legacy) => REQUEST_START_LEGACY,

        (MessageKind::RequestInit, _)
        | (MessageKind::ConfirmInit, _)
        | (MessageKind::ConfirmStart, _)
        | (MessageKind::DebugPeekConfirm, _) => ONE,

        (MessageKind::RequestLine, WireVariant::Current) => TWO,
        (MessageKind::RequestLine, WireVariant::Legacy) => ONE,

        (MessageKind::ConfirmLine, WireVariant::Current) => CONFIRM_LINE,
        (MessageKind::ConfirmLine, WireVariant::Legacy) => CONFIRM_LINE_LEGACY,

        (MessageKind::ConfirmInfo, WireVariant::Current) => CONFIRM_INFO,
        (MessageKind::ConfirmInfo, WireVariant::Legacy) => THREE,

        (MessageKind::IndicateState, WireVariant::Current) => INDICATE_STATE,
        (MessageKind::IndicateState, WireVariant::Legacy) => INDICATE_STATE_LEGACY,

        (MessageKind::DebugPeekRequest, _) => TWO,
        (MessageKind::DebugPokeRequest, _) => THREE,
    };
    Layout {
        kind,
        variant,
        fields,
    }
}
