//! Message encoding and decoding against the layout table.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{debug, warn};

use crate::crc::crc8;
use crate::error::{ProtoError, Result};
use crate::fields::{BeltShift, Carriage, Direction, FixedString, LineFlags, MachineType};
use crate::kind::MessageKind;
use crate::layout::{layout, WireVariant};
use crate::message::{
    ChecksumStatus, Confirm, ConfirmInfo, ConfirmLine, Decoded, IndicateState, Inbound, Message,
    PeekConfirm, PeekRequest, PokeRequest, RequestInit, RequestLine, RequestStart, FW_VERSION_LEN,
};
use crate::needles::{NeedleSelection, NEEDLE_MASK_LEN};

/// Encode a message into a standalone payload (kind, fields, crc if the
/// layout has one).
pub fn encode_message(message: &Message, variant: WireVariant) -> Bytes {
    let mut dst = BytesMut::with_capacity(layout(message.kind(), variant).wire_len());
    encode_into(message, variant, &mut dst);
    dst.freeze()
}

/// Append the encoded payload of `message` to `dst`.
pub fn encode_into(message: &Message, variant: WireVariant, dst: &mut BytesMut) {
    let start = dst.len();
    dst.put_u8(message.kind().as_u8());

    match (message, variant) {
        (Message::RequestReset, _) | (Message::RequestInfo, _) | (Message::RequestState, _) => {}

        (Message::RequestStart(m), WireVariant::Current) => {
            dst.put_u8(m.start_needle);
            dst.put_u8(m.stop_needle);
            dst.put_u8(m.continuous_reporting as u8);
        }
        (Message::RequestStart(m), WireVariant::Legacy) => {
            dst.put_u8(m.machine.unwrap_or(MachineType::Kh910).to_byte());
            dst.put_u8(m.start_needle);
            dst.put_u8(m.stop_needle);
            dst.put_u8(m.continuous_reporting as u8);
        }

        (Message::RequestInit(m), _) => dst.put_u8(m.machine.to_byte()),
        (Message::ConfirmInit(m), _) | (Message::ConfirmStart(m), _) => dst.put_u8(m.error),

        (Message::RequestLine(m), WireVariant::Current) => {
            dst.put_u8(m.row);
            dst.put_u8(m.error);
        }
        (Message::RequestLine(m), WireVariant::Legacy) => dst.put_u8(m.row),

        (Message::ConfirmLine(m), WireVariant::Current) => {
            dst.put_u8(m.line_number);
            dst.put_slice(m.needles.as_mask());
            dst.put_u8(m.flags.bits());
        }
        (Message::ConfirmLine(m), WireVariant::Legacy) => {
            dst.put_u8(m.line_number);
            dst.put_u8(m.color);
            dst.put_u8(m.flags.bits());
            dst.put_slice(m.needles.as_mask());
        }

        (Message::ConfirmInfo(m), WireVariant::Current) => {
            dst.put_u8(m.api_version);
            dst.put_u8(m.fw_major);
            dst.put_u8(m.fw_minor);
            dst.put_u8(m.fw_patch);
            dst.put_slice(m.fw_version.as_bytes());
        }
        (Message::ConfirmInfo(m), WireVariant::Legacy) => {
            dst.put_u8(m.api_version);
            dst.put_u8(m.fw_major);
            dst.put_u8(m.fw_minor);
        }

        (Message::IndicateState(m), WireVariant::Current) => {
            dst.put_u8(m.error);
            dst.put_u8(m.state);
            dst.put_u16_le(m.hall_left);
            dst.put_u16_le(m.hall_right);
            dst.put_u8(m.carriage.to_byte());
            dst.put_u8(m.position);
            dst.put_u8(m.direction.to_byte());
            dst.put_u8(m.hall_active.to_byte());
            dst.put_u8(m.belt_shift.to_byte());
        }
        (Message::IndicateState(m), WireVariant::Legacy) => {
            dst.put_u8(m.state);
            dst.put_u16(m.hall_left);
            dst.put_u16(m.hall_right);
            dst.put_u8(m.carriage.to_byte());
            dst.put_u8(m.position);
            dst.put_u8(m.direction.to_byte());
        }

        (Message::DebugPeekRequest(m), _) => dst.put_u16_le(m.address),
        (Message::DebugPeekConfirm(m), _) => dst.put_u8(m.value),
        (Message::DebugPokeRequest(m), _) => {
            dst.put_u16_le(m.address);
            dst.put_u8(m.value);
        }
    }

    let layout = layout(message.kind(), variant);
    if layout.has_crc() {
        let crc = crc8(0, &dst[start..]);
        dst.put_u8(crc);
    }

    debug_assert_eq!(dst.len() - start, layout.wire_len());
}

/// Decode one frame payload.
///
/// Unknown kind bytes are returned as [`Inbound::Unknown`]. A payload whose
/// length does not match the layout of its kind is rejected. A CRC mismatch
/// is reported in [`Decoded::checksum`] and the message is still returned.
/// Layouts without a CRC byte decode as [`ChecksumStatus::Unchecked`].
pub fn decode_message(payload: &[u8], variant: WireVariant) -> Result<Decoded> {
    let Some(&kind_byte) = payload.first() else {
        return Err(ProtoError::Empty);
    };
    let raw = Bytes::copy_from_slice(payload);

    let Ok(kind) = MessageKind::try_from(kind_byte) else {
        debug!(kind = kind_byte, len = payload.len(), "unknown message kind");
        return Ok(Decoded {
            inbound: Inbound::Unknown(raw.clone()),
            checksum: ChecksumStatus::Unchecked,
            raw,
        });
    };

    let layout = layout(kind, variant);
    let expected = layout.wire_len();
    if payload.len() != expected {
        return Err(ProtoError::LengthMismatch {
            kind,
            expected,
            actual: payload.len(),
        });
    }

    if !layout.has_crc() {
        return Ok(Decoded {
            inbound: Inbound::Known(parse_fields(kind, variant, &payload[1..])),
            checksum: ChecksumStatus::Unchecked,
            raw,
        });
    }

    let (covered, crc_byte) = payload.split_at(payload.len() - 1);
    let computed = crc8(0, covered);
    let checksum = if computed == crc_byte[0] {
        ChecksumStatus::Valid
    } else {
        warn!(
            %kind,
            expected = computed,
            actual = crc_byte[0],
            "checksum mismatch"
        );
        ChecksumStatus::Mismatch {
            expected: computed,
            actual: crc_byte[0],
        }
    };

    let message = parse_fields(kind, variant, &covered[1..]);
    Ok(Decoded {
        inbound: Inbound::Known(message),
        checksum,
        raw,
    })
}

// `body` has already been length-checked against the layout.
fn parse_fields(kind: MessageKind, variant: WireVariant, mut body: &[u8]) -> Message {
    let b = &mut body;
    match (kind, variant) {
        (MessageKind::RequestReset, _) => Message::RequestReset,
        (MessageKind::RequestInfo, _) => Message::RequestInfo,
        (MessageKind::RequestState, _) => Message::RequestState,

        (MessageKind::RequestStart, WireVariant::Current) => Message::RequestStart(RequestStart {
            start_needle: b.get_u8(),
            stop_needle: b.get_u8(),
            continuous_reporting: b.get_u8() != 0,
            machine: None,
        }),
        (MessageKind::RequestStart, WireVariant::Legacy) => {
            let machine = MachineType::from_byte(b.get_u8());
            Message::RequestStart(RequestStart {
                start_needle: b.get_u8(),
                stop_needle: b.get_u8(),
                continuous_reporting: b.get_u8() != 0,
                machine: Some(machine),
            })
        }

        (MessageKind::RequestInit, _) => Message::RequestInit(RequestInit {
            machine: MachineType::from_byte(b.get_u8()),
        }),
        (MessageKind::ConfirmInit, _) => Message::ConfirmInit(Confirm { error: b.get_u8() }),
        (MessageKind::ConfirmStart, _) => Message::ConfirmStart(Confirm { error: b.get_u8() }),

        (MessageKind::RequestLine, WireVariant::Current) => Message::RequestLine(RequestLine {
            row: b.get_u8(),
            error: b.get_u8(),
        }),
        (MessageKind::RequestLine, WireVariant::Legacy) => Message::RequestLine(RequestLine {
            row: b.get_u8(),
            error: 0,
        }),

        (MessageKind::ConfirmLine, WireVariant::Current) => {
            let line_number = b.get_u8();
            let needles = take_mask(b);
            Message::ConfirmLine(ConfirmLine {
                line_number,
                needles,
                flags: LineFlags(b.get_u8()),
                color: 0,
            })
        }
        (MessageKind::ConfirmLine, WireVariant::Legacy) => {
            let line_number = b.get_u8();
            let color = b.get_u8();
            let flags = LineFlags(b.get_u8());
            Message::ConfirmLine(ConfirmLine {
                line_number,
                needles: take_mask(b),
                flags,
                color,
            })
        }

        (MessageKind::ConfirmInfo, WireVariant::Current) => {
            let api_version = b.get_u8();
            let fw_major = b.get_u8();
            let fw_minor = b.get_u8();
            let fw_patch = b.get_u8();
            let mut version = [0u8; FW_VERSION_LEN];
            b.copy_to_slice(&mut version);
            Message::ConfirmInfo(ConfirmInfo {
                api_version,
                fw_major,
                fw_minor,
                fw_patch,
                fw_version: FixedString::from_bytes(version),
            })
        }
        (MessageKind::ConfirmInfo, WireVariant::Legacy) => Message::ConfirmInfo(ConfirmInfo {
            api_version: b.get_u8(),
            fw_major: b.get_u8(),
            fw_minor: b.get_u8(),
            fw_patch: 0,
            fw_version: FixedString::default(),
        }),

        (MessageKind::IndicateState, WireVariant::Current) => {
            Message::IndicateState(IndicateState {
                error: b.get_u8(),
                state: b.get_u8(),
                hall_left: b.get_u16_le(),
                hall_right: b.get_u16_le(),
                carriage: Carriage::from_byte(b.get_u8()),
                position: b.get_u8(),
                direction: Direction::from_byte(b.get_u8()),
                hall_active: Direction::from_byte(b.get_u8()),
                belt_shift: BeltShift::from_byte(b.get_u8()),
            })
        }
        (MessageKind::IndicateState, WireVariant::Legacy) => Message::IndicateState(IndicateState {
            error: 0,
            state: b.get_u8(),
            hall_left: b.get_u16(),
            hall_right: b.get_u16(),
            carriage: Carriage::from_byte(b.get_u8()),
            position: b.get_u8(),
            direction: Direction::from_byte(b.get_u8()),
            hall_active: Direction::Unknown,
            belt_shift: BeltShift::Unknown,
        }),

        (MessageKind::DebugPeekRequest, _) => Message::DebugPeekRequest(PeekRequest {
            address: b.get_u16_le(),
        }),
        (MessageKind::DebugPeekConfirm, _) => {
            Message::DebugPeekConfirm(PeekConfirm { value: b.get_u8() })
        }
        (MessageKind::DebugPokeRequest, _) => Message::DebugPokeRequest(PokeRequest {
            address: b.get_u16_le(),
            value: b.get_u8(),
        }),
    }
}

fn take_mask(b: &mut &[u8]) -> NeedleSelection {
    let mut mask = [0u8; NEEDLE_MASK_LEN];
    b.copy_to_slice(&mut mask);
    NeedleSelection::from_mask(mask)
}
