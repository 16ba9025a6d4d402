use std::thread;
use std::time::{Duration, Instant};

use knitlink::frame::{encode_to_vec, SlipDecoder};
use knitlink::proto::{
    decode_message, encode_message, BeltShift, Carriage, ChecksumStatus, Confirm, ConfirmInfo,
    Direction, FixedString, IndicateState, LineFlags, Message, MessageKind, NeedleSelection,
    PeekConfirm, RequestLine, WireVariant,
};
use knitlink::session::{Session, SessionConfig};
use knitlink::transport::{LoopbackHandle, LoopbackTransport};

const IDLE: Duration = Duration::from_millis(1);
const TIMEOUT: Duration = Duration::from_secs(3);

fn reply_to(request: &Message) -> Option<Message> {
    match request {
        Message::RequestInfo => Some(Message::ConfirmInfo(ConfirmInfo {
            api_version: 6,
            fw_major: 1,
            fw_minor: 0,
            fw_patch: 0,
            fw_version: FixedString::from_text("1.0.0"),
        })),
        Message::RequestState => Some(Message::IndicateState(IndicateState {
            error: 0,
            state: 1,
            hall_left: 258,
            hall_right: 0,
            carriage: Carriage::K,
            position: 42,
            direction: Direction::Right,
            hall_active: Direction::Left,
            belt_shift: BeltShift::RegularLeft,
        })),
        Message::RequestInit(_) => Some(Message::ConfirmInit(Confirm { error: 0 })),
        Message::RequestStart(_) => Some(Message::ConfirmStart(Confirm { error: 0 })),
        Message::DebugPeekRequest(peek) => Some(Message::DebugPeekConfirm(PeekConfirm {
            value: (peek.address & 0xFF) as u8,
        })),
        _ => None,
    }
}

/// Play the controller: answer every request written by the host until
/// `requests` have been seen. Returns the decoded requests.
fn spawn_controller(handle: LoopbackHandle, requests: usize) -> thread::JoinHandle<Vec<Message>> {
    thread::spawn(move || {
        let mut decoder = SlipDecoder::new();
        let mut seen = Vec::new();
        let deadline = Instant::now() + TIMEOUT;

        while seen.len() < requests && Instant::now() < deadline {
            let written = handle.take_written();
            if written.is_empty() {
                thread::sleep(IDLE);
                continue;
            }
            for payload in decoder.decode(&written) {
                let decoded = decode_message(&payload, WireVariant::Current)
                    .expect("host should send well-formed payloads");
                assert_eq!(decoded.checksum, ChecksumStatus::Valid);
                let request = *decoded.message().expect("host should send known kinds");
                if let Some(reply) = reply_to(&request) {
                    handle.feed(&encode_to_vec(&encode_message(&reply, WireVariant::Current)));
                }
                seen.push(request);
            }
        }
        seen
    })
}

#[test]
fn request_confirm_exchanges() {
    let (transport, handle) = LoopbackTransport::pair();
    let mut session = Session::with_transport(Box::new(transport), SessionConfig::default());
    let controller = spawn_controller(handle.clone(), 4);

    session.request_info().unwrap();
    let info = session
        .wait_for(MessageKind::ConfirmInfo, TIMEOUT, IDLE)
        .unwrap()
        .expect("confirm-info should arrive");
    match info.message() {
        Some(Message::ConfirmInfo(info)) => {
            assert_eq!(info.api_version, 6);
            assert_eq!(info.fw_version.as_str(), "1.0.0");
        }
        other => panic!("unexpected {other:?}"),
    }

    session.request_state().unwrap();
    let state = session
        .wait_for(MessageKind::IndicateState, TIMEOUT, IDLE)
        .unwrap()
        .expect("indicate-state should arrive");
    match state.message() {
        Some(Message::IndicateState(state)) => {
            assert_eq!(state.hall_left, 258);
            assert_eq!(state.carriage.label(), "K");
            assert_eq!(state.direction.label(), "Right");
            assert_eq!(state.hall_active.label(), "Left ");
            assert_eq!(state.belt_shift.label(), "Regular (L)");
        }
        other => panic!("unexpected {other:?}"),
    }

    session.request_start(70, 129, false).unwrap();
    let started = session
        .wait_for(MessageKind::ConfirmStart, TIMEOUT, IDLE)
        .unwrap()
        .expect("confirm-start should arrive");
    assert_eq!(
        started.message(),
        Some(&Message::ConfirmStart(Confirm { error: 0 }))
    );

    session.peek(0x01F4).unwrap();
    let peeked = session
        .wait_for(MessageKind::DebugPeekConfirm, TIMEOUT, IDLE)
        .unwrap()
        .expect("peek confirm should arrive");
    assert_eq!(
        peeked.message(),
        Some(&Message::DebugPeekConfirm(PeekConfirm { value: 0xF4 }))
    );

    let requests = controller.join().expect("controller thread should finish");
    let kinds: Vec<MessageKind> = requests.iter().map(Message::kind).collect();
    assert_eq!(
        kinds,
        vec![
            MessageKind::RequestInfo,
            MessageKind::RequestState,
            MessageKind::RequestStart,
            MessageKind::DebugPeekRequest,
        ]
    );

    let stats = session.stats();
    assert_eq!(stats.messages_delivered, 4);
    assert_eq!(stats.rejected, 0);
    assert_eq!(stats.checksum_failures, 0);

    session.close();
    assert!(handle.is_closed());
}

#[test]
fn knitting_rows_round_trip() {
    let (transport, handle) = LoopbackTransport::pair();
    let mut session = Session::with_transport(Box::new(transport), SessionConfig::default());

    // The controller asks for three rows; answer each with alternating patterns.
    for row in 0..3u8 {
        handle.feed(&encode_to_vec(&encode_message(
            &Message::RequestLine(RequestLine { row, error: 0 }),
            WireVariant::Current,
        )));
    }

    let mut answered = 0u8;
    let deadline = Instant::now() + TIMEOUT;
    while answered < 3 && Instant::now() < deadline {
        let Some(decoded) = session.poll_next_message().unwrap() else {
            thread::sleep(IDLE);
            continue;
        };
        let Some(Message::RequestLine(line)) = decoded.message() else {
            panic!("unexpected {decoded:?}");
        };
        let needles = if line.row % 2 == 0 {
            NeedleSelection::even()
        } else {
            NeedleSelection::odd()
        };
        let flags = if line.row == 2 {
            LineFlags::LAST_LINE
        } else {
            LineFlags::NONE
        };
        session.confirm_line(line.row, &needles, flags).unwrap();
        answered += 1;
    }
    assert_eq!(answered, 3);

    let mut decoder = SlipDecoder::new();
    let sent: Vec<Message> = decoder
        .decode(&handle.take_written())
        .iter()
        .map(|payload| {
            *decode_message(payload, WireVariant::Current)
                .unwrap()
                .message()
                .unwrap()
        })
        .collect();
    assert_eq!(sent.len(), 3);
    for (row, message) in sent.iter().enumerate() {
        let Message::ConfirmLine(line) = message else {
            panic!("unexpected {message:?}");
        };
        assert_eq!(line.line_number as usize, row);
        assert_eq!(line.needles.iter().next(), Some(row % 2));
        assert_eq!(line.flags.is_last_line(), row == 2);
    }
}

#[test]
fn corrupted_link_stays_usable() {
    let (transport, handle) = LoopbackTransport::pair();
    let mut session = Session::with_transport(Box::new(transport), SessionConfig::default());

    let good = encode_message(&Message::ConfirmInit(Confirm { error: 0 }), WireVariant::Current);
    let mut flipped = good.to_vec();
    flipped[1] ^= 0x04;

    let mut stream = vec![0x00, 0x13, 0x37];
    stream.extend(encode_to_vec(&flipped));
    stream.extend([0xC0, 0xDB, 0x99, 0x01, 0xC0]);
    stream.extend(encode_to_vec(&[0xC5]));
    stream.extend(encode_to_vec(&good));
    handle.feed_chunked(&stream, 3);

    let mut delivered = Vec::new();
    for _ in 0..stream.len() {
        if let Some(decoded) = session.poll_next_message().unwrap() {
            delivered.push(decoded);
        }
    }

    // Line noise in front of the first marker makes a wrong-length reset payload.
    assert_eq!(delivered.len(), 2);
    assert_eq!(
        delivered[0].message(),
        Some(&Message::ConfirmInit(Confirm { error: 0x04 }))
    );
    assert!(delivered[0].is_corrupt());
    assert_eq!(
        delivered[1].message(),
        Some(&Message::ConfirmInit(Confirm { error: 0 }))
    );
    assert!(delivered[1].checksum.is_valid());

    let stats = session.stats();
    assert_eq!(stats.frame_anomalies, 1);
    assert_eq!(stats.rejected, 2);
    assert_eq!(stats.checksum_failures, 1);
}

/// Master side of a fresh pty plus the slave path.
#[cfg(target_os = "linux")]
fn open_pty() -> Option<(std::fs::File, String)> {
    use std::ffi::CStr;
    use std::os::fd::FromRawFd;

    // SAFETY: plain libc pty calls; every return value is checked and the
    // master fd is owned by the returned File.
    unsafe {
        let master_fd = libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY);
        if master_fd < 0 {
            return None;
        }
        let master = std::fs::File::from_raw_fd(master_fd);
        if libc::grantpt(master_fd) != 0 || libc::unlockpt(master_fd) != 0 {
            return None;
        }
        let mut name = [0 as libc::c_char; 128];
        if libc::ptsname_r(master_fd, name.as_mut_ptr(), name.len()) != 0 {
            return None;
        }
        let path = CStr::from_ptr(name.as_ptr()).to_str().ok()?.to_owned();
        Some((master, path))
    }
}

#[cfg(target_os = "linux")]
#[test]
fn opened_device_reports_its_path() {
    let Some((_master, slave)) = open_pty() else {
        eprintln!("no pty available; skipping");
        return;
    };

    let mut session = Session::new(SessionConfig::default());
    session.open(&slave).expect("pty slave should open");
    assert_eq!(session.port(), Some(slave.as_str()));

    // Opening again keeps the first device.
    session.open("/nonexistent/knitlink-tty").unwrap();
    assert_eq!(session.port(), Some(slave.as_str()));

    session.close();
    assert_eq!(session.port(), None);
}
