use bytes::{BufMut, Bytes, BytesMut};
use tracing::warn;

use crate::error::FrameAnomaly;

/// Frame end marker.
pub const END: u8 = 0xC0;
/// Escape marker.
pub const ESC: u8 = 0xDB;
/// Escaped form of [`END`] (follows [`ESC`]).
pub const ESC_END: u8 = 0xDC;
/// Escaped form of [`ESC`] (follows [`ESC`]).
pub const ESC_ESC: u8 = 0xDD;

/// Default maximum decoded frame length. The largest AYAB message is 29 bytes.
pub const DEFAULT_MAX_FRAME_LEN: usize = 512;

/// Anomalies kept for inspection; older ones are only counted.
const ANOMALY_HISTORY: usize = 16;

/// Encode a payload as one SLIP frame.
///
/// Wire format:
/// ```text
/// ┌──────┬──────────────────────────────────┬──────┐
/// │ 0xC0 │ payload, C0 -> DB DC, DB -> DB DD │ 0xC0 │
/// └──────┴──────────────────────────────────┴──────┘
/// ```
/// The leading end marker flushes any line noise the receiver has buffered.
pub fn encode(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(payload.len() + 2);
    dst.put_u8(END);
    for &byte in payload {
        match byte {
            END => dst.put_slice(&[ESC, ESC_END]),
            ESC => dst.put_slice(&[ESC, ESC_ESC]),
            _ => dst.put_u8(byte),
        }
    }
    dst.put_u8(END);
}

/// Encode a payload as one SLIP frame into a new vector.
pub fn encode_to_vec(payload: &[u8]) -> Vec<u8> {
    let mut dst = BytesMut::with_capacity(payload.len() + 2);
    encode(payload, &mut dst);
    dst.to_vec()
}

/// Configuration for the SLIP decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Maximum decoded payload length. Longer frames are discarded.
    pub max_frame_len: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

/// Incremental SLIP decoder.
///
/// Holds the unterminated frame between calls, so chunk boundaries may fall
/// anywhere, including between an escape byte and its substitute.
///
/// Empty frames (two end markers in a row) are skipped, never emitted.
#[derive(Debug)]
pub struct SlipDecoder {
    buf: BytesMut,
    escaped: bool,
    discarding: bool,
    config: FrameConfig,
    anomalies: Vec<FrameAnomaly>,
    anomaly_count: u64,
}

impl Default for SlipDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SlipDecoder {
    /// Create a decoder with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a decoder with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(64),
            escaped: false,
            discarding: false,
            config,
            anomalies: Vec::new(),
            anomaly_count: 0,
        }
    }

    /// Feed a chunk of raw bytes and return every payload it completes, in order.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        let mut frames = Vec::new();
        for &byte in chunk {
            if let Some(frame) = self.push_byte(byte) {
                frames.push(frame);
            }
        }
        frames
    }

    fn push_byte(&mut self, byte: u8) -> Option<Bytes> {
        if self.discarding {
            if byte == END {
                self.discarding = false;
                self.buf.clear();
            }
            return None;
        }

        if self.escaped {
            self.escaped = false;
            match byte {
                ESC_END => self.push_payload(END),
                ESC_ESC => self.push_payload(ESC),
                END => {
                    // The bad escape ends the frame itself.
                    self.record(FrameAnomaly::InvalidEscape(byte));
                    self.buf.clear();
                }
                other => {
                    self.record(FrameAnomaly::InvalidEscape(other));
                    self.start_discarding();
                }
            }
            return None;
        }

        match byte {
            END => {
                if self.buf.is_empty() {
                    None
                } else {
                    Some(self.buf.split().freeze())
                }
            }
            ESC => {
                self.escaped = true;
                None
            }
            other => {
                self.push_payload(other);
                None
            }
        }
    }

    fn push_payload(&mut self, byte: u8) {
        if self.buf.len() >= self.config.max_frame_len {
            self.record(FrameAnomaly::Oversized {
                max: self.config.max_frame_len,
            });
            self.start_discarding();
            return;
        }
        self.buf.put_u8(byte);
    }

    fn start_discarding(&mut self) {
        self.buf.clear();
        self.discarding = true;
    }

    fn record(&mut self, anomaly: FrameAnomaly) {
        warn!(%anomaly, "discarding malformed frame");
        self.anomaly_count = self.anomaly_count.saturating_add(1);
        if self.anomalies.len() == ANOMALY_HISTORY {
            self.anomalies.remove(0);
        }
        self.anomalies.push(anomaly);
    }

    /// Total anomalies seen since creation.
    pub fn anomalies(&self) -> u64 {
        self.anomaly_count
    }

    /// Drain the most recent anomalies.
    pub fn take_anomalies(&mut self) -> Vec<FrameAnomaly> {
        std::mem::take(&mut self.anomalies)
    }

    /// Number of payload bytes buffered for the unterminated frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Discard all partial state. The anomaly counter is kept.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.escaped = false;
        self.discarding = false;
        self.anomalies.clear();
    }

    /// Current decoder configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn decode_all(wire: &[u8]) -> Vec<Vec<u8>> {
        SlipDecoder::new()
            .decode(wire)
            .into_iter()
            .map(|frame| frame.to_vec())
            .collect()
    }

    #[test]
    fn encode_plain_payload() {
        assert_eq!(encode_to_vec(&[0x03, 0x00]), vec![END, 0x03, 0x00, END]);
    }

    #[test]
    fn encode_escapes_markers() {
        assert_eq!(
            encode_to_vec(&[0x01, END, 0x02, ESC, 0x03]),
            vec![END, 0x01, ESC, ESC_END, 0x02, ESC, ESC_ESC, 0x03, END]
        );
    }

    #[test]
    fn decode_unescapes() {
        let frames = decode_all(&[END, ESC, ESC_END, ESC, ESC_ESC, END]);
        assert_eq!(frames, vec![vec![END, ESC]]);
    }

    #[test]
    fn empty_chunk_is_noop() {
        let mut decoder = SlipDecoder::new();
        decoder.decode(&[END, 0x01]);
        assert!(decoder.decode(&[]).is_empty());
        assert_eq!(decoder.buffered(), 1);
    }

    #[test]
    fn empty_frames_are_skipped() {
        let frames = decode_all(&[END, END, END, 0x42, END, END]);
        assert_eq!(frames, vec![vec![0x42]]);
        assert!(decode_all(&encode_to_vec(&[])).is_empty());
    }

    #[test]
    fn frame_without_leading_marker() {
        let frames = decode_all(&[0x03, 0x00, END]);
        assert_eq!(frames, vec![vec![0x03, 0x00]]);
    }

    #[test]
    fn incomplete_frame_stays_buffered() {
        let mut decoder = SlipDecoder::new();
        assert!(decoder.decode(&[END, 0x84, 0x00]).is_empty());
        assert_eq!(decoder.buffered(), 2);
        let frames = decoder.decode(&[0x01, END]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), &[0x84, 0x00, 0x01]);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn split_inside_escape_sequence() {
        let mut decoder = SlipDecoder::new();
        assert!(decoder.decode(&[END, 0x10, ESC]).is_empty());
        let frames = decoder.decode(&[ESC_END, 0x11, END]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), &[0x10, END, 0x11]);
    }

    #[test]
    fn multiple_frames_in_one_chunk() {
        let mut wire = encode_to_vec(b"first");
        wire.extend(encode_to_vec(b"second"));
        wire.extend(encode_to_vec(b"third"));
        assert_eq!(
            decode_all(&wire),
            vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]
        );
    }

    #[test]
    fn invalid_escape_resyncs_at_next_end() {
        let mut decoder = SlipDecoder::new();
        let frames = decoder.decode(&[END, 0x01, ESC, 0x55, 0x02, 0x03, END, 0x04, END]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), &[0x04]);
        assert_eq!(decoder.anomalies(), 1);
        assert_eq!(
            decoder.take_anomalies(),
            vec![FrameAnomaly::InvalidEscape(0x55)]
        );
        assert!(decoder.take_anomalies().is_empty());
    }

    #[test]
    fn escape_followed_by_end_drops_frame() {
        let mut decoder = SlipDecoder::new();
        let frames = decoder.decode(&[END, 0x01, ESC, END, 0x05, END]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), &[0x05]);
        assert_eq!(decoder.anomalies(), 1);
    }

    #[test]
    fn oversized_frame_discarded() {
        let mut decoder = SlipDecoder::with_config(FrameConfig { max_frame_len: 4 });
        let mut wire = encode_to_vec(&[1, 2, 3, 4, 5, 6]);
        wire.extend(encode_to_vec(&[7, 8]));
        let frames = decoder.decode(&wire);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), &[7, 8]);
        assert_eq!(
            decoder.take_anomalies(),
            vec![FrameAnomaly::Oversized { max: 4 }]
        );
    }

    #[test]
    fn reset_discards_partial_frame() {
        let mut decoder = SlipDecoder::new();
        decoder.decode(&[END, 0x01, 0x02, ESC]);
        decoder.reset();
        assert_eq!(decoder.buffered(), 0);
        let frames = decoder.decode(&[0x09, END]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), &[0x09]);
    }

    #[test]
    fn anomaly_history_is_bounded() {
        let mut decoder = SlipDecoder::new();
        for _ in 0..(ANOMALY_HISTORY + 5) {
            decoder.decode(&[ESC, 0x00, END]);
        }
        assert_eq!(decoder.anomalies(), (ANOMALY_HISTORY + 5) as u64);
        assert_eq!(decoder.take_anomalies().len(), ANOMALY_HISTORY);
    }

    proptest! {
        #[test]
        fn roundtrip_any_payload(payload in proptest::collection::vec(any::<u8>(), 1..300)) {
            let wire = encode_to_vec(&payload);
            prop_assert_eq!(decode_all(&wire), vec![payload]);
        }

        #[test]
        fn roundtrip_marker_heavy_payload(
            payload in proptest::collection::vec(prop_oneof![Just(END), Just(ESC), any::<u8>()], 1..64)
        ) {
            let wire = encode_to_vec(&payload);
            prop_assert!(wire[1..wire.len() - 1].iter().all(|&b| b != END));
            prop_assert_eq!(decode_all(&wire), vec![payload]);
        }

        #[test]
        fn chunking_does_not_change_result(
            payloads in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..40), 1..5),
            cuts in proptest::collection::vec(any::<usize>(), 0..8),
        ) {
            let mut wire = Vec::new();
            for payload in &payloads {
                wire.extend(encode_to_vec(payload));
            }

            let mut cuts: Vec<usize> = cuts.into_iter().map(|c| c % (wire.len() + 1)).collect();
            cuts.sort_unstable();

            let mut decoder = SlipDecoder::new();
            let mut frames = Vec::new();
            let mut start = 0;
            for cut in cuts.into_iter().chain(std::iter::once(wire.len())) {
                frames.extend(decoder.decode(&wire[start..cut]).into_iter().map(|f| f.to_vec()));
                start = cut;
            }

            prop_assert_eq!(frames, decode_all(&wire));
            prop_assert_eq!(decode_all(&wire), payloads);
        }
    }
}
