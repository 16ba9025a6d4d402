use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::slip::{encode, FrameConfig, SlipDecoder};

/// `tokio_util` codec producing one `Bytes` item per SLIP frame.
///
/// Use with `Framed`, `FramedRead` or `FramedWrite` over any async byte
/// stream. Decode anomalies are absorbed exactly as in [`SlipDecoder`].
#[derive(Debug, Default)]
pub struct SlipCodec {
    decoder: SlipDecoder,
    ready: VecDeque<Bytes>,
}

impl SlipCodec {
    /// Create a codec with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec with explicit decoder configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            decoder: SlipDecoder::with_config(config),
            ready: VecDeque::new(),
        }
    }

    /// The underlying decoder, for anomaly inspection.
    pub fn decoder(&mut self) -> &mut SlipDecoder {
        &mut self.decoder
    }
}

impl Decoder for SlipCodec {
    type Item = Bytes;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.ready.pop_front() {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let chunk = src.split();
        self.ready.extend(self.decoder.decode(&chunk));
        Ok(self.ready.pop_front())
    }
}

impl Encoder<&[u8]> for SlipCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode(item, dst);
        Ok(())
    }
}

impl Encoder<Bytes> for SlipCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode(&item, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::slip::{encode_to_vec, END};

    #[test]
    fn decodes_several_frames_from_one_buffer() {
        let mut codec = SlipCodec::new();
        let mut src = BytesMut::new();
        src.extend_from_slice(&encode_to_vec(b"one"));
        src.extend_from_slice(&encode_to_vec(b"two"));

        let first = codec.decode(&mut src).unwrap().unwrap();
        let second = codec.decode(&mut src).unwrap().unwrap();
        assert_eq!(first.as_ref(), b"one");
        assert_eq!(second.as_ref(), b"two");
        assert!(codec.decode(&mut src).unwrap().is_none());
    }

    #[test]
    fn partial_frame_waits_for_more() {
        let mut codec = SlipCodec::new();
        let mut src = BytesMut::from(&[END, 0x01][..]);
        assert!(codec.decode(&mut src).unwrap().is_none());
        src.extend_from_slice(&[0x02, END]);
        let frame = codec.decode(&mut src).unwrap().unwrap();
        assert_eq!(frame.as_ref(), &[0x01, 0x02]);
    }

    #[tokio::test]
    async fn framed_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(256);
        let mut writer = FramedWrite::new(client, SlipCodec::new());
        let mut reader = FramedRead::new(server, SlipCodec::new());

        writer.send(Bytes::from_static(&[0x03, 0x2A])).await.unwrap();
        writer
            .send(Bytes::from_static(&[0xC0, 0xDB, 0x00]))
            .await
            .unwrap();

        let first = reader.next().await.unwrap().unwrap();
        let second = reader.next().await.unwrap().unwrap();
        assert_eq!(first.as_ref(), &[0x03, 0x2A]);
        assert_eq!(second.as_ref(), &[0xC0, 0xDB, 0x00]);
    }
}
