use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::codec::{encode_packet, FrameConfig, PacketDecoder};
use crate::error::FrameError;

/// One item read from a framed stream.
#[derive(Debug)]
pub enum Decoded {
    /// A complete packet, possibly empty.
    Packet(Bytes),
    /// A packet was discarded (bad escape, oversized). Decoding continues
    /// with the next packet.
    Dropped(FrameError),
}

impl Decoded {
    /// The packet, if this item carries one.
    pub fn into_packet(self) -> Option<Bytes> {
        match self {
            Decoded::Packet(packet) => Some(packet),
            Decoded::Dropped(_) => None,
        }
    }
}

/// `tokio_util` codec for SLIP packets.
///
/// Recoverable errors (bad escapes, oversized packets) are yielded as
/// [`Decoded::Dropped`] items instead of errors: a `FramedRead` stops at the
/// first decoder error, and one corrupt packet must not end the session.
/// Partial data left at EOF is dropped silently.
#[derive(Debug, Default)]
pub struct SlipCodec {
    decoder: PacketDecoder,
}

impl SlipCodec {
    /// Create a codec without a packet size limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            decoder: PacketDecoder::with_config(config),
        }
    }
}

impl Decoder for SlipCodec {
    type Item = Decoded;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Decoded>, FrameError> {
        match self.decoder.decode(src) {
            Ok(packet) => Ok(packet.map(Decoded::Packet)),
            Err(err) if err.is_recoverable() => {
                warn!(error = %err, "dropping malformed packet");
                Ok(Some(Decoded::Dropped(err)))
            }
            Err(err) => Err(err),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Decoded>, FrameError> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None => {
                src.clear();
                Ok(None)
            }
        }
    }
}

impl<T: AsRef<[u8]>> Encoder<T> for SlipCodec {
    type Error = FrameError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_packet(item.as_ref(), dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::codec::{END, ESC};

    async fn next_packet<R>(stream: &mut FramedRead<R, SlipCodec>) -> Bytes
    where
        R: tokio::io::AsyncRead + Unpin,
    {
        stream
            .next()
            .await
            .expect("stream should yield")
            .expect("decode should succeed")
            .into_packet()
            .expect("item should be a packet")
    }

    #[tokio::test]
    async fn framed_roundtrip() {
        let mut sink = FramedWrite::new(Vec::new(), SlipCodec::new());
        sink.send(Bytes::from_static(b"first")).await.unwrap();
        sink.send(&[END, ESC][..]).await.unwrap();
        sink.send(Bytes::new()).await.unwrap();
        let wire = sink.into_inner();

        let mut stream = FramedRead::new(wire.as_slice(), SlipCodec::new());
        assert_eq!(next_packet(&mut stream).await.as_ref(), b"first");
        assert_eq!(next_packet(&mut stream).await.as_ref(), &[END, ESC]);
        assert!(next_packet(&mut stream).await.is_empty());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn corrupt_packet_is_reported_and_stream_continues() {
        let mut wire = vec![END, b'a', ESC, b'b', END];
        let mut buf = BytesMut::new();
        encode_packet(b"good", &mut buf);
        wire.extend_from_slice(&buf);

        let mut stream = FramedRead::new(wire.as_slice(), SlipCodec::new());
        assert!(matches!(
            stream.next().await.unwrap().unwrap(),
            Decoded::Dropped(FrameError::InvalidEscape(b'b'))
        ));
        assert_eq!(next_packet(&mut stream).await.as_ref(), b"good");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn partial_packet_at_eof_is_dropped() {
        let wire = [END, b'g', b'o', b'o', b'd', END, b'p', b'a', b'r'];
        let mut stream = FramedRead::new(&wire[..], SlipCodec::new());

        assert_eq!(next_packet(&mut stream).await.as_ref(), b"good");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn oversized_packet_is_reported_once() {
        let mut buf = BytesMut::new();
        encode_packet(&[0x55; 64], &mut buf);
        encode_packet(b"small", &mut buf);

        let codec = SlipCodec::with_config(FrameConfig {
            max_packet_size: Some(16),
        });
        let mut stream = FramedRead::new(&buf[..], codec);
        assert!(matches!(
            stream.next().await.unwrap().unwrap(),
            Decoded::Dropped(FrameError::PacketTooLarge { .. })
        ));
        assert_eq!(next_packet(&mut stream).await.as_ref(), b"small");
    }
}
