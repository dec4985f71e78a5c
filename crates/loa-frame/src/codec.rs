use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Packet delimiter.
pub const END: u8 = 0xC0;
/// Escape prefix.
pub const ESC: u8 = 0xDB;
/// Escaped `END`.
pub const ESC_END: u8 = 0xDC;
/// Escaped `ESC`.
pub const ESC_ESC: u8 = 0xDD;

/// Configuration for packet decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameConfig {
    /// Maximum decoded packet size in bytes. `None` means unbounded; callers
    /// reading untrusted input should set a bound.
    pub max_packet_size: Option<usize>,
}

/// Number of wire bytes `payload` occupies once encoded.
pub fn encoded_len(payload: &[u8]) -> usize {
    let escaped = payload.iter().filter(|&&b| b == END || b == ESC).count();
    payload.len() + escaped + 2
}

/// Encode a packet into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────┬──────────────────────────┬──────┐
/// │ END  │ escaped payload          │ END  │
/// │ 0xC0 │ 0xC0 -> DB DC, 0xDB -> DB DD │ 0xC0 │
/// └──────┴──────────────────────────┴──────┘
/// ```
pub fn encode_packet(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(encoded_len(payload));
    dst.put_u8(END);
    for &byte in payload {
        match byte {
            END => dst.put_slice(&[ESC, ESC_END]),
            ESC => dst.put_slice(&[ESC, ESC_ESC]),
            other => dst.put_u8(other),
        }
    }
    dst.put_u8(END);
}

/// Decode the next packet from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete packet yet.
/// On success, consumes the packet bytes (and its closing marker) from the
/// buffer. A malformed packet is consumed as well before the error is
/// returned, so the next call starts at the following packet.
///
/// A packet's opening marker is only consumed together with the packet, so
/// two adjacent markers always decode as one empty packet.
pub fn decode_packet(src: &mut BytesMut) -> Result<Option<Bytes>> {
    decode_next(src, None, &mut false)
}

fn decode_next(
    src: &mut BytesMut,
    max: Option<usize>,
    discarding: &mut bool,
) -> Result<Option<Bytes>> {
    loop {
        let Some(pos) = src.iter().position(|&b| b == END) else {
            return wait_for_marker(src, 0, max, discarding);
        };

        if *discarding {
            // Tail of an oversized packet.
            src.advance(pos + 1);
            *discarding = false;
            continue;
        }

        if pos == 0 {
            match src[1..].iter().position(|&b| b == END) {
                Some(0) => {
                    src.advance(2);
                    return Ok(Some(Bytes::new()));
                }
                // Opening marker of a packet that is already complete.
                Some(_) => {
                    src.advance(1);
                    continue;
                }
                None => return wait_for_marker(src, 1, max, discarding),
            }
        }

        let raw = src.split_to(pos);
        src.advance(1);

        let packet = unescape(raw)?;
        if let Some(max) = max {
            if packet.len() > max {
                return Err(FrameError::PacketTooLarge {
                    size: packet.len(),
                    max,
                });
            }
        }
        return Ok(Some(packet));
    }
}

/// No closing marker yet: keep buffering, or start discarding once the
/// partial packet (after `opening` marker bytes) outgrows `max`.
fn wait_for_marker(
    src: &mut BytesMut,
    opening: usize,
    max: Option<usize>,
    discarding: &mut bool,
) -> Result<Option<Bytes>> {
    if *discarding {
        src.clear();
        return Ok(None);
    }
    if let Some(max) = max {
        let size = src.len() - opening;
        if size > max {
            src.clear();
            *discarding = true;
            return Err(FrameError::PacketTooLarge { size, max });
        }
    }
    Ok(None)
}

fn unescape(raw: BytesMut) -> Result<Bytes> {
    if !raw.contains(&ESC) {
        return Ok(raw.freeze());
    }

    let mut out = BytesMut::with_capacity(raw.len());
    let mut bytes = raw.iter();
    while let Some(&byte) = bytes.next() {
        if byte != ESC {
            out.put_u8(byte);
            continue;
        }
        match bytes.next() {
            Some(&ESC_END) => out.put_u8(END),
            Some(&ESC_ESC) => out.put_u8(ESC),
            Some(&other) => return Err(FrameError::InvalidEscape(other)),
            // The escaped byte was the marker that closed this packet.
            None => return Err(FrameError::InvalidEscape(END)),
        }
    }
    Ok(out.freeze())
}

/// Incremental decoder that buffers partial packets across calls.
///
/// Feed it bytes as they arrive from the transport and iterate the packets
/// that became complete.
#[derive(Debug, Default)]
pub struct PacketDecoder {
    buf: BytesMut,
    config: FrameConfig,
    discarding: bool,
}

impl PacketDecoder {
    /// Create a decoder without a packet size limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            buf: BytesMut::new(),
            config,
            discarding: false,
        }
    }

    /// Append `bytes` and iterate the packets completed by them.
    ///
    /// Packets left incomplete stay buffered for the next call. The iterator
    /// is lazy: packets are unescaped as they are pulled.
    pub fn feed(&mut self, bytes: &[u8]) -> Packets<'_> {
        self.extend(bytes);
        Packets { decoder: self }
    }

    pub(crate) fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Decode the next packet out of an external buffer, applying this
    /// decoder's size limit.
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        decode_next(src, self.config.max_packet_size, &mut self.discarding)
    }

    /// Bytes waiting for their closing marker.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Drop any partially received packet.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.discarding = false;
    }

    /// Current decoder configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub(crate) fn next_buffered(&mut self) -> Result<Option<Bytes>> {
        decode_next(
            &mut self.buf,
            self.config.max_packet_size,
            &mut self.discarding,
        )
    }
}

/// Packets completed by one [`PacketDecoder::feed`] call.
#[derive(Debug)]
pub struct Packets<'a> {
    decoder: &'a mut PacketDecoder,
}

impl Iterator for Packets<'_> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        self.decoder.next_buffered().transpose()
    }
}
