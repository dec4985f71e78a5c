//! SLIP packet framing for the serial link.
//!
//! The link is a continuous byte stream. Packets are delimited by an `END`
//! marker byte (`0xC0`); marker and escape bytes inside a payload are
//! escaped so the marker is never ambiguous:
//!
//! ```text
//! payload byte   wire bytes
//! 0xC0 (END)  -> 0xDB 0xDC (ESC ESC_END)
//! 0xDB (ESC)  -> 0xDB 0xDD (ESC ESC_ESC)
//! ```
//!
//! Every encoded packet is wrapped in a leading and a trailing `END`, so an
//! empty payload travels as two adjacent markers and decodes back to an empty
//! packet. Senders that only terminate packets work too.
//!
//! No partial reads, no buffer management in user code: [`PacketReader`] and
//! [`PacketDecoder`] buffer incomplete packets across reads. The `async`
//! feature adds [`SlipCodec`] for `tokio_util::codec` framed streams.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod tokio_codec;

pub use codec::{
    decode_packet, encode_packet, encoded_len, FrameConfig, PacketDecoder, END, ESC, ESC_END,
    ESC_ESC,
};
pub use error::{FrameError, Result};
pub use reader::PacketReader;
pub use writer::PacketWriter;

#[cfg(feature = "async")]
pub use tokio_codec::{Decoded, SlipCodec};
