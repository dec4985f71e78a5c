use std::io::{ErrorKind, Read};

use bytes::Bytes;

use crate::codec::{FrameConfig, PacketDecoder};
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Reads complete packets from any blocking `Read` stream.
///
/// Handles partial reads internally; callers always get complete packets.
pub struct PacketReader<T> {
    inner: T,
    decoder: PacketDecoder,
}

impl<T: Read> PacketReader<T> {
    /// Create a new packet reader without a packet size limit.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new packet reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            decoder: PacketDecoder::with_config(config),
        }
    }

    /// Read the next complete packet (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached; a
    /// partial packet still buffered at that point is dropped. Recoverable
    /// errors ([`FrameError::is_recoverable`]) only concern one packet and
    /// the reader can be called again.
    pub fn read_packet(&mut self) -> Result<Bytes> {
        loop {
            if let Some(packet) = self.decoder.next_buffered()? {
                return Ok(packet);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                self.decoder.reset();
                return Err(FrameError::ConnectionClosed);
            }

            self.decoder.extend(&chunk[..read]);
        }
    }

    /// Iterate packets until the stream closes.
    ///
    /// Recoverable errors are yielded and iteration continues; the iterator
    /// ends at EOF or after the first unrecoverable error.
    pub fn packets(&mut self) -> impl Iterator<Item = Result<Bytes>> + '_ {
        let mut done = false;
        std::iter::from_fn(move || {
            if done {
                return None;
            }
            match self.read_packet() {
                Ok(packet) => Some(Ok(packet)),
                Err(FrameError::ConnectionClosed) => {
                    done = true;
                    None
                }
                Err(err) => {
                    done = !err.is_recoverable();
                    Some(Err(err))
                }
            }
        })
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
