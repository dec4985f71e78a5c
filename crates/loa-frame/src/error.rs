/// Errors that can occur during packet encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An escape byte was followed by something other than `ESC_END`/`ESC_ESC`.
    ///
    /// Only the packet containing it is lost; decoding resumes at the next
    /// `END` marker.
    #[error("invalid escape sequence 0xDB 0x{0:02X}")]
    InvalidEscape(u8),

    /// A packet exceeded the configured maximum size and was discarded.
    #[error("packet too large ({size} bytes, max {max})")]
    PacketTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing packets.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended. Any incomplete trailing packet was dropped.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// Whether decoding can continue with the next packet after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FrameError::InvalidEscape(_) | FrameError::PacketTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
