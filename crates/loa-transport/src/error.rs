use std::path::PathBuf;

/// Errors that can occur while opening or using a device transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the device path.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to put the serial line into raw mode or set its speed.
    #[error("failed to configure {path}: {source}")]
    Configure {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The requested baud rate has no termios equivalent.
    #[error("unsupported baud rate {0}")]
    UnsupportedBaudRate(u32),

    /// The path exists but is neither a character device nor a socket.
    #[error("{path} is not a serial device or unix socket")]
    UnsupportedDevice { path: PathBuf },

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
