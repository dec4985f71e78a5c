use std::path::PathBuf;

/// Baud rate used when none is configured. Matches the firmware default.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Where and how to open the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Serial device (`/dev/ttyACM0`) or Unix socket path.
    pub path: PathBuf,
    /// Line speed. Ignored for sockets.
    pub baud_rate: u32,
}

impl TransportConfig {
    /// Configuration for `path` at the default baud rate.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }

    /// Override the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}
