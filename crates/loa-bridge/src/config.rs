use std::time::Duration;

use loa_frame::FrameConfig;

/// How long a request waits for its response.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Largest inbound frame the bridge accepts (16 MiB).
pub const DEFAULT_MAX_PACKET_SIZE: usize = 16 * 1024 * 1024;

/// Bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Deadline for each request, and for the raw frame of a raw response.
    pub response_timeout: Duration,
    /// Inbound frame size limit; `None` is unbounded.
    pub max_packet_size: Option<usize>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            max_packet_size: Some(DEFAULT_MAX_PACKET_SIZE),
        }
    }
}

impl BridgeConfig {
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_max_packet_size(mut self, max: Option<usize>) -> Self {
        self.max_packet_size = max;
        self
    }

    pub(crate) fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_packet_size: self.max_packet_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.response_timeout, Duration::from_millis(1000));
        assert_eq!(config.frame_config().max_packet_size, Some(16 * 1024 * 1024));
    }
}
