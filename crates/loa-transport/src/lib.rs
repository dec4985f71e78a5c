//! Byte-stream transports for reaching a Loa device.
//!
//! A device is normally attached over a serial line (a tty character device
//! such as `/dev/ttyACM0`). Simulators and `socat` relays expose the same
//! byte stream on a Unix domain socket instead. [`DeviceStream::open`] looks
//! at the configured path and picks the matching transport.
//!
//! This is the lowest layer of loa. It knows nothing about framing or
//! messages; everything above it only sees `AsyncRead + AsyncWrite`.

pub mod config;
pub mod error;
#[cfg(unix)]
pub mod stream;

#[cfg(unix)]
pub mod tty;
#[cfg(unix)]
pub mod uds;

pub use config::{TransportConfig, DEFAULT_BAUD_RATE};
pub use error::{Result, TransportError};
#[cfg(unix)]
pub use stream::DeviceStream;
