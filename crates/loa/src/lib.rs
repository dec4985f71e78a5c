//! Host side of Lua on Arduino.
//!
//! A Loa device runs Lua scripts from its SD card and talks to the host over
//! a serial line: SLIP-framed OSC messages, with whole files sent as single
//! raw frames. This crate re-exports the layers:
//!
//! - [`transport`] : opening the serial device (or a Unix socket simulator)
//! - [`frame`] : SLIP packet framing
//! - [`message`] : OSC message codec
//! - [`bridge`] : request/response bridge, pattern router, device operations
//!
//! ```no_run
//! # async fn demo() -> loa::bridge::Result<()> {
//! use std::sync::Arc;
//! use loa::bridge::{Bridge, Device, TracingLogger};
//! use loa::transport::TransportConfig;
//!
//! let bridge = Bridge::new(Arc::new(TracingLogger))?;
//! bridge.connect(&TransportConfig::new("/dev/ttyACM0")).await?;
//! let device = Device::new(bridge)?;
//! device.write_file("lua/main.lua", "print('hi')").await?;
//! # Ok(())
//! # }
//! ```

/// Re-export transport types.
pub mod transport {
    pub use loa_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use loa_frame::*;
}

/// Re-export message types.
pub mod message {
    pub use loa_message::*;
}

/// Re-export bridge types.
pub mod bridge {
    pub use loa_bridge::*;
}
