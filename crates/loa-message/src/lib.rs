//! Typed messages exchanged with the device.
//!
//! A [`Message`] is an address (`/read-file`, `/log/error`, ...) plus an
//! ordered list of typed [`Value`] arguments, encoded as an OSC 1.0 packet:
//!
//! ```text
//! ┌────────────────────┬────────────────────┬───────────────────────┐
//! │ address            │ type tags          │ arguments             │
//! │ "/write-file\0"    │ ",iss\0\0\0\0"     │ i32 BE, "lua\0", ...  │
//! │ NUL, pad to 4      │ NUL, pad to 4      │ each padded to 4      │
//! └────────────────────┴────────────────────┴───────────────────────┘
//! ```
//!
//! Decoding is strict. Bytes that do not form a message (for example plain
//! text printed by a Lua script) fail with a [`MessageError`], and it is up
//! to the caller what to do with them.

pub mod codec;
pub mod error;
pub mod value;

pub use codec::{decode_message, encode_message, Message};
pub use error::{MessageError, Result};
pub use value::Value;
