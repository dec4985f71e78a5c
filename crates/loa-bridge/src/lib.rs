//! Request/response bridge to a Loa device.
//!
//! The device speaks OSC messages inside SLIP frames over a serial line. This
//! crate turns that one-way stream into something a host can drive:
//!
//! - [`PatternRouter`] dispatches inbound messages to handlers registered on
//!   address patterns (`/log/:level`, `/raw/**`).
//! - [`RequestCorrelator`] tags each request with a 16-bit id and settles the
//!   caller's future when `/response/:outcome` carries that id back, or when
//!   the response timeout elapses.
//! - [`ReceiveModeMachine`] switches the next frame to raw capture after any
//!   `/raw/**` notification, so whole files can travel as a single frame.
//! - [`Bridge`] composes these over a transport and [`Device`] exposes the
//!   file-system operations built on top.

pub mod address;
pub mod bridge;
pub mod config;
pub mod correlator;
pub mod device;
pub mod error;
pub mod event;
pub mod logger;
pub mod mode;
pub mod pattern;
pub mod router;

pub use bridge::Bridge;
pub use config::{BridgeConfig, DEFAULT_MAX_PACKET_SIZE, DEFAULT_RESPONSE_TIMEOUT};
pub use correlator::{PendingResponse, RequestCorrelator, RequestState};
pub use device::{dir_list_includes, Device, DirEntry};
pub use error::{BridgeError, PatternError, Result};
pub use event::Event;
pub use logger::{DeviceLogger, Severity, TracingLogger, UnknownSeverity};
pub use mode::{Inbound, ReceiveMode, ReceiveModeMachine};
pub use pattern::{Params, PathPattern};
pub use router::{HandlerId, PatternRouter, WeakRouter};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a std mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
