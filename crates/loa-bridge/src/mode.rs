//! Structured vs raw interpretation of inbound frames.

use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;

/// How the next inbound frame is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReceiveMode {
    /// Decode as a message.
    #[default]
    Structured,
    /// Deliver verbatim as raw data.
    RawCapture,
}

/// A frame after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Structured(Bytes),
    Raw(Bytes),
}

/// Two-state receive machine.
///
/// [`arm`](Self::arm) switches to [`ReceiveMode::RawCapture`]; the next
/// classified frame is raw and the machine drops back to
/// [`ReceiveMode::Structured`] whatever happens to that frame. Capture never
/// spans more than one frame.
#[derive(Debug, Default)]
pub struct ReceiveModeMachine {
    raw_armed: AtomicBool,
}

impl ReceiveModeMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> ReceiveMode {
        if self.raw_armed.load(Ordering::Acquire) {
            ReceiveMode::RawCapture
        } else {
            ReceiveMode::Structured
        }
    }

    /// Capture the next frame raw. Arming twice still captures one frame.
    pub fn arm(&self) {
        self.raw_armed.store(true, Ordering::Release);
    }

    /// Classify one frame, consuming the raw arming if set.
    pub fn classify(&self, packet: Bytes) -> Inbound {
        if self.raw_armed.swap(false, Ordering::AcqRel) {
            Inbound::Raw(packet)
        } else {
            Inbound::Structured(packet)
        }
    }

    /// Account for a frame the framer had to drop.
    ///
    /// A lost frame still consumes the raw arming. Returns `true` if the lost
    /// frame was the one armed for raw capture.
    pub fn discard(&self) -> bool {
        self.raw_armed.swap(false, Ordering::AcqRel)
    }

    /// Back to [`ReceiveMode::Structured`], forgetting any pending arming.
    pub fn reset(&self) {
        self.raw_armed.store(false, Ordering::Release);
    }
}
