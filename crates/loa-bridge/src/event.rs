use bytes::Bytes;
use loa_message::{Message, Value};

use crate::address::RAW_DATA;

/// Something the device sent, as seen by router handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A decoded structured message.
    Message(Message),
    /// A frame captured verbatim in raw mode, emitted under `/raw-data`.
    RawData(Bytes),
    /// The frame armed for raw capture was lost to a framing error. Emitted
    /// under `/raw-data` in place of the data.
    RawLost(String),
}

impl Event {
    /// The address this event is routed under.
    pub fn address(&self) -> &str {
        match self {
            Event::Message(message) => &message.address,
            Event::RawData(_) | Event::RawLost(_) => RAW_DATA,
        }
    }

    /// Message arguments; raw frames have none.
    pub fn args(&self) -> &[Value] {
        match self {
            Event::Message(message) => &message.args,
            Event::RawData(_) | Event::RawLost(_) => &[],
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Event::Message(message) => Some(message),
            Event::RawData(_) | Event::RawLost(_) => None,
        }
    }

    pub fn raw_data(&self) -> Option<&Bytes> {
        match self {
            Event::RawData(data) => Some(data),
            Event::Message(_) | Event::RawLost(_) => None,
        }
    }
}
