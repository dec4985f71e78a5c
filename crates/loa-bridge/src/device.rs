//! File-system operations against the device's storage, and forwarding of
//! device log lines to the [`DeviceLogger`](crate::DeviceLogger).

use std::sync::Arc;

use bytes::Bytes;
use loa_message::Value;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::address::{
    CREATE_DIR, DELETE_DIR, DELETE_FILE, LIST_DIR, LOG, RAW_DATA, RAW_LOG, READ_FILE, WRITE_FILE,
};
use crate::bridge::Bridge;
use crate::error::{BridgeError, Result};
use crate::event::Event;
use crate::logger::Severity;
use crate::pattern::Params;

/// One entry of a device directory listing.
///
/// On the wire a file is a JSON string and a directory is a
/// `[name, [entries...]]` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DirEntry {
    File(String),
    Dir(String, Vec<DirEntry>),
}

impl DirEntry {
    pub fn name(&self) -> &str {
        match self {
            DirEntry::File(name) | DirEntry::Dir(name, _) => name,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, DirEntry::Dir(..))
    }

    /// Children of a directory; empty for files.
    pub fn entries(&self) -> &[DirEntry] {
        match self {
            DirEntry::Dir(_, entries) => entries,
            DirEntry::File(_) => &[],
        }
    }
}

/// Whether `path` (relative to the listed directory) exists in `list`.
///
/// Both files and directories count.
pub fn dir_list_includes(list: &[DirEntry], path: &str) -> bool {
    let normalized = normalize_path(path);
    let mut segments = normalized
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .peekable();

    let mut level = list;
    while let Some(segment) = segments.next() {
        let Some(entry) = level.iter().find(|entry| entry.name() == segment) else {
            return false;
        };
        if segments.peek().is_none() {
            return true;
        }
        match entry {
            DirEntry::Dir(_, entries) => level = entries,
            DirEntry::File(_) => return false,
        }
    }
    false
}

/// A connected device.
#[derive(Debug, Clone)]
pub struct Device {
    bridge: Bridge,
}

impl Device {
    /// Wrap `bridge` and forward device logs to its logger.
    ///
    /// `/log/:level` lines log their first argument; `/raw/log/:level` lines
    /// log the raw frame that follows. Unknown levels are ignored. Wrap a
    /// bridge once, or every log line is forwarded once per wrapper.
    pub fn new(bridge: Bridge) -> Result<Self> {
        let logger = bridge.logger();
        bridge.on(LOG, move |event, params| {
            let Some(severity) = parse_severity(params) else {
                return;
            };
            let text = event.args().first().map(Value::to_string).unwrap_or_default();
            logger.log(severity, &text);
        })?;

        let logger = bridge.logger();
        let router = bridge.router().downgrade();
        bridge.on(RAW_LOG, move |_, params| {
            let (Some(severity), Some(router)) = (parse_severity(params), router.upgrade()) else {
                return;
            };
            let logger = Arc::clone(&logger);
            let registered = router.once(RAW_DATA, move |event, _| match event {
                Event::RawData(data) => logger.log(severity, &String::from_utf8_lossy(data)),
                Event::RawLost(reason) => warn!(reason = %reason, "raw log line lost"),
                Event::Message(_) => {}
            });
            if let Err(err) = registered {
                warn!(error = %err, "failed to capture raw log line");
            }
        })?;

        Ok(Self { bridge })
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Read a whole file.
    pub async fn read_file(&self, path: &str) -> Result<Bytes> {
        let path = normalize_path(path);
        let payload = self
            .bridge
            .send_request(READ_FILE, vec![Value::from(path)])
            .await?;
        match payload {
            Value::Blob(data) => Ok(data),
            Value::Str(text) => Ok(Bytes::from(text)),
            Value::Nil => Ok(Bytes::new()),
            other => Err(BridgeError::UnexpectedResponse(format!(
                "read-file returned {other:?}"
            ))),
        }
    }

    /// Write `data` to `path`, replacing any existing file.
    ///
    /// Returns the device's verdict on the write.
    pub async fn write_file(&self, path: &str, data: impl Into<Bytes>) -> Result<bool> {
        let path = normalize_path(path);
        let (dir, name) = split_path(&path);
        let data = data.into();
        debug!(dir, name, len = data.len(), "writing file");
        let payload = self
            .bridge
            .send_raw_request(WRITE_FILE, vec![Value::from(dir), Value::from(name)], data)
            .await?;
        Ok(payload.is_truthy())
    }

    pub async fn delete_file(&self, path: &str) -> Result<()> {
        self.path_request(DELETE_FILE, path).await
    }

    pub async fn create_dir(&self, path: &str) -> Result<()> {
        self.path_request(CREATE_DIR, path).await
    }

    pub async fn delete_dir(&self, path: &str) -> Result<()> {
        self.path_request(DELETE_DIR, path).await
    }

    /// List `path` recursively.
    pub async fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let path = normalize_path(path);
        let payload = self
            .bridge
            .send_request(LIST_DIR, vec![Value::from(path)])
            .await?;
        let json = payload.as_bytes().ok_or_else(|| {
            BridgeError::UnexpectedResponse(format!("list-dir returned {payload:?}"))
        })?;
        Ok(serde_json::from_slice(json)?)
    }

    async fn path_request(&self, address: &str, path: &str) -> Result<()> {
        let path = normalize_path(path);
        self.bridge
            .send_request(address, vec![Value::from(path)])
            .await?;
        Ok(())
    }
}

fn parse_severity(params: &Params) -> Option<Severity> {
    let level = params.get("level")?;
    match level.parse() {
        Ok(severity) => Some(severity),
        Err(err) => {
            debug!(error = %err, "ignoring device log line");
            None
        }
    }
}

fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Split into `(dirname, basename)` the way POSIX `dirname`/`basename` do.
fn split_path(path: &str) -> (&str, &str) {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return (if path.is_empty() { "." } else { "/" }, "");
    }
    match trimmed.rfind('/') {
        None => (".", trimmed),
        Some(0) => ("/", &trimmed[1..]),
        Some(index) => (&trimmed[..index], &trimmed[index + 1..]),
    }
}
