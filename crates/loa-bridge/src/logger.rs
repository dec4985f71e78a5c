//! Where device output ends up.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, error, info, warn};

const TARGET: &str = "loa::device";

/// Severity of a device log line (`/log/:level`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Success,
    /// JSON text to be pretty-printed.
    Dump,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Success => "success",
            Severity::Dump => "dump",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `:level` the logger has no method for.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("unknown severity: {0:?}")]
pub struct UnknownSeverity(pub String);

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "success" => Ok(Severity::Success),
            "dump" => Ok(Severity::Dump),
            other => Err(UnknownSeverity(other.to_string())),
        }
    }
}

/// Receiver for text the device produces.
///
/// `print` gets plain output that was not a protocol message, with one
/// trailing line break removed. The severity methods get `/log/:level` lines.
pub trait DeviceLogger: Send + Sync {
    fn print(&self, text: &str);
    fn info(&self, text: &str);
    fn warning(&self, text: &str);
    fn error(&self, text: &str);
    fn success(&self, text: &str);
    fn dump(&self, text: &str);

    fn log(&self, severity: Severity, text: &str) {
        match severity {
            Severity::Info => self.info(text),
            Severity::Warning => self.warning(text),
            Severity::Error => self.error(text),
            Severity::Success => self.success(text),
            Severity::Dump => self.dump(text),
        }
    }
}

/// Forwards device output to `tracing` under the `loa::device` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl DeviceLogger for TracingLogger {
    fn print(&self, text: &str) {
        info!(target: TARGET, output = text, "device output");
    }

    fn info(&self, text: &str) {
        info!(target: TARGET, "{text}");
    }

    fn warning(&self, text: &str) {
        warn!(target: TARGET, "{text}");
    }

    fn error(&self, text: &str) {
        error!(target: TARGET, "{text}");
    }

    fn success(&self, text: &str) {
        info!(target: TARGET, success = true, "{text}");
    }

    fn dump(&self, text: &str) {
        debug!(target: TARGET, dump = text, "device dump");
    }
}

/// Strip one trailing `\n` or `\r\n`.
pub fn trim_line_break(text: &str) -> &str {
    text.strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(text)
}
