//! Reserved addresses of the device protocol.

/// Inline reply to a request: `[id, payload?]`.
pub const RESPONSE: &str = "/response/:outcome";
/// Reply whose payload is the next raw frame: `[id]`.
pub const RAW_RESPONSE: &str = "/raw/response/:outcome";
/// Any notification announcing a raw frame.
pub const RAW_ANY: &str = "/raw/**";
/// Device log line: `[text]`.
pub const LOG: &str = "/log/:level";
/// Device log line carried by the next raw frame.
pub const RAW_LOG: &str = "/raw/log/:level";
/// Address under which captured raw frames are emitted.
pub const RAW_DATA: &str = "/raw-data";

/// The `outcome` value that resolves a request.
pub const SUCCESS: &str = "success";

pub const READ_FILE: &str = "/read-file";
pub const WRITE_FILE: &str = "/write-file";
pub const DELETE_FILE: &str = "/delete-file";
pub const CREATE_DIR: &str = "/create-dir";
pub const DELETE_DIR: &str = "/delete-dir";
pub const LIST_DIR: &str = "/list-dir";
