use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use loa_bridge::{DeviceLogger, DirEntry};
use loa_message::Value;
use serde::Serialize;

const PREFIX: &str = "[Loa]";

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// Prints device output to stdout.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleLogger {
    format: OutputFormat,
}

#[derive(Serialize)]
struct LogLine<'a> {
    kind: &'a str,
    text: &'a str,
}

impl ConsoleLogger {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    fn emit(&self, kind: &str, text: &str) {
        match self.format {
            OutputFormat::Json => print_serialized(&LogLine { kind, text }),
            _ if kind == "print" => println!("{text}"),
            _ => println!("{PREFIX} {kind}: {text}"),
        }
    }
}

impl DeviceLogger for ConsoleLogger {
    fn print(&self, text: &str) {
        self.emit("print", text);
    }

    fn info(&self, text: &str) {
        self.emit("info", text);
    }

    fn warning(&self, text: &str) {
        self.emit("warning", text);
    }

    fn error(&self, text: &str) {
        self.emit("error", text);
    }

    fn success(&self, text: &str) {
        self.emit("success", text);
    }

    fn dump(&self, text: &str) {
        let pretty = serde_json::from_str::<serde_json::Value>(text)
            .and_then(|value| serde_json::to_string_pretty(&value));
        match (self.format, pretty) {
            (OutputFormat::Json, _) => self.emit("dump", text),
            (_, Ok(pretty)) => println!("{PREFIX} dump:\n{pretty}"),
            (_, Err(_)) => self.emit("dump", text),
        }
    }
}

/// JSON form of a message argument.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Int(v) => serde_json::Value::from(*v),
        Value::Long(v) => serde_json::Value::from(*v),
        Value::Float(v) => serde_json::Value::from(f64::from(*v)),
        Value::Double(v) => serde_json::Value::from(*v),
        Value::Str(s) => serde_json::Value::from(s.as_str()),
        Value::Bool(b) => serde_json::Value::from(*b),
        Value::Blob(b) => match std::str::from_utf8(b) {
            Ok(text) => serde_json::Value::from(text),
            Err(_) => serde_json::Value::from(b.to_vec()),
        },
        Value::Nil => serde_json::Value::Null,
    }
}

#[derive(Serialize)]
struct ResponseOutput {
    address: String,
    result: serde_json::Value,
}

pub fn print_response(address: &str, value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_serialized(&ResponseOutput {
            address: address.to_string(),
            result: value_to_json(value),
        }),
        OutputFormat::Raw => match value.as_bytes() {
            Some(bytes) => print_raw(bytes),
            None => println!("{value}"),
        },
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ADDRESS", "TYPE", "RESULT"])
                .add_row(vec![
                    address.to_string(),
                    value.tag().to_string(),
                    value.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{value}"),
    }
}

#[derive(Serialize)]
struct StatusOutput<'a> {
    operation: &'a str,
    path: &'a str,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<usize>,
}

/// Report a completed file-system operation.
pub fn print_status(operation: &str, path: &str, bytes: Option<usize>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_serialized(&StatusOutput {
            operation,
            path,
            ok: true,
            bytes,
        }),
        OutputFormat::Raw => {}
        OutputFormat::Table | OutputFormat::Pretty => match bytes {
            Some(bytes) => println!("{PREFIX} {operation} {path} ({bytes} bytes)"),
            None => println!("{PREFIX} {operation} {path}"),
        },
    }
}

/// Flatten a listing into `(path, is_dir)` rows, parents before children.
pub fn flatten_listing(entries: &[DirEntry]) -> Vec<(String, bool)> {
    fn walk(entries: &[DirEntry], prefix: &str, rows: &mut Vec<(String, bool)>) {
        for entry in entries {
            let path = if prefix.is_empty() {
                entry.name().to_string()
            } else {
                format!("{prefix}/{}", entry.name())
            };
            rows.push((path.clone(), entry.is_dir()));
            walk(entry.entries(), &path, rows);
        }
    }

    let mut rows = Vec::new();
    walk(entries, "", &mut rows);
    rows
}

pub fn print_listing(path: &str, entries: &[DirEntry], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_serialized(&entries),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TYPE", "PATH"]);
            for (entry, is_dir) in flatten_listing(entries) {
                table.add_row(vec![if is_dir { "dir" } else { "file" }.to_string(), entry]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{path}");
            print_tree(entries, 1);
        }
        OutputFormat::Raw => {
            for (entry, _) in flatten_listing(entries) {
                println!("{entry}");
            }
        }
    }
}

fn print_tree(entries: &[DirEntry], depth: usize) {
    for entry in entries {
        let indent = "  ".repeat(depth);
        if entry.is_dir() {
            println!("{indent}{}/", entry.name());
            print_tree(entry.entries(), depth + 1);
        } else {
            println!("{indent}{}", entry.name());
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn print_serialized<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn flattens_nested_listing() {
        let entries = vec![
            DirEntry::File("init.lua".into()),
            DirEntry::Dir(
                "lib".into(),
                vec![
                    DirEntry::File("util.lua".into()),
                    DirEntry::Dir("deep".into(), vec![]),
                ],
            ),
        ];
        assert_eq!(
            flatten_listing(&entries),
            vec![
                ("init.lua".to_string(), false),
                ("lib".to_string(), true),
                ("lib/util.lua".to_string(), false),
                ("lib/deep".to_string(), true),
            ]
        );
    }

    #[test]
    fn values_convert_to_json() {
        assert_eq!(value_to_json(&Value::Int(7)), serde_json::json!(7));
        assert_eq!(value_to_json(&Value::Bool(true)), serde_json::json!(true));
        assert_eq!(value_to_json(&Value::Nil), serde_json::Value::Null);
        assert_eq!(
            value_to_json(&Value::Blob(Bytes::from_static(b"text"))),
            serde_json::json!("text")
        );
        assert_eq!(
            value_to_json(&Value::Blob(Bytes::from_static(&[0xFF, 0x00]))),
            serde_json::json!([255, 0])
        );
    }
}
