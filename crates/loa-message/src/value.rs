use std::fmt;

use bytes::Bytes;

/// One typed message argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 32-bit integer (`i`).
    Int(i32),
    /// 64-bit integer (`h`).
    Long(i64),
    /// 32-bit float (`f`).
    Float(f32),
    /// 64-bit float (`d`).
    Double(f64),
    /// UTF-8 string (`s`).
    Str(String),
    /// Binary blob (`b`).
    Blob(Bytes),
    /// Boolean (`T` / `F`), carries no payload bytes.
    Bool(bool),
    /// Nil (`N`), carries no payload bytes.
    Nil,
}

impl Value {
    /// The OSC type tag for this value.
    pub fn tag(&self) -> char {
        match self {
            Value::Int(_) => 'i',
            Value::Long(_) => 'h',
            Value::Float(_) => 'f',
            Value::Double(_) => 'd',
            Value::Str(_) => 's',
            Value::Blob(_) => 'b',
            Value::Bool(true) => 'T',
            Value::Bool(false) => 'F',
            Value::Nil => 'N',
        }
    }

    /// Integer value of `Int` or `Long`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(i64::from(*v)),
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Float value of `Float` or `Double`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Raw bytes of a `Blob`, or the UTF-8 bytes of a `Str`.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            Value::Str(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Loose truthiness: `false`, `Nil`, zero and the empty string are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(v) => *v != 0,
            Value::Long(v) => *v != 0,
            Value::Float(v) => *v != 0.0 && !v.is_nan(),
            Value::Double(v) => *v != 0.0 && !v.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Blob(_) => true,
            Value::Bool(b) => *b,
            Value::Nil => false,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Str(s) => f.write_str(s),
            Value::Blob(b) => match std::str::from_utf8(b) {
                Ok(text) => f.write_str(text),
                Err(_) => write!(f, "<binary {} bytes>", b.len()),
            },
            Value::Bool(b) => write!(f, "{b}"),
            Value::Nil => f.write_str("nil"),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::Int(i32::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Blob(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(Bytes::from(v))
    }
}
