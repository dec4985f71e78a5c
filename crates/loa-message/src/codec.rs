use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{MessageError, Result};
use crate::value::Value;

/// An address plus its ordered arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub address: String,
    pub args: Vec<Value>,
}

impl Message {
    pub fn new(address: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }

    /// Argument at `index`, if present.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Encode into a freshly allocated buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.encoded_len_hint());
        encode_message(self, &mut dst)?;
        Ok(dst.freeze())
    }

    fn encoded_len_hint(&self) -> usize {
        let args: usize = self
            .args
            .iter()
            .map(|arg| match arg {
                Value::Str(s) => padded(s.len() + 1),
                Value::Blob(b) => 4 + padded(b.len()),
                Value::Long(_) | Value::Double(_) => 8,
                Value::Int(_) | Value::Float(_) => 4,
                Value::Bool(_) | Value::Nil => 0,
            })
            .sum();
        padded(self.address.len() + 1) + padded(self.args.len() + 2) + args
    }
}

/// Append the OSC encoding of `msg` to `dst`.
///
/// Nothing is written when an error is returned.
pub fn encode_message(msg: &Message, dst: &mut BytesMut) -> Result<()> {
    if !msg.address.starts_with('/') || msg.address.contains('\0') {
        return Err(MessageError::InvalidAddress);
    }
    for arg in &msg.args {
        match arg {
            Value::Str(s) if s.contains('\0') => return Err(MessageError::EmbeddedNul),
            Value::Blob(b) if i32::try_from(b.len()).is_err() => {
                return Err(MessageError::BlobTooLarge(b.len()))
            }
            _ => {}
        }
    }

    put_string(dst, &msg.address);

    let mut tags = String::with_capacity(msg.args.len() + 1);
    tags.push(',');
    tags.extend(msg.args.iter().map(Value::tag));
    put_string(dst, &tags);

    for arg in &msg.args {
        match arg {
            Value::Int(v) => dst.put_i32(*v),
            Value::Long(v) => dst.put_i64(*v),
            Value::Float(v) => dst.put_f32(*v),
            Value::Double(v) => dst.put_f64(*v),
            Value::Str(s) => put_string(dst, s),
            Value::Blob(b) => {
                // Length checked above.
                dst.put_i32(b.len() as i32);
                dst.put_slice(b);
                put_padding(dst, b.len());
            }
            Value::Bool(_) | Value::Nil => {}
        }
    }
    Ok(())
}

/// Decode one complete message from `src`.
///
/// Trailing bytes after the last argument are ignored.
pub fn decode_message(src: &[u8]) -> Result<Message> {
    if src.first() != Some(&b'/') {
        return Err(MessageError::InvalidAddress);
    }
    let mut cursor = Cursor { src, pos: 0 };

    let address = cursor.string('s')?.to_string();
    if cursor.pos >= src.len() || src[cursor.pos] != b',' {
        return Err(MessageError::MissingTypeTags);
    }
    let tags = cursor.string(',')?;

    let mut args = Vec::with_capacity(tags.len().saturating_sub(1));
    for tag in tags.chars().skip(1) {
        let value = match tag {
            'i' => Value::Int(i32::from_be_bytes(cursor.array(tag)?)),
            'h' => Value::Long(i64::from_be_bytes(cursor.array(tag)?)),
            'f' => Value::Float(f32::from_be_bytes(cursor.array(tag)?)),
            'd' => Value::Double(f64::from_be_bytes(cursor.array(tag)?)),
            's' => Value::Str(cursor.string(tag)?.to_string()),
            'b' => Value::Blob(cursor.blob()?),
            'T' => Value::Bool(true),
            'F' => Value::Bool(false),
            'N' => Value::Nil,
            other => return Err(MessageError::UnknownTypeTag(other)),
        };
        args.push(value);
    }

    Ok(Message { address, args })
}

struct Cursor<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize, tag: char) -> Result<&'a [u8]> {
        let start = self.pos;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.src.len())
            .ok_or(MessageError::Truncated { tag, offset: start })?;
        self.pos = end;
        Ok(&self.src[start..end])
    }

    fn array<const N: usize>(&mut self, tag: char) -> Result<[u8; N]> {
        let bytes = self.take(N, tag)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn string(&mut self, tag: char) -> Result<&'a str> {
        let start = self.pos;
        let nul = self.src[start..]
            .iter()
            .position(|b| *b == 0)
            .ok_or(MessageError::UnterminatedString(start))?;
        let text = std::str::from_utf8(&self.src[start..start + nul])
            .map_err(|_| MessageError::InvalidUtf8(start))?;
        self.take(padded(nul + 1), tag)?;
        Ok(text)
    }

    fn blob(&mut self) -> Result<Bytes> {
        let offset = self.pos;
        let size = i32::from_be_bytes(self.array('b')?);
        let size = usize::try_from(size).map_err(|_| MessageError::Truncated { tag: 'b', offset })?;
        let data = self.take(size, 'b')?;
        self.take(padded(size) - size, 'b')?;
        Ok(Bytes::copy_from_slice(data))
    }
}

fn padded(len: usize) -> usize {
    (len + 3) & !3
}

fn put_string(dst: &mut BytesMut, s: &str) {
    dst.put_slice(s.as_bytes());
    dst.put_u8(0);
    put_padding(dst, s.len() + 1);
}

fn put_padding(dst: &mut BytesMut, written: usize) {
    dst.put_bytes(0, padded(written) - written);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(msg: &Message) -> Vec<u8> {
        msg.to_bytes().unwrap().to_vec()
    }

    #[test]
    fn encodes_known_layout() {
        let msg = Message::new("/a", vec![Value::Int(1), Value::from("hi")]);
        let bytes = encode(&msg);
        assert_eq!(
            bytes,
            b"/a\0\0,is\0\0\0\0\x01hi\0\0".to_vec(),
        );
    }

    #[test]
    fn address_only_message_has_empty_tag_string() {
        let bytes = encode(&Message::new("/list-dir", vec![]));
        assert_eq!(bytes, b"/list-dir\0\0\0,\0\0\0".to_vec());
        let decoded = decode_message(&bytes).unwrap();
        assert!(decoded.args.is_empty());
    }

    #[test]
    fn string_of_exactly_four_bytes_gets_full_padding_word() {
        let bytes = encode(&Message::new("/abc", vec![]));
        assert_eq!(&bytes[..8], b"/abc\0\0\0\0");
    }

    #[test]
    fn decodes_every_tag() {
        let msg = Message::new(
            "/response/success",
            vec![
                Value::Int(-7),
                Value::Long(1 << 40),
                Value::Float(1.5),
                Value::Double(-2.25),
                Value::from("init.lua"),
                Value::from(vec![1u8, 2, 3, 4, 5]),
                Value::Bool(true),
                Value::Bool(false),
                Value::Nil,
            ],
        );
        let bytes = encode(&msg);
        assert_eq!(bytes.len() % 4, 0);
        assert_eq!(decode_message(&bytes).unwrap(), msg);
    }

    #[test]
    fn empty_blob_and_string() {
        let msg = Message::new("/x", vec![Value::from(Vec::new()), Value::from("")]);
        assert_eq!(decode_message(&encode(&msg)).unwrap(), msg);
    }

    #[test]
    fn plain_text_is_rejected() {
        assert_eq!(
            decode_message(b"hello from lua\n"),
            Err(MessageError::InvalidAddress)
        );
        assert_eq!(decode_message(b""), Err(MessageError::InvalidAddress));
    }

    #[test]
    fn slash_prefixed_text_is_rejected() {
        assert!(decode_message(b"/not a message").is_err());
    }

    #[test]
    fn missing_type_tags() {
        assert_eq!(
            decode_message(b"/abc\0\0\0\0"),
            Err(MessageError::MissingTypeTags)
        );
    }

    #[test]
    fn unknown_tag() {
        assert_eq!(
            decode_message(b"/a\0\0,x\0\0"),
            Err(MessageError::UnknownTypeTag('x'))
        );
    }

    #[test]
    fn truncated_int() {
        assert_eq!(
            decode_message(b"/a\0\0,i\0\0\0\0"),
            Err(MessageError::Truncated { tag: 'i', offset: 8 })
        );
    }

    #[test]
    fn truncated_blob() {
        let mut bytes = encode(&Message::new("/a", vec![Value::from(vec![9u8; 6])]));
        bytes.truncate(bytes.len() - 4);
        assert!(matches!(
            decode_message(&bytes),
            Err(MessageError::Truncated { tag: 'b', .. })
        ));
    }

    #[test]
    fn negative_blob_size() {
        let bytes = b"/a\0\0,b\0\0\xFF\xFF\xFF\xFF";
        assert!(matches!(
            decode_message(bytes),
            Err(MessageError::Truncated { tag: 'b', .. })
        ));
    }

    #[test]
    fn rejects_unencodable_messages() {
        let mut dst = BytesMut::new();
        assert_eq!(
            encode_message(&Message::new("raw-data", vec![]), &mut dst),
            Err(MessageError::InvalidAddress)
        );
        assert_eq!(
            encode_message(&Message::new("/a", vec![Value::from("a\0b")]), &mut dst),
            Err(MessageError::EmbeddedNul)
        );
        assert!(dst.is_empty());
    }

    #[test]
    fn len_hint_matches_encoding() {
        let msg = Message::new(
            "/write-file",
            vec![Value::Int(3), Value::from("/lua"), Value::from("main.lua")],
        );
        assert_eq!(msg.encoded_len_hint(), encode(&msg).len());
    }
}
