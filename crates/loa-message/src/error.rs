/// Errors that can occur during message encoding/decoding.
///
/// Every decode variant means the same thing to a caller: the bytes are not
/// a well-formed message.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MessageError {
    /// The buffer does not start with an address (`/...`).
    #[error("missing or invalid address")]
    InvalidAddress,

    /// A string ran to the end of the buffer without a NUL terminator.
    #[error("unterminated string at offset {0}")]
    UnterminatedString(usize),

    /// A string is not valid UTF-8.
    #[error("string at offset {0} is not valid UTF-8")]
    InvalidUtf8(usize),

    /// The address is not followed by a `,`-prefixed type tag string.
    #[error("missing type tag string")]
    MissingTypeTags,

    /// A type tag this codec does not know.
    #[error("unknown type tag '{0}'")]
    UnknownTypeTag(char),

    /// An argument needs more bytes than the buffer has left.
    #[error("truncated argument '{tag}' at offset {offset}")]
    Truncated { tag: char, offset: usize },

    /// A string argument contains a NUL byte and cannot be encoded.
    #[error("string contains a NUL byte")]
    EmbeddedNul,

    /// A blob is longer than the 32-bit size field allows.
    #[error("blob too large ({0} bytes)")]
    BlobTooLarge(usize),
}

pub type Result<T> = std::result::Result<T, MessageError>;
