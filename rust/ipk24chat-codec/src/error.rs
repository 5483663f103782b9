use std::fmt;

use ipk24chat_wire::{MessageKind, ValidationError};

/// A `Message` variant that has no representation on the transport being
/// encoded for (e.g. `Confirm`/`Ping` on the stream transport).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeError {
    pub kind: MessageKind,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} has no representation on this transport", self.kind)
    }
}

impl std::error::Error for EncodeError {}

/// A received frame did not conform to the wire grammar for its transport.
/// Per §4.1, a malformed frame is always an `Err`, never silently dropped or
/// promoted to `Message::Unknown` (unlike an unrecognized-but-well-formed
/// text line, which *does* decode to `Unknown`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer than 3 bytes: no room for a type code and a 16-bit `msgId`.
    TooShort,
    UnknownTypeCode(u8),
    /// A declared string field had no terminating NUL byte before the end
    /// of the datagram.
    MissingNulTerminator,
    /// Bytes remained after the last field the grammar declares.
    TrailingBytes,
    InvalidUtf8,
    InvalidField(ValidationError),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::TooShort => write!(f, "frame shorter than 3 bytes"),
            DecodeError::UnknownTypeCode(code) => write!(f, "unknown type code: 0x{code:02X}"),
            DecodeError::MissingNulTerminator => {
                write!(f, "declared string field has no NUL terminator")
            }
            DecodeError::TrailingBytes => write!(f, "trailing bytes after the last declared field"),
            DecodeError::InvalidUtf8 => write!(f, "string field is not valid UTF-8"),
            DecodeError::InvalidField(e) => write!(f, "invalid field: {e}"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<ValidationError> for DecodeError {
    fn from(e: ValidationError) -> Self {
        DecodeError::InvalidField(e)
    }
}
