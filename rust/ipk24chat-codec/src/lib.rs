//! Wire codecs for both IPK24-CHAT transports. `text` implements the
//! CRLF-delimited stream grammar, `binary` the length-implicit datagram
//! grammar. Neither module touches I/O — callers own framing (splitting a
//! byte stream into lines, or a socket into datagrams) and hand this crate
//! complete frames.

mod binary;
mod error;
mod text;

pub use binary as datagram;
pub use error::{DecodeError, EncodeError};
pub use text as stream;
