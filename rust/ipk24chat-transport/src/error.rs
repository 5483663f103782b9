use std::fmt;
use std::io;

/// Failures from sending or receiving on either transport.
#[derive(Debug)]
pub enum TransportError {
    Io(io::Error),
    /// The stream transport hit EOF while a partial (non-CRLF-terminated)
    /// line was still buffered.
    TruncatedFrame,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Io(e) => write!(f, "transport I/O error: {e}"),
            TransportError::TruncatedFrame => {
                write!(f, "connection closed with an incomplete frame buffered")
            }
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Io(e) => Some(e),
            TransportError::TruncatedFrame => None,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        TransportError::Io(e)
    }
}
