use std::fmt;

use ipk24chat_codec::{DecodeError, EncodeError};
use ipk24chat_transport::TransportError;
use ipk24chat_wire::MessageKind;

/// Failures from the datagram reliability layer. `Malformed` and
/// `UnexpectedMessage` both correspond to the *malformed frame* error kind
/// in the recovery policy (an ERR, then a BYE, then a non-zero exit);
/// `RetransmissionBudgetExhausted` and `ReplyTimedOut` correspond to
/// *timeout exhausted*.
#[derive(Debug)]
pub enum ReliabilityError {
    Transport(TransportError),
    Malformed(DecodeError),
    /// The server sent a message kind it never legitimately originates
    /// (AUTH or JOIN), which the datagram grammar accepts structurally but
    /// this protocol never permits from that direction.
    UnexpectedMessage(MessageKind),
    RetransmissionBudgetExhausted,
    ReplyTimedOut,
    /// `send_confirmed`/`send_and_await_reply` were handed a `Message`
    /// variant with no datagram representation (only ever `Unknown`, which
    /// the client never originates).
    Unrepresentable(EncodeError),
}

impl fmt::Display for ReliabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReliabilityError::Transport(e) => write!(f, "{e}"),
            ReliabilityError::Malformed(e) => write!(f, "malformed datagram: {e}"),
            ReliabilityError::UnexpectedMessage(kind) => {
                write!(f, "server sent an unexpected {kind}")
            }
            ReliabilityError::RetransmissionBudgetExhausted => {
                write!(f, "retransmission budget exhausted without a CONFIRM")
            }
            ReliabilityError::ReplyTimedOut => write!(f, "timed out waiting for a REPLY"),
            ReliabilityError::Unrepresentable(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ReliabilityError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReliabilityError::Transport(e) => Some(e),
            ReliabilityError::Malformed(e) => Some(e),
            ReliabilityError::Unrepresentable(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for ReliabilityError {
    fn from(e: TransportError) -> Self {
        ReliabilityError::Transport(e)
    }
}
