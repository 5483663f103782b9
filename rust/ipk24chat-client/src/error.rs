use std::fmt;

use ipk24chat_codec::EncodeError;
use ipk24chat_fsm::FsmViolation;
use ipk24chat_reliability::ReliabilityError;
use ipk24chat_transport::TransportError;

use crate::cli::CliError;

/// Top-level error type for the client binary. Every variant here is a
/// non-zero exit per §7 — clean shutdown (user BYE/EOF, server BYE, server
/// ERR) never produces one and exits 0 from the event loop returning
/// `Ok(())` instead.
#[derive(Debug)]
pub enum ClientError {
    Cli(CliError),
    Transport(TransportError),
    Reliability(ReliabilityError),
    Fsm(FsmViolation),
    ReplyTimedOut,
    Unrepresentable(EncodeError),
    /// The stream transport closed with no partial frame buffered, but also
    /// with no BYE decoded first — a bare disconnect, not the orderly
    /// server-initiated termination in §7, so it is a non-zero exit.
    DisconnectedWithoutBye,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Cli(e) => write!(f, "{e}"),
            ClientError::Transport(e) => write!(f, "{e}"),
            ClientError::Reliability(e) => write!(f, "{e}"),
            ClientError::Fsm(e) => write!(f, "{e}"),
            ClientError::ReplyTimedOut => write!(f, "timed out waiting for a REPLY"),
            ClientError::Unrepresentable(e) => write!(f, "{e}"),
            ClientError::DisconnectedWithoutBye => {
                write!(f, "server closed the connection without sending BYE")
            }
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Cli(e) => Some(e),
            ClientError::Transport(e) => Some(e),
            ClientError::Reliability(e) => Some(e),
            ClientError::Fsm(e) => Some(e),
            ClientError::ReplyTimedOut => None,
            ClientError::Unrepresentable(e) => Some(e),
            ClientError::DisconnectedWithoutBye => None,
        }
    }
}

impl From<CliError> for ClientError {
    fn from(e: CliError) -> Self {
        ClientError::Cli(e)
    }
}

impl From<TransportError> for ClientError {
    fn from(e: TransportError) -> Self {
        ClientError::Transport(e)
    }
}

impl From<ReliabilityError> for ClientError {
    fn from(e: ReliabilityError) -> Self {
        ClientError::Reliability(e)
    }
}

impl From<FsmViolation> for ClientError {
    fn from(e: FsmViolation) -> Self {
        ClientError::Fsm(e)
    }
}
