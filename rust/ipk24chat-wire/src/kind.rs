use std::fmt;

/// The closed set of message kinds the protocol can carry. `Reply`'s
/// success flag is carried on `Message`, not duplicated here, so `MessageKind`
/// stays a plain tag usable as a lookup key by the FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Auth,
    Join,
    Msg,
    Err,
    Bye,
    Reply,
    /// Datagram transport only.
    Confirm,
    /// Datagram transport only, server to client.
    Ping,
    Unknown,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageKind::Auth => "AUTH",
            MessageKind::Join => "JOIN",
            MessageKind::Msg => "MSG",
            MessageKind::Err => "ERR",
            MessageKind::Bye => "BYE",
            MessageKind::Reply => "REPLY",
            MessageKind::Confirm => "CONFIRM",
            MessageKind::Ping => "PING",
            MessageKind::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}
