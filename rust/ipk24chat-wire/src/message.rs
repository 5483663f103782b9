use crate::identity::{ChannelId, Content, DisplayName, Secret, Username};
use crate::kind::MessageKind;

/// The in-memory representation of every frame the protocol can carry, on
/// either transport. `msg_id` is zero on the stream transport, which carries
/// no identifiers on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Auth {
        msg_id: u16,
        username: Username,
        display_name: DisplayName,
        secret: Secret,
    },
    Join {
        msg_id: u16,
        channel_id: ChannelId,
        display_name: DisplayName,
    },
    Msg {
        msg_id: u16,
        display_name: DisplayName,
        content: Content,
    },
    Err {
        msg_id: u16,
        display_name: DisplayName,
        content: Content,
    },
    Bye {
        msg_id: u16,
        display_name: DisplayName,
    },
    Reply {
        msg_id: u16,
        ok: bool,
        ref_msg_id: u16,
        content: Content,
    },
    /// Datagram transport only.
    Confirm { ref_msg_id: u16 },
    /// Datagram transport only, server to client.
    Ping { msg_id: u16 },
    /// Any frame that does not match a known grammar. Never constructed
    /// intentionally by the client; only ever produced by decoding.
    Unknown,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Auth { .. } => MessageKind::Auth,
            Message::Join { .. } => MessageKind::Join,
            Message::Msg { .. } => MessageKind::Msg,
            Message::Err { .. } => MessageKind::Err,
            Message::Bye { .. } => MessageKind::Bye,
            Message::Reply { .. } => MessageKind::Reply,
            Message::Confirm { .. } => MessageKind::Confirm,
            Message::Ping { .. } => MessageKind::Ping,
            Message::Unknown => MessageKind::Unknown,
        }
    }

    /// The identifier assigned by the originator, where one exists. Zero on
    /// the stream transport and on `Unknown`.
    pub fn msg_id(&self) -> u16 {
        match self {
            Message::Auth { msg_id, .. }
            | Message::Join { msg_id, .. }
            | Message::Msg { msg_id, .. }
            | Message::Err { msg_id, .. }
            | Message::Bye { msg_id, .. }
            | Message::Reply { msg_id, .. }
            | Message::Ping { msg_id, .. } => *msg_id,
            Message::Confirm { .. } | Message::Unknown => 0,
        }
    }

    /// Returns a copy of this message with `msg_id` replaced, used by the
    /// reliability engine to stamp an identifier at send time.
    pub fn with_msg_id(mut self, id: u16) -> Self {
        match &mut self {
            Message::Auth { msg_id, .. }
            | Message::Join { msg_id, .. }
            | Message::Msg { msg_id, .. }
            | Message::Err { msg_id, .. }
            | Message::Bye { msg_id, .. }
            | Message::Reply { msg_id, .. }
            | Message::Ping { msg_id, .. } => *msg_id = id,
            Message::Confirm { .. } | Message::Unknown => {}
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let m = Message::Bye {
            msg_id: 0,
            display_name: DisplayName::try_from("Al").unwrap(),
        };
        assert_eq!(m.kind(), MessageKind::Bye);
    }

    #[test]
    fn with_msg_id_is_a_no_op_on_confirm() {
        let m = Message::Confirm { ref_msg_id: 7 }.with_msg_id(99);
        assert_eq!(m, Message::Confirm { ref_msg_id: 7 });
    }

    #[test]
    fn with_msg_id_stamps_auth() {
        let m = Message::Auth {
            msg_id: 0,
            username: Username::try_from("u").unwrap(),
            display_name: DisplayName::try_from("D").unwrap(),
            secret: Secret::try_from("p").unwrap(),
        }
        .with_msg_id(5);
        assert_eq!(m.msg_id(), 5);
    }
}
