//! Spec-level wire types for IPK24-CHAT: the `Message` sum type, the closed
//! `MessageKind` enumeration, the client identity record, and the string
//! invariants shared by both transports.

mod error;
mod identity;
mod kind;
mod message;

pub use error::ValidationError;
pub use identity::{ChannelId, ClientIdentity, Content, DisplayName, Secret, Username};
pub use kind::MessageKind;
pub use message::Message;
