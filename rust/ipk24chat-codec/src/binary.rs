//! Binary framing for the datagram transport. First byte is the type code,
//! next two bytes are `msgId` big-endian, then zero or more NUL-terminated
//! strings and fixed-width fields per §4.1's type-code table.

use ipk24chat_wire::{ChannelId, Content, DisplayName, Message, MessageKind, Secret, Username};

use crate::error::{DecodeError, EncodeError};

const TYPE_CONFIRM: u8 = 0x00;
const TYPE_REPLY: u8 = 0x01;
const TYPE_AUTH: u8 = 0x02;
const TYPE_JOIN: u8 = 0x03;
const TYPE_MSG: u8 = 0x04;
const TYPE_PING: u8 = 0xFD;
const TYPE_ERR: u8 = 0xFE;
const TYPE_BYE: u8 = 0xFF;

fn push_cstring(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
}

/// Builds a CONFIRM datagram directly, without going through `Message`/
/// `encode`. The reliability engine sends these on every inbound datagram
/// it answers, and a CONFIRM is always representable, so this has no
/// failure case to propagate.
pub fn encode_confirm(ref_msg_id: u16) -> Vec<u8> {
    let mut buf = Vec::with_capacity(3);
    buf.push(TYPE_CONFIRM);
    buf.extend_from_slice(&ref_msg_id.to_be_bytes());
    buf
}

/// Encodes a `Message` into one datagram. Every `Message` variant is
/// representable on the datagram transport.
pub fn encode(message: &Message) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::new();
    match message {
        Message::Confirm { ref_msg_id } => {
            buf.push(TYPE_CONFIRM);
            buf.extend_from_slice(&ref_msg_id.to_be_bytes());
        }
        Message::Reply {
            msg_id,
            ok,
            ref_msg_id,
            content,
        } => {
            buf.push(TYPE_REPLY);
            buf.extend_from_slice(&msg_id.to_be_bytes());
            buf.push(if *ok { 1 } else { 0 });
            buf.extend_from_slice(&ref_msg_id.to_be_bytes());
            push_cstring(&mut buf, content.as_str());
        }
        Message::Auth {
            msg_id,
            username,
            display_name,
            secret,
        } => {
            buf.push(TYPE_AUTH);
            buf.extend_from_slice(&msg_id.to_be_bytes());
            push_cstring(&mut buf, username.as_str());
            push_cstring(&mut buf, display_name.as_str());
            push_cstring(&mut buf, secret.as_str());
        }
        Message::Join {
            msg_id,
            channel_id,
            display_name,
        } => {
            buf.push(TYPE_JOIN);
            buf.extend_from_slice(&msg_id.to_be_bytes());
            push_cstring(&mut buf, channel_id.as_str());
            push_cstring(&mut buf, display_name.as_str());
        }
        Message::Msg {
            msg_id,
            display_name,
            content,
        } => {
            buf.push(TYPE_MSG);
            buf.extend_from_slice(&msg_id.to_be_bytes());
            push_cstring(&mut buf, display_name.as_str());
            push_cstring(&mut buf, content.as_str());
        }
        Message::Ping { msg_id } => {
            buf.push(TYPE_PING);
            buf.extend_from_slice(&msg_id.to_be_bytes());
        }
        Message::Err {
            msg_id,
            display_name,
            content,
        } => {
            buf.push(TYPE_ERR);
            buf.extend_from_slice(&msg_id.to_be_bytes());
            push_cstring(&mut buf, display_name.as_str());
            push_cstring(&mut buf, content.as_str());
        }
        Message::Bye { msg_id, display_name } => {
            buf.push(TYPE_BYE);
            buf.extend_from_slice(&msg_id.to_be_bytes());
            push_cstring(&mut buf, display_name.as_str());
        }
        Message::Unknown => return Err(EncodeError { kind: MessageKind::Unknown }),
    }
    Ok(buf)
}

/// Takes a NUL-terminated string off the front of `buf`. Fails if there is
/// no terminating NUL before the end of the slice.
fn take_cstring(buf: &[u8]) -> Result<(String, &[u8]), DecodeError> {
    let nul_pos = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or(DecodeError::MissingNulTerminator)?;
    let s = String::from_utf8(buf[..nul_pos].to_vec()).map_err(|_| DecodeError::InvalidUtf8)?;
    Ok((s, &buf[nul_pos + 1..]))
}

/// Decodes one datagram. Malformed input (too short, unknown type code,
/// missing NUL terminator, trailing bytes) is reported as an error rather
/// than degraded to `Message::Unknown` — §4.1 requires the caller to emit
/// an ERR and terminate on a malformed frame, which requires distinguishing
/// it from a well-formed-but-unrecognized one (the datagram grammar has no
/// such case: every type code is either known or malformed).
pub fn decode(buf: &[u8]) -> Result<Message, DecodeError> {
    if buf.len() < 3 {
        return Err(DecodeError::TooShort);
    }
    let type_code = buf[0];
    let msg_id = u16::from_be_bytes([buf[1], buf[2]]);
    let rest = &buf[3..];

    match type_code {
        TYPE_CONFIRM => {
            require_empty(rest)?;
            Ok(Message::Confirm { ref_msg_id: msg_id })
        }
        TYPE_PING => {
            require_empty(rest)?;
            Ok(Message::Ping { msg_id })
        }
        TYPE_REPLY => {
            if rest.len() < 3 {
                return Err(DecodeError::TooShort);
            }
            let ok = rest[0] != 0;
            let ref_msg_id = u16::from_be_bytes([rest[1], rest[2]]);
            let (content, rest) = take_cstring(&rest[3..])?;
            require_empty(rest)?;
            Ok(Message::Reply {
                msg_id,
                ok,
                ref_msg_id,
                content: Content::try_from(content)?,
            })
        }
        TYPE_AUTH => {
            let (username, rest) = take_cstring(rest)?;
            let (display_name, rest) = take_cstring(rest)?;
            let (secret, rest) = take_cstring(rest)?;
            require_empty(rest)?;
            Ok(Message::Auth {
                msg_id,
                username: Username::try_from(username)?,
                display_name: DisplayName::try_from(display_name)?,
                secret: Secret::try_from(secret)?,
            })
        }
        TYPE_JOIN => {
            let (channel_id, rest) = take_cstring(rest)?;
            let (display_name, rest) = take_cstring(rest)?;
            require_empty(rest)?;
            Ok(Message::Join {
                msg_id,
                channel_id: ChannelId::try_from(channel_id)?,
                display_name: DisplayName::try_from(display_name)?,
            })
        }
        TYPE_MSG => {
            let (display_name, rest) = take_cstring(rest)?;
            let (content, rest) = take_cstring(rest)?;
            require_empty(rest)?;
            Ok(Message::Msg {
                msg_id,
                display_name: DisplayName::try_from(display_name)?,
                content: Content::try_from(content)?,
            })
        }
        TYPE_ERR => {
            let (display_name, rest) = take_cstring(rest)?;
            let (content, rest) = take_cstring(rest)?;
            require_empty(rest)?;
            Ok(Message::Err {
                msg_id,
                display_name: DisplayName::try_from(display_name)?,
                content: Content::try_from(content)?,
            })
        }
        TYPE_BYE => {
            let (display_name, rest) = take_cstring(rest)?;
            require_empty(rest)?;
            Ok(Message::Bye {
                msg_id,
                display_name: DisplayName::try_from(display_name)?,
            })
        }
        other => Err(DecodeError::UnknownTypeCode(other)),
    }
}

fn require_empty(rest: &[u8]) -> Result<(), DecodeError> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(DecodeError::TrailingBytes)
    }
}
