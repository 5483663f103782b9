//! Text framing for the stream transport: every frame ends in CR LF,
//! keywords are matched case-insensitively, and `content` is the remainder
//! of the frame. Callers pass in one line with the trailing CR LF already
//! stripped by the line accumulator (§4.6) and append it back on send.

use ipk24chat_wire::{ChannelId, Content, DisplayName, Message, MessageKind, Secret, Username};

use crate::error::EncodeError;

/// Splits off the next whitespace-delimited token, tolerating any run of
/// separating whitespace (the grammar's literal single space, relaxed the
/// way the reference parser's `\s+` regexes do).
fn split_token(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(idx) => (&s[..idx], s[idx..].trim_start()),
        None => (s, ""),
    }
}

fn eat_keyword<'a>(s: &'a str, keyword: &str) -> Option<&'a str> {
    let (token, rest) = split_token(s);
    if token.eq_ignore_ascii_case(keyword) {
        Some(rest)
    } else {
        None
    }
}

/// Decodes one CRLF-stripped line. A line that does not match any grammar
/// becomes `Message::Unknown`, per §4.1 ("Any frame not matching produces
/// `UNKNOWN`").
pub fn decode(line: &str) -> Message {
    try_decode(line).unwrap_or(Message::Unknown)
}

fn try_decode(line: &str) -> Option<Message> {
    let (keyword, rest) = split_token(line);
    if keyword.eq_ignore_ascii_case("AUTH") {
        let (username, rest) = split_token(rest);
        let rest = eat_keyword(rest, "AS")?;
        let (display_name, rest) = split_token(rest);
        let secret = eat_keyword(rest, "USING")?;
        return Some(Message::Auth {
            msg_id: 0,
            username: Username::try_from(username).ok()?,
            display_name: DisplayName::try_from(display_name).ok()?,
            secret: Secret::try_from(secret).ok()?,
        });
    }
    if keyword.eq_ignore_ascii_case("JOIN") {
        let (channel_id, rest) = split_token(rest);
        let rest = eat_keyword(rest, "AS")?;
        let (display_name, rest) = split_token(rest);
        if !rest.is_empty() {
            return None;
        }
        return Some(Message::Join {
            msg_id: 0,
            channel_id: ChannelId::try_from(channel_id).ok()?,
            display_name: DisplayName::try_from(display_name).ok()?,
        });
    }
    if keyword.eq_ignore_ascii_case("MSG") {
        let rest = eat_keyword(rest, "FROM")?;
        let (display_name, rest) = split_token(rest);
        let content = eat_keyword(rest, "IS")?;
        return Some(Message::Msg {
            msg_id: 0,
            display_name: DisplayName::try_from(display_name).ok()?,
            content: Content::try_from(content).ok()?,
        });
    }
    if keyword.eq_ignore_ascii_case("ERR") {
        let rest = eat_keyword(rest, "FROM")?;
        let (display_name, rest) = split_token(rest);
        let content = eat_keyword(rest, "IS")?;
        return Some(Message::Err {
            msg_id: 0,
            display_name: DisplayName::try_from(display_name).ok()?,
            content: Content::try_from(content).ok()?,
        });
    }
    if keyword.eq_ignore_ascii_case("REPLY") {
        let (result, rest) = split_token(rest);
        let ok = if result.eq_ignore_ascii_case("OK") {
            true
        } else if result.eq_ignore_ascii_case("NOK") {
            false
        } else {
            return None;
        };
        let content = eat_keyword(rest, "IS")?;
        return Some(Message::Reply {
            msg_id: 0,
            ok,
            ref_msg_id: 0,
            content: Content::try_from(content).ok()?,
        });
    }
    if keyword.eq_ignore_ascii_case("BYE") {
        let rest = eat_keyword(rest, "FROM")?;
        let (display_name, rest) = split_token(rest);
        if !rest.is_empty() {
            return None;
        }
        return Some(Message::Bye {
            msg_id: 0,
            display_name: DisplayName::try_from(display_name).ok()?,
        });
    }
    None
}

/// Encodes a `Message` into one CRLF-terminated text frame. `Confirm`,
/// `Ping` and `Unknown` have no stream representation.
pub fn encode(message: &Message) -> Result<String, EncodeError> {
    let body = match message {
        Message::Auth {
            username,
            display_name,
            secret,
            ..
        } => format!("AUTH {username} AS {display_name} USING {secret}"),
        Message::Join {
            channel_id,
            display_name,
            ..
        } => format!("JOIN {channel_id} AS {display_name}"),
        Message::Msg {
            display_name,
            content,
            ..
        } => format!("MSG FROM {display_name} IS {content}"),
        Message::Err {
            display_name,
            content,
            ..
        } => format!("ERR FROM {display_name} IS {content}"),
        Message::Bye { display_name, .. } => format!("BYE FROM {display_name}"),
        Message::Reply { ok, content, .. } => {
            format!("REPLY {} IS {content}", if *ok { "OK" } else { "NOK" })
        }
        Message::Confirm { .. } | Message::Ping { .. } | Message::Unknown => {
            return Err(EncodeError { kind: message.kind() });
        }
    };
    Ok(format!("{body}\r\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> Message {
        Message::Auth {
            msg_id: 0,
            username: Username::try_from("alice").unwrap(),
            display_name: DisplayName::try_from("Al").unwrap(),
            secret: Secret::try_from("s3cr3t").unwrap(),
        }
    }

    #[test]
    fn auth_round_trips() {
        let encoded = encode(&auth()).unwrap();
        assert_eq!(encoded, "AUTH alice AS Al USING s3cr3t\r\n");
        let decoded = decode(encoded.trim_end_matches("\r\n"));
        assert_eq!(decoded, auth());
    }

    #[test]
    fn join_round_trips() {
        let m = Message::Join {
            msg_id: 0,
            channel_id: ChannelId::try_from("lobby").unwrap(),
            display_name: DisplayName::try_from("Al").unwrap(),
        };
        let encoded = encode(&m).unwrap();
        assert_eq!(encoded, "JOIN lobby AS Al\r\n");
        assert_eq!(decode(encoded.trim_end_matches("\r\n")), m);
    }

    #[test]
    fn msg_round_trips_with_spaces_in_content() {
        let m = Message::Msg {
            msg_id: 0,
            display_name: DisplayName::try_from("Al").unwrap(),
            content: Content::try_from("hi   there").unwrap(),
        };
        let encoded = encode(&m).unwrap();
        assert_eq!(encoded, "MSG FROM Al IS hi   there\r\n");
        assert_eq!(decode(encoded.trim_end_matches("\r\n")), m);
    }

    #[test]
    fn reply_ok_and_nok_round_trip() {
        let ok = Message::Reply {
            msg_id: 0,
            ok: true,
            ref_msg_id: 0,
            content: Content::try_from("welcome").unwrap(),
        };
        assert_eq!(encode(&ok).unwrap(), "REPLY OK IS welcome\r\n");
        assert_eq!(decode("REPLY OK IS welcome"), ok);

        let nok = Message::Reply {
            msg_id: 0,
            ok: false,
            ref_msg_id: 0,
            content: Content::try_from("bad secret").unwrap(),
        };
        assert_eq!(encode(&nok).unwrap(), "REPLY NOK IS bad secret\r\n");
        assert_eq!(decode("REPLY NOK IS bad secret"), nok);
    }

    #[test]
    fn bye_round_trips() {
        let m = Message::Bye {
            msg_id: 0,
            display_name: DisplayName::try_from("Al").unwrap(),
        };
        assert_eq!(encode(&m).unwrap(), "BYE FROM Al\r\n");
        assert_eq!(decode("BYE FROM Al"), m);
    }

    #[test]
    fn keyword_matching_is_case_insensitive() {
        assert_eq!(
            decode("auth alice as Al using s3cr3t"),
            Message::Auth {
                msg_id: 0,
                username: Username::try_from("alice").unwrap(),
                display_name: DisplayName::try_from("Al").unwrap(),
                secret: Secret::try_from("s3cr3t").unwrap(),
            }
        );
    }

    #[test]
    fn non_matching_line_decodes_to_unknown() {
        assert_eq!(decode("hello there"), Message::Unknown);
        assert_eq!(decode("AUTH alice AS Al"), Message::Unknown);
    }

    #[test]
    fn confirm_and_ping_are_not_encodable_on_stream() {
        assert!(encode(&Message::Confirm { ref_msg_id: 1 }).is_err());
        assert!(encode(&Message::Ping { msg_id: 1 }).is_err());
    }
}
