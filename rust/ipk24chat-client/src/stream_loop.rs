//! Event loop for the stream (TCP) transport variant. No reliability
//! engine here — TCP is reliable at the transport layer, so this loop is
//! the FSM, the command parser, and the text codec wired directly to a
//! `StreamTransport`.

use std::time::Duration;

use ipk24chat_codec::stream as codec;
use ipk24chat_command::{self as command, ParseOutcome, UserCommand};
use ipk24chat_fsm::{Fsm, Transition};
use ipk24chat_transport::{StreamTransport, Transport, TransportError};
use ipk24chat_wire::{ClientIdentity, Message, MessageKind};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite};
use tracing::debug;

use crate::error::ClientError;
use crate::render;

/// Wall-clock budget for a REPLY after AUTH/JOIN. The distilled spec fixes
/// this as a datagram-only tunable (`ipk24chat-reliability::ReliabilityConfig`);
/// the stream variant has no CLI flag for it, so it is a fixed constant
/// matching that crate's own default.
const REPLY_TIMEOUT: Duration = Duration::from_millis(5000);

enum Flow {
    Continue,
    End,
}

impl Flow {
    fn is_end(&self) -> bool {
        matches!(self, Flow::End)
    }
}

/// Runs the client until it reaches `FsmState::End`. `Ok(())` covers every
/// orderly exit (user EOF/interrupt, server BYE, server ERR); `Err`
/// indicates a protocol violation, a malformed frame, a reply timeout, or a
/// transport failure, which the binary maps to a non-zero exit code.
pub async fn run<S, R>(mut transport: StreamTransport<S>, input: R) -> Result<(), ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    R: AsyncBufRead + Unpin,
{
    let mut identity = ClientIdentity::placeholder();
    let mut fsm = Fsm::new();
    let mut lines = input.lines();

    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupt received, sending BYE");
                send_bye(&mut transport, &identity).await;
                return Ok(());
            }
            frame = transport.recv_frame() => {
                match frame? {
                    Some(bytes) => {
                        if handle_frame(&bytes, &mut transport, &mut identity, &mut fsm).await?.is_end() {
                            return Ok(());
                        }
                    }
                    None => {
                        debug!("server closed the connection without a BYE");
                        return Err(ClientError::DisconnectedWithoutBye);
                    }
                }
            }
            line = lines.next_line() => {
                match line.map_err(|e| ClientError::Transport(TransportError::Io(e)))? {
                    Some(line) => {
                        if handle_line(&line, &mut transport, &mut identity, &mut fsm).await?.is_end() {
                            return Ok(());
                        }
                    }
                    None => {
                        debug!("stdin EOF, sending BYE");
                        send_bye(&mut transport, &identity).await;
                        return Ok(());
                    }
                }
            }
        }
    }
}

async fn handle_line<S>(
    line: &str,
    transport: &mut StreamTransport<S>,
    identity: &mut ClientIdentity,
    fsm: &mut Fsm,
) -> Result<Flow, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    match command::parse(line) {
        ParseOutcome::Empty => Ok(Flow::Continue),
        ParseOutcome::HelpRequested => {
            render::help();
            Ok(Flow::Continue)
        }
        ParseOutcome::Error(e) => {
            render::user_error(&e.to_string());
            Ok(Flow::Continue)
        }
        ParseOutcome::Command(UserCommand::Rename { display_name }) => {
            identity.rename(display_name);
            Ok(Flow::Continue)
        }
        ParseOutcome::Command(UserCommand::Auth {
            username,
            secret,
            display_name,
        }) => {
            if !fsm.can_send(MessageKind::Auth) {
                render::user_error("cannot /auth in the current state");
                return Ok(Flow::Continue);
            }
            identity.authenticate(username.clone(), secret.clone(), display_name.clone());
            let message = Message::Auth {
                msg_id: 0,
                username,
                display_name: identity.display_name.clone(),
                secret,
            };
            fsm.on_send(MessageKind::Auth)?;
            send_frame(transport, &message).await?;
            await_reply(transport, identity, fsm).await
        }
        ParseOutcome::Command(UserCommand::Join { channel_id }) => {
            if !fsm.can_send(MessageKind::Join) {
                render::user_error("cannot /join in the current state");
                return Ok(Flow::Continue);
            }
            identity.join(channel_id.clone());
            let message = Message::Join {
                msg_id: 0,
                channel_id,
                display_name: identity.display_name.clone(),
            };
            fsm.on_send(MessageKind::Join)?;
            send_frame(transport, &message).await?;
            await_reply(transport, identity, fsm).await
        }
        ParseOutcome::Command(UserCommand::Message { content }) => {
            if !fsm.can_send(MessageKind::Msg) {
                render::user_error("cannot send a message in the current state");
                return Ok(Flow::Continue);
            }
            let message = Message::Msg {
                msg_id: 0,
                display_name: identity.display_name.clone(),
                content,
            };
            fsm.on_send(MessageKind::Msg)?;
            send_frame(transport, &message).await?;
            Ok(Flow::Continue)
        }
    }
}

/// The inner bounded wait §4.5 describes for AUTH/JOIN: other incoming
/// messages are still processed, but no new terminal lines are consumed
/// until a matching REPLY arrives or the budget is exhausted.
async fn await_reply<S>(
    transport: &mut StreamTransport<S>,
    identity: &mut ClientIdentity,
    fsm: &mut Fsm,
) -> Result<Flow, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let deadline = tokio::time::Instant::now() + REPLY_TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            protocol_violation(transport, identity, &"timed out waiting for a REPLY").await;
            return Err(ClientError::ReplyTimedOut);
        }
        let frame = match tokio::time::timeout(remaining, transport.recv_frame()).await {
            Ok(result) => result?,
            Err(_elapsed) => {
                protocol_violation(transport, identity, &"timed out waiting for a REPLY").await;
                return Err(ClientError::ReplyTimedOut);
            }
        };
        let Some(bytes) = frame else {
            return Err(ClientError::DisconnectedWithoutBye);
        };
        match handle_frame(&bytes, transport, identity, fsm).await? {
            Flow::End => return Ok(Flow::End),
            Flow::Continue => {
                // A REPLY ends the wait; anything else (MSG) loops back to
                // keep waiting within the same deadline.
                if matches!(codec::decode(&String::from_utf8_lossy(&bytes)), Message::Reply { .. }) {
                    return Ok(Flow::Continue);
                }
            }
        }
    }
}

async fn handle_frame<S>(
    bytes: &[u8],
    transport: &mut StreamTransport<S>,
    identity: &mut ClientIdentity,
    fsm: &mut Fsm,
) -> Result<Flow, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let message = codec::decode(&String::from_utf8_lossy(bytes));
    let kind = message.kind();
    let ok = match &message {
        Message::Reply { ok, .. } => Some(*ok),
        _ => None,
    };

    match fsm.on_receive(kind, ok) {
        Ok(Transition::Terminated) => {
            note_termination(&message);
            Ok(Flow::End)
        }
        Ok(_) => {
            match message {
                Message::Msg {
                    display_name,
                    content,
                    ..
                } => render::incoming_message(&display_name, &content),
                Message::Reply { ok, content, .. } => render::reply(ok, &content),
                _ => {}
            }
            Ok(Flow::Continue)
        }
        Err(violation) => {
            protocol_violation(transport, identity, &violation).await;
            Err(violation.into())
        }
    }
}

fn note_termination(message: &Message) {
    if let Message::Err {
        display_name,
        content,
        ..
    } = message
    {
        render::incoming_error(display_name, content);
    }
    // BYE has no rendered line shape (§6); nothing further to show.
}

async fn send_frame<S>(transport: &mut StreamTransport<S>, message: &Message) -> Result<(), ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let frame = codec::encode(message).map_err(ClientError::Unrepresentable)?;
    transport.send_frame(frame.as_bytes()).await?;
    Ok(())
}

async fn send_bye<S>(transport: &mut StreamTransport<S>, identity: &ClientIdentity)
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let bye = Message::Bye {
        msg_id: 0,
        display_name: identity.display_name.clone(),
    };
    if let Ok(frame) = codec::encode(&bye) {
        let _ = transport.send_frame(frame.as_bytes()).await;
    }
}

async fn protocol_violation<S>(
    transport: &mut StreamTransport<S>,
    identity: &ClientIdentity,
    reason: &dyn std::fmt::Display,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let err = Message::Err {
        msg_id: 0,
        display_name: identity.display_name.clone(),
        content: crate::safe_content(reason),
    };
    if let Ok(frame) = codec::encode(&err) {
        let _ = transport.send_frame(frame.as_bytes()).await;
    }
    send_bye(transport, identity).await;
}
