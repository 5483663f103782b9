//! Event loop for the datagram (UDP) transport variant. All reliability
//! concerns (identifiers, retransmission, dedup, port rebind, keepalive)
//! are delegated to `ipk24chat_reliability::ReliabilityEngine`; this module
//! is the FSM and command parser wired to that engine.

use ipk24chat_command::{self as command, ParseOutcome, UserCommand};
use ipk24chat_fsm::Fsm;
use ipk24chat_reliability::{Inbound, ReliabilityEngine, ReliabilityError};
use ipk24chat_transport::{DatagramTransport, TransportError};
use ipk24chat_wire::{ClientIdentity, Message, MessageKind};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::error::ClientError;
use crate::render;

type Engine = ReliabilityEngine<DatagramTransport>;

/// Runs the client until it reaches `FsmState::End`. Same exit-code
/// contract as `stream_loop::run`.
pub async fn run<R>(mut engine: Engine, input: R) -> Result<(), ClientError>
where
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
                let bye = engine.stamp(bye_message(&identity));
                engine.send_best_effort(&bye).await;
                return Ok(());
            }
            polled = engine.poll() => {
                match polled {
                    Ok(events) => {
                        if apply_events(&mut engine, &identity, &mut fsm, events).await? {
                            return Ok(());
                        }
                    }
                    Err(e) => return Err(handle_reliability_failure(&mut engine, &identity, e).await),
                }
            }
            line = lines.next_line() => {
                match line.map_err(|e| ClientError::Transport(TransportError::Io(e)))? {
                    Some(line) => {
                        if handle_line(&line, &mut engine, &mut identity, &mut fsm).await? {
                            return Ok(());
                        }
                    }
                    None => {
                        debug!("stdin EOF, sending BYE");
                        let bye = engine.stamp(bye_message(&identity));
                        engine.send_best_effort(&bye).await;
                        return Ok(());
                    }
                }
            }
        }
    }
}

fn bye_message(identity: &ClientIdentity) -> Message {
    Message::Bye {
        msg_id: 0,
        display_name: identity.display_name.clone(),
    }
}

/// Returns `true` once the session should end.
async fn handle_line(
    line: &str,
    engine: &mut Engine,
    identity: &mut ClientIdentity,
    fsm: &mut Fsm,
) -> Result<bool, ClientError> {
    match command::parse(line) {
        ParseOutcome::Empty => Ok(false),
        ParseOutcome::HelpRequested => {
            render::help();
            Ok(false)
        }
        ParseOutcome::Error(e) => {
            render::user_error(&e.to_string());
            Ok(false)
        }
        ParseOutcome::Command(UserCommand::Rename { display_name }) => {
            identity.rename(display_name);
            Ok(false)
        }
        ParseOutcome::Command(UserCommand::Auth {
            username,
            secret,
            display_name,
        }) => {
            if !fsm.can_send(MessageKind::Auth) {
                render::user_error("cannot /auth in the current state");
                return Ok(false);
            }
            identity.authenticate(username.clone(), secret.clone(), display_name.clone());
            let message = engine.stamp(Message::Auth {
                msg_id: 0,
                username,
                display_name: identity.display_name.clone(),
                secret,
            });
            fsm.on_send(MessageKind::Auth)?;
            await_reply(engine, identity, fsm, &message).await
        }
        ParseOutcome::Command(UserCommand::Join { channel_id }) => {
            if !fsm.can_send(MessageKind::Join) {
                render::user_error("cannot /join in the current state");
                return Ok(false);
            }
            identity.join(channel_id.clone());
            let message = engine.stamp(Message::Join {
                msg_id: 0,
                channel_id,
                display_name: identity.display_name.clone(),
            });
            fsm.on_send(MessageKind::Join)?;
            await_reply(engine, identity, fsm, &message).await
        }
        ParseOutcome::Command(UserCommand::Message { content }) => {
            if !fsm.can_send(MessageKind::Msg) {
                render::user_error("cannot send a message in the current state");
                return Ok(false);
            }
            let message = engine.stamp(Message::Msg {
                msg_id: 0,
                display_name: identity.display_name.clone(),
                content,
            });
            fsm.on_send(MessageKind::Msg)?;
            match engine.send_confirmed(&message).await {
                Ok(events) => apply_events(engine, identity, fsm, events).await,
                Err(e) => Err(handle_reliability_failure(engine, identity, e).await),
            }
        }
    }
}

async fn await_reply(
    engine: &mut Engine,
    identity: &mut ClientIdentity,
    fsm: &mut Fsm,
    message: &Message,
) -> Result<bool, ClientError> {
    match engine.send_and_await_reply(message).await {
        Ok((events, reply)) => {
            if apply_events(engine, identity, fsm, events).await? {
                return Ok(true);
            }
            match reply {
                Some(Message::Reply { ok, content, .. }) => match fsm.on_receive(MessageKind::Reply, Some(ok)) {
                    Ok(_) => {
                        render::reply(ok, &content);
                        Ok(false)
                    }
                    Err(violation) => {
                        protocol_violation(engine, identity, &violation).await;
                        Err(violation.into())
                    }
                },
                _ => Ok(false),
            }
        }
        Err(e) => Err(handle_reliability_failure(engine, identity, e).await),
    }
}

/// Applies the inbound side effects a send/poll call observed: renders MSGs
/// (after an FSM check) and handles a server-initiated ERR/BYE. Returns
/// `true` once the session should end.
async fn apply_events(
    engine: &mut Engine,
    identity: &ClientIdentity,
    fsm: &mut Fsm,
    events: Vec<Inbound>,
) -> Result<bool, ClientError> {
    for event in events {
        match event {
            Inbound::Message { display_name, content } => match fsm.on_receive(MessageKind::Msg, None) {
                Ok(_) => render::incoming_message(&display_name, &content),
                Err(violation) => {
                    protocol_violation(engine, identity, &violation).await;
                    return Err(violation.into());
                }
            },
            Inbound::Terminated(message) => {
                // ERR/BYE is legal from any state and always terminates;
                // `on_receive` cannot fail for these kinds (§4.3).
                let _ = fsm.on_receive(message.kind(), None);
                if let Message::Err {
                    display_name,
                    content,
                    ..
                } = &message
                {
                    render::incoming_error(display_name, content);
                }
                engine.linger().await;
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Maps a reliability-layer failure to the matching §7 recovery action
/// (best-effort BYE on an exhausted budget/timeout, ERR+BYE on a malformed
/// frame or unexpected message kind) and returns the `ClientError` to
/// propagate for the non-zero exit.
async fn handle_reliability_failure(
    engine: &mut Engine,
    identity: &ClientIdentity,
    error: ReliabilityError,
) -> ClientError {
    match &error {
        ReliabilityError::RetransmissionBudgetExhausted | ReliabilityError::ReplyTimedOut => {
            let bye = engine.stamp(bye_message(identity));
            engine.send_best_effort(&bye).await;
        }
        ReliabilityError::Malformed(_) | ReliabilityError::UnexpectedMessage(_) => {
            protocol_violation(engine, identity, &error).await;
        }
        ReliabilityError::Transport(_) | ReliabilityError::Unrepresentable(_) => {}
    }
    ClientError::Reliability(error)
}

async fn protocol_violation(engine: &mut Engine, identity: &ClientIdentity, reason: &dyn std::fmt::Display) {
    let err = engine.stamp(Message::Err {
        msg_id: 0,
        display_name: identity.display_name.clone(),
        content: crate::safe_content(reason),
    });
    engine.send_best_effort(&err).await;
    let bye = engine.stamp(bye_message(identity));
    engine.send_best_effort(&bye).await;
}
