//! Datagram reliability layer (§4.4): identifier assignment, confirmation
//! tracking, bounded retransmission, server-id duplicate suppression, and
//! the reply-waiting budget for AUTH/JOIN. Only the datagram transport uses
//! this crate — the stream transport is reliable at the TCP layer and has
//! no CONFIRM/PING frames to answer.

mod error;

pub use error::ReliabilityError;

use std::collections::HashSet;
use std::time::Duration;

use ipk24chat_codec::datagram;
use ipk24chat_codec::DecodeError;
use ipk24chat_wire::{Content, DisplayName, Message};
use ipk24chat_transport::Transport;
use tracing::{debug, trace, warn};

/// Tunables from the `-d`/`-r` CLI flags, plus the two budgets (reply
/// wait, post-termination linger) the distilled spec fixes as defaults
/// rather than exposing on the command line.
#[derive(Debug, Clone, Copy)]
pub struct ReliabilityConfig {
    /// `T`: per-attempt wait for a CONFIRM before resending.
    pub confirm_timeout: Duration,
    /// `R`: total send attempts (the first send plus `R - 1` resends) before
    /// the engine gives up on a CONFIRM.
    pub max_retransmissions: u8,
    /// Wall-clock budget for a REPLY to arrive after AUTH/JOIN is confirmed.
    pub reply_timeout: Duration,
    /// How long to keep answering duplicate ERR/BYE retransmits with a
    /// CONFIRM after deciding to terminate, per the Open Question resolved
    /// in §9 ("the latter is the safer choice").
    pub linger: Duration,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        ReliabilityConfig {
            confirm_timeout: Duration::from_millis(250),
            max_retransmissions: 3,
            reply_timeout: Duration::from_millis(5000),
            linger: Duration::from_millis(500),
        }
    }
}

/// A side effect of waiting for a CONFIRM or a REPLY: a MSG to render, or a
/// server-initiated ERR/BYE that the caller must act on (render/note, then
/// shut down).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Message { display_name: DisplayName, content: Content },
    /// `Message::Err` or `Message::Bye`, already CONFIRMed.
    Terminated(Message),
}

/// The outcome of one inbound datagram, before the send/reply-wait loops
/// decide what it means for *them*. Every non-CONFIRM datagram is CONFIRMed
/// as a side effect of producing this value (§4.4's "inbound confirmation
/// policy" — promptness before any further outbound datagram).
enum Triage {
    Confirm { ref_msg_id: u16 },
    Reply(Message),
    /// MSG or PING: fully handled here (CONFIRMed, rendered/deduped or
    /// dropped). Nothing further for a caller to do.
    Handled,
    Terminated(Message),
}

/// Owns the one UDP socket (via `transport`) for the session and all
/// reliability bookkeeping. Not `Clone`/`Send` across tasks — the event
/// loop drives it from a single task, per §5.
pub struct ReliabilityEngine<T: Transport> {
    transport: T,
    config: ReliabilityConfig,
    next_outgoing_id: u16,
    seen_server_ids: HashSet<u16>,
}

impl<T: Transport> ReliabilityEngine<T> {
    pub fn new(transport: T, config: ReliabilityConfig) -> Self {
        ReliabilityEngine {
            transport,
            config,
            next_outgoing_id: 0,
            seen_server_ids: HashSet::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Stamps `message` with the next outgoing identifier and advances the
    /// counter. A fresh session always starts from 0; wrap-around is not
    /// expected within a session (§3).
    pub fn stamp(&mut self, message: Message) -> Message {
        let id = self.next_outgoing_id;
        self.next_outgoing_id = self.next_outgoing_id.wrapping_add(1);
        message.with_msg_id(id)
    }

    async fn send_confirm(&mut self, ref_msg_id: u16) -> Result<(), ReliabilityError> {
        let bytes = datagram::encode_confirm(ref_msg_id);
        self.transport.send_frame(&bytes).await?;
        Ok(())
    }

    /// Receives and classifies exactly one datagram, answering it with a
    /// CONFIRM if it isn't one itself. MSG is rendered (pushed to `events`)
    /// unless its `msg_id` has already been seen (§4.4 duplicate
    /// suppression, set-based per the resolved Open Question); PING is
    /// dropped after confirming.
    async fn recv_and_triage(&mut self, events: &mut Vec<Inbound>) -> Result<Triage, ReliabilityError> {
        let frame = self.transport.recv_frame().await?.ok_or_else(|| {
            ReliabilityError::Transport(ipk24chat_transport::TransportError::TruncatedFrame)
        })?;
        let msg = datagram::decode(&frame).map_err(ReliabilityError::Malformed)?;

        match msg {
            Message::Confirm { ref_msg_id } => Ok(Triage::Confirm { ref_msg_id }),
            Message::Ping { msg_id } => {
                trace!(msg_id, "confirming PING");
                self.send_confirm(msg_id).await?;
                Ok(Triage::Handled)
            }
            Message::Msg {
                msg_id,
                ref display_name,
                ref content,
            } => {
                self.send_confirm(msg_id).await?;
                if self.seen_server_ids.insert(msg_id) {
                    events.push(Inbound::Message {
                        display_name: display_name.clone(),
                        content: content.clone(),
                    });
                } else {
                    debug!(msg_id, "dropping duplicate MSG");
                }
                Ok(Triage::Handled)
            }
            Message::Reply { msg_id, .. } => {
                self.send_confirm(msg_id).await?;
                Ok(Triage::Reply(msg))
            }
            Message::Err { msg_id, .. } | Message::Bye { msg_id, .. } => {
                warn!(msg_id, kind = %msg.kind(), "server terminated the session");
                self.send_confirm(msg_id).await?;
                Ok(Triage::Terminated(msg))
            }
            Message::Auth { msg_id, .. } | Message::Join { msg_id, .. } => {
                // Structurally decodable but never legitimately server-
                // originated; still CONFIRM it so the server's own
                // reliability layer doesn't spin, then surface the
                // violation to the caller.
                self.send_confirm(msg_id).await?;
                Err(ReliabilityError::UnexpectedMessage(msg.kind()))
            }
            Message::Unknown => {
                unreachable!("the datagram codec never decodes to Message::Unknown")
            }
        }
    }

    /// Sends `message` (already stamped) and retransmits identical bytes
    /// until a matching CONFIRM arrives or the retransmission budget (`R`
    /// attempts total) is exhausted. Unrelated inbound traffic observed
    /// while waiting is handled inline and reported back via `events`; a
    /// server ERR/BYE observed during the wait stops retransmission early.
    pub async fn send_confirmed(&mut self, message: &Message) -> Result<Vec<Inbound>, ReliabilityError> {
        let bytes = datagram::encode(message).map_err(ReliabilityError::Unrepresentable)?;
        let msg_id = message.msg_id();
        let mut events = Vec::new();

        self.transport.send_frame(&bytes).await?;
        let mut attempts: u8 = 1;
        loop {
            match tokio::time::timeout(self.config.confirm_timeout, self.recv_and_triage(&mut events)).await {
                Ok(Ok(Triage::Confirm { ref_msg_id })) if ref_msg_id == msg_id => {
                    trace!(msg_id, "CONFIRM received");
                    return Ok(events);
                }
                Ok(Ok(Triage::Confirm { .. } | Triage::Handled | Triage::Reply(_))) => continue,
                Ok(Ok(Triage::Terminated(msg))) => {
                    events.push(Inbound::Terminated(msg));
                    return Ok(events);
                }
                Ok(Err(e)) => return Err(e),
                Err(_elapsed) => {
                    if attempts >= self.config.max_retransmissions {
                        return Err(ReliabilityError::RetransmissionBudgetExhausted);
                    }
                    debug!(msg_id, attempts, "CONFIRM timed out, retransmitting");
                    self.transport.send_frame(&bytes).await?;
                    attempts += 1;
                }
            }
        }
    }

    /// As `send_confirmed`, but for AUTH/JOIN: after the CONFIRM phase
    /// succeeds, also waits up to `reply_timeout` for a REPLY whose
    /// `refMsgId` matches. Unrelated REPLYs (a stale ref) are ignored, not
    /// treated as a timeout reset — the wall-clock deadline is computed
    /// once and re-checked on every wake (§5).
    pub async fn send_and_await_reply(
        &mut self,
        message: &Message,
    ) -> Result<(Vec<Inbound>, Option<Message>), ReliabilityError> {
        let msg_id = message.msg_id();
        let mut events = self.send_confirmed(message).await?;
        if events.iter().any(|e| matches!(e, Inbound::Terminated(_))) {
            return Ok((events, None));
        }

        let deadline = tokio::time::Instant::now() + self.config.reply_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(ReliabilityError::ReplyTimedOut);
            }
            match tokio::time::timeout(remaining, self.recv_and_triage(&mut events)).await {
                Ok(Ok(Triage::Reply(reply))) => {
                    if let Message::Reply { ref_msg_id, .. } = reply {
                        if ref_msg_id == msg_id {
                            return Ok((events, Some(reply)));
                        }
                    }
                    continue;
                }
                Ok(Ok(Triage::Terminated(msg))) => {
                    events.push(Inbound::Terminated(msg));
                    return Ok((events, None));
                }
                Ok(Ok(Triage::Confirm { .. } | Triage::Handled)) => continue,
                Ok(Err(e)) => return Err(e),
                Err(_elapsed) => return Err(ReliabilityError::ReplyTimedOut),
            }
        }
    }

    /// Sends `message` with the normal retransmission policy but swallows
    /// every failure. Used for the best-effort BYE the engine attempts
    /// after its own retransmission budget has already been exhausted, and
    /// for a best-effort BYE on user-initiated termination.
    pub async fn send_best_effort(&mut self, message: &Message) {
        if let Err(e) = self.send_confirmed(message).await {
            debug!(error = %e, "best-effort send did not complete");
        }
    }

    /// After deciding to terminate on a server ERR/BYE, keeps answering any
    /// duplicate retransmits of it with a CONFIRM for up to `linger` so the
    /// server's own reliability layer sees one, then returns. Never
    /// renders anything and never propagates an error — this is pure
    /// cleanup courtesy.
    pub async fn linger(&mut self) {
        let deadline = tokio::time::Instant::now() + self.config.linger;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return;
            }
            let mut scratch = Vec::new();
            match tokio::time::timeout(remaining, self.recv_and_triage(&mut scratch)).await {
                Ok(_) => continue,
                Err(_elapsed) => return,
            }
        }
    }

    /// Blocks for the next unsolicited server message outside of any send
    /// (e.g. while the client is simply idle in OPEN/JOIN waiting on the
    /// next terminal line). Returns the rendered/terminated events observed
    /// for a single inbound datagram; callers loop this themselves.
    pub async fn poll(&mut self) -> Result<Vec<Inbound>, ReliabilityError> {
        let mut events = Vec::new();
        match self.recv_and_triage(&mut events).await? {
            Triage::Terminated(msg) => events.push(Inbound::Terminated(msg)),
            Triage::Confirm { .. } | Triage::Reply(_) | Triage::Handled => {}
        }
        Ok(events)
    }

    pub fn rebind_peer(&mut self, addr: std::net::SocketAddr) {
        self.transport.rebind_peer(addr);
    }

    pub fn peer_addr(&self) -> std::net::SocketAddr {
        self.transport.peer_addr()
    }
}

impl From<DecodeError> for ReliabilityError {
    fn from(e: DecodeError) -> Self {
        ReliabilityError::Malformed(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipk24chat_wire::{ChannelId, DisplayName as Dn, Secret, Username};
    use std::net::{Ipv4Addr, SocketAddr};
    use tokio::net::UdpSocket;

    fn addr() -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, 0))
    }

    async fn bound() -> UdpSocket {
        UdpSocket::bind(addr()).await.unwrap()
    }

    fn auth(msg_id: u16) -> Message {
        Message::Auth {
            msg_id,
            username: Username::try_from("u").unwrap(),
            display_name: Dn::try_from("D").unwrap(),
            secret: Secret::try_from("p").unwrap(),
        }
    }

    #[tokio::test]
    async fn send_confirmed_returns_once_confirm_arrives() {
        let server = bound().await;
        let server_addr = server.local_addr().unwrap();
        let client_socket = bound().await;
        let transport = ipk24chat_transport::DatagramTransport::new(client_socket, server_addr);
        let mut engine = ReliabilityEngine::new(transport, ReliabilityConfig::default());

        let send = tokio::spawn(async move {
            let events = engine.send_confirmed(&auth(0)).await.unwrap();
            assert!(events.is_empty());
            engine
        });

        let mut buf = [0u8; 128];
        let (n, from) = server.recv_from(&mut buf).await.unwrap();
        assert_eq!(buf[0], 0x02);
        let _ = n;
        server
            .send_to(&ipk24chat_codec::datagram::encode_confirm(0), from)
            .await
            .unwrap();

        send.await.unwrap();
    }

    #[tokio::test]
    async fn retransmits_and_exhausts_budget_without_a_confirm() {
        let server = bound().await;
        let server_addr = server.local_addr().unwrap();
        let client_socket = bound().await;
        let transport = ipk24chat_transport::DatagramTransport::new(client_socket, server_addr);
        let mut config = ReliabilityConfig::default();
        config.confirm_timeout = Duration::from_millis(10);
        config.max_retransmissions = 3;
        let mut engine = ReliabilityEngine::new(transport, config);

        let result = engine.send_confirmed(&auth(0)).await;
        assert!(matches!(
            result,
            Err(ReliabilityError::RetransmissionBudgetExhausted)
        ));

        let mut received = 0;
        let mut buf = [0u8; 128];
        loop {
            match tokio::time::timeout(Duration::from_millis(1), server.recv_from(&mut buf)).await {
                Ok(Ok(_)) => received += 1,
                _ => break,
            }
        }
        assert_eq!(received, 3);
    }

    #[tokio::test]
    async fn duplicate_msg_is_confirmed_twice_but_rendered_once() {
        let server = bound().await;
        let server_addr = server.local_addr().unwrap();
        let client_socket = bound().await;
        let transport = ipk24chat_transport::DatagramTransport::new(client_socket, server_addr);
        let mut engine = ReliabilityEngine::new(transport, ReliabilityConfig::default());

        let msg = Message::Msg {
            msg_id: 12,
            display_name: Dn::try_from("Al").unwrap(),
            content: Content::try_from("hi").unwrap(),
        };
        let bytes = ipk24chat_codec::datagram::encode(&msg).unwrap();
        server.send_to(&bytes, engine.peer_addr()).await.unwrap();
        server.send_to(&bytes, engine.peer_addr()).await.unwrap();

        let first = engine.poll().await.unwrap();
        assert_eq!(
            first,
            vec![Inbound::Message {
                display_name: Dn::try_from("Al").unwrap(),
                content: Content::try_from("hi").unwrap(),
            }]
        );
        let second = engine.poll().await.unwrap();
        assert!(second.is_empty());

        let mut confirms = 0;
        let mut buf = [0u8; 128];
        for _ in 0..2 {
            let (n, _) = server.recv_from(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], &[0x00, 0x00, 0x0C]);
            confirms += 1;
        }
        assert_eq!(confirms, 2);
    }

    #[tokio::test]
    async fn join_reply_unmatched_ref_is_ignored_then_matching_ref_completes() {
        let server = bound().await;
        let server_addr = server.local_addr().unwrap();
        let client_socket = bound().await;
        let transport = ipk24chat_transport::DatagramTransport::new(client_socket, server_addr);
        let mut engine = ReliabilityEngine::new(transport, ReliabilityConfig::default());

        let join = Message::Join {
            msg_id: 3,
            channel_id: ChannelId::try_from("lobby").unwrap(),
            display_name: Dn::try_from("Al").unwrap(),
        };

        let send = tokio::spawn(async move {
            let (events, reply) = engine.send_and_await_reply(&join).await.unwrap();
            assert!(events.is_empty());
            reply
        });

        let mut buf = [0u8; 128];
        let (_, from) = server.recv_from(&mut buf).await.unwrap();
        server
            .send_to(&ipk24chat_codec::datagram::encode_confirm(3), from)
            .await
            .unwrap();
        // A stray reply for an unrelated message, which must be ignored.
        let stray = Message::Reply {
            msg_id: 99,
            ok: true,
            ref_msg_id: 999,
            content: Content::try_from("not for you").unwrap(),
        };
        server
            .send_to(&ipk24chat_codec::datagram::encode(&stray).unwrap(), from)
            .await
            .unwrap();
        // Drain the CONFIRM the client sends for the stray reply.
        server.recv_from(&mut buf).await.unwrap();

        let real = Message::Reply {
            msg_id: 7,
            ok: true,
            ref_msg_id: 3,
            content: Content::try_from("joined").unwrap(),
        };
        server
            .send_to(&ipk24chat_codec::datagram::encode(&real).unwrap(), from)
            .await
            .unwrap();

        let reply = send.await.unwrap();
        assert_eq!(reply, Some(real));
    }
}
