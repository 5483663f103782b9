//! The client's protocol state machine: which message kinds may be sent or
//! accepted in each state, and how the state advances. Free of I/O — it only
//! ever sees `MessageKind` values (never the transport, never the codec).

use std::fmt;

use ipk24chat_wire::MessageKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsmState {
    Start,
    Auth,
    Open,
    Join,
    End,
}

impl fmt::Display for FsmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FsmState::Start => "START",
            FsmState::Auth => "AUTH",
            FsmState::Open => "OPEN",
            FsmState::Join => "JOIN",
            FsmState::End => "END",
        };
        write!(f, "{s}")
    }
}

/// The result of a permitted send or receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The state did not change.
    Stayed(FsmState),
    /// The state advanced.
    Moved(FsmState),
    /// An ERR or BYE was received; the client must render/note it, then
    /// enter `End`.
    Terminated,
}

/// A message kind was sent or received that the table in §4.3 does not
/// permit for the current state. Per the recovery policy this either stays
/// local (a send attempt is simply rejected) or, for an unexpected receive,
/// is a protocol violation that must be reported to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsmViolation {
    SendNotAllowed { state: FsmState, kind: MessageKind },
    ReceiveNotAllowed { state: FsmState, kind: MessageKind },
}

impl fmt::Display for FsmViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsmViolation::SendNotAllowed { state, kind } => {
                write!(f, "cannot send {kind} while in state {state}")
            }
            FsmViolation::ReceiveNotAllowed { state, kind } => {
                write!(f, "cannot receive {kind} while in state {state}")
            }
        }
    }
}

impl std::error::Error for FsmViolation {}

/// The client's protocol state. Owned by the event loop, never global.
#[derive(Debug, Clone, Copy)]
pub struct Fsm {
    state: FsmState,
}

impl Default for Fsm {
    fn default() -> Self {
        Fsm { state: FsmState::Start }
    }
}

impl Fsm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FsmState {
        self.state
    }

    /// Is `kind` permitted to be sent while in the current state? The event
    /// loop must check this *before* handing a frame to the transport.
    pub fn can_send(&self, kind: MessageKind) -> bool {
        use MessageKind::*;
        match (self.state, kind) {
            (FsmState::Start, Auth) => true,
            (FsmState::Auth, Auth | Err) => true,
            (FsmState::Open, Msg | Err | Join) => true,
            _ => false,
        }
    }

    /// Advances the state after sending `kind`. Returns a violation (and
    /// leaves the state untouched) if `kind` was not permitted — callers
    /// should have checked `can_send` first, but this guards against
    /// accidentally skipping that check.
    pub fn on_send(&mut self, kind: MessageKind) -> Result<Transition, FsmViolation> {
        if !self.can_send(kind) {
            return Err(FsmViolation::SendNotAllowed { state: self.state, kind });
        }
        let previous = self.state;
        let next = match (previous, kind) {
            (FsmState::Start, MessageKind::Auth) => FsmState::Auth,
            (FsmState::Open, MessageKind::Join) => FsmState::Join,
            (state, _) => state,
        };
        self.state = next;
        Ok(if next == previous {
            Transition::Stayed(next)
        } else {
            Transition::Moved(next)
        })
    }

    /// Advances the state after receiving `kind` from the server. `ok` is
    /// `Some(flag)` for a `Reply`, `None` otherwise. ERR and BYE are legal in
    /// every state and always terminate the session, per §4.3.
    pub fn on_receive(
        &mut self,
        kind: MessageKind,
        ok: Option<bool>,
    ) -> Result<Transition, FsmViolation> {
        if matches!(kind, MessageKind::Err | MessageKind::Bye) {
            self.state = FsmState::End;
            return Ok(Transition::Terminated);
        }

        let next = match (self.state, kind, ok) {
            (FsmState::Auth, MessageKind::Reply, Some(true)) => Some(FsmState::Open),
            (FsmState::Auth, MessageKind::Reply, Some(false)) => Some(FsmState::Auth),
            (FsmState::Open, MessageKind::Msg, _) => Some(FsmState::Open),
            (FsmState::Join, MessageKind::Msg, _) => Some(FsmState::Join),
            (FsmState::Join, MessageKind::Reply, Some(_)) => Some(FsmState::Open),
            _ => None,
        };

        match next {
            None => Err(FsmViolation::ReceiveNotAllowed { state: self.state, kind }),
            Some(state) if state == self.state => Ok(Transition::Stayed(state)),
            Some(state) => {
                self.state = state;
                Ok(Transition::Moved(state))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use MessageKind::*;

    #[test]
    fn start_only_permits_auth_send() {
        let fsm = Fsm::new();
        assert!(fsm.can_send(Auth));
        for k in [Join, Msg, Err, Bye, Reply] {
            assert!(!fsm.can_send(k), "{k} should not be sendable from START");
        }
    }

    #[test]
    fn sending_auth_from_start_moves_to_auth() {
        let mut fsm = Fsm::new();
        let t = fsm.on_send(Auth).unwrap();
        assert_eq!(fsm.state(), FsmState::Auth);
        assert_eq!(t, Transition::Moved(FsmState::Auth));
    }

    #[test]
    fn auth_state_permits_auth_and_err_send_and_stays() {
        let mut fsm = Fsm::new();
        fsm.on_send(Auth).unwrap();
        assert!(fsm.can_send(Auth));
        assert!(fsm.can_send(Err));
        assert!(!fsm.can_send(Msg));
        fsm.on_send(Err).unwrap();
        assert_eq!(fsm.state(), FsmState::Auth);
    }

    #[test]
    fn reply_ok_in_auth_moves_to_open() {
        let mut fsm = Fsm::new();
        fsm.on_send(Auth).unwrap();
        let t = fsm.on_receive(Reply, Some(true)).unwrap();
        assert_eq!(fsm.state(), FsmState::Open);
        assert_eq!(t, Transition::Moved(FsmState::Open));
    }

    #[test]
    fn reply_nok_in_auth_stays_in_auth() {
        let mut fsm = Fsm::new();
        fsm.on_send(Auth).unwrap();
        let t = fsm.on_receive(Reply, Some(false)).unwrap();
        assert_eq!(fsm.state(), FsmState::Auth);
        assert_eq!(t, Transition::Stayed(FsmState::Auth));
    }

    #[test]
    fn open_permits_msg_err_join_send() {
        let mut fsm = Fsm::new();
        fsm.on_send(Auth).unwrap();
        fsm.on_receive(Reply, Some(true)).unwrap();
        assert!(fsm.can_send(Msg));
        assert!(fsm.can_send(Err));
        assert!(fsm.can_send(Join));
        assert!(!fsm.can_send(Auth));
        let t = fsm.on_send(Join).unwrap();
        assert_eq!(fsm.state(), FsmState::Join);
        assert_eq!(t, Transition::Moved(FsmState::Join));
    }

    #[test]
    fn join_state_permits_no_sends() {
        let mut fsm = Fsm::new();
        fsm.on_send(Auth).unwrap();
        fsm.on_receive(Reply, Some(true)).unwrap();
        fsm.on_send(Join).unwrap();
        for k in [Auth, Join, Msg, Err, Bye, Reply] {
            assert!(!fsm.can_send(k), "{k} should not be sendable from JOIN");
        }
    }

    #[test]
    fn join_state_msg_stays_reply_moves_to_open() {
        let mut fsm = Fsm::new();
        fsm.on_send(Auth).unwrap();
        fsm.on_receive(Reply, Some(true)).unwrap();
        fsm.on_send(Join).unwrap();
        assert_eq!(
            fsm.on_receive(Msg, None).unwrap(),
            Transition::Stayed(FsmState::Join)
        );
        assert_eq!(
            fsm.on_receive(Reply, Some(true)).unwrap(),
            Transition::Moved(FsmState::Open)
        );
    }

    #[test]
    fn err_or_bye_terminate_from_any_state() {
        let make_states: [fn(&mut Fsm); 3] = [
            |_f: &mut Fsm| {},
            |f: &mut Fsm| {
                f.on_send(Auth).unwrap();
            },
            |f: &mut Fsm| {
                f.on_send(Auth).unwrap();
                f.on_receive(Reply, Some(true)).unwrap();
            },
        ];
        for make_state in make_states {
            let mut fsm = Fsm::new();
            make_state(&mut fsm);
            let t = fsm.on_receive(Err, None).unwrap();
            assert_eq!(t, Transition::Terminated);
            assert_eq!(fsm.state(), FsmState::End);

            let mut fsm = Fsm::new();
            make_state(&mut fsm);
            let t = fsm.on_receive(Bye, None).unwrap();
            assert_eq!(t, Transition::Terminated);
            assert_eq!(fsm.state(), FsmState::End);
        }
    }

    #[test]
    fn unexpected_receive_in_start_is_a_violation() {
        let mut fsm = Fsm::new();
        assert_eq!(
            fsm.on_receive(Msg, None),
            Err(FsmViolation::ReceiveNotAllowed {
                state: FsmState::Start,
                kind: Msg
            })
        );
    }

    #[test]
    fn unexpected_send_is_rejected_and_state_is_unchanged() {
        let mut fsm = Fsm::new();
        assert_eq!(
            fsm.on_send(Msg),
            Err(FsmViolation::SendNotAllowed {
                state: FsmState::Start,
                kind: Msg
            })
        );
        assert_eq!(fsm.state(), FsmState::Start);
    }
}
