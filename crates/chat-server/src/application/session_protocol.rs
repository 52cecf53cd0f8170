//! ProtocolSession: the per-connection protocol state machine.
//!
//! Each accepted connection owns one `ProtocolSession`.  The connection loop
//! decodes a request, hands it to [`ProtocolSession::handle`], and writes the
//! returned [`Reply`] back to the client.  Any frames that must reach *other*
//! clients (forwarded messages, group invites, exit notices) are pushed from
//! inside `handle` after the registry lock has been released.
//!
//! # States
//!
//! ```text
//! Unauthenticated ──LOGIN ok──▶ Authenticated ──EXIT / channel error──▶ Terminated
//! ```
//!
//! In `Unauthenticated` every request except LOGIN is refused with
//! NOT_AUTHENTICATED and the registry is never consulted.  Protocol-level
//! failures (unknown receiver, nobody online, not in a group) are reported to
//! the caller only and leave the connection open.
//!
//! # Cleanup guarantee
//!
//! While authenticated the session holds a [`Registration`].  Dropping it
//! removes the session from the registry, so an early return or a panicking
//! task can never leave a stale entry or group membership behind.  The normal
//! exit path goes through [`ProtocolSession::terminate`], which also tells the
//! remaining users who left.

use chat_core::{
    ProtocolError, Request, RequestFrame, RequestType, Response, ResponseType, SessionToken,
    StatusCode,
};
use tracing::{debug, info};

use crate::application::delivery::{deliver, fan_out, SharedSink};
use crate::application::session_registry::{Session, SessionRegistry};

/// Command words returned by HELP, in the order a front end should list them.
pub const COMMANDS: [&str; 8] = [
    "show",
    "talk",
    "yell",
    "creategroup",
    "discuss",
    "leavegroup",
    "help",
    "exit",
];

/// Whether the connection loop should keep reading after sending a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Terminate,
}

/// The response to send back to the requesting client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub response: Response,
    pub flow: Flow,
}

impl Reply {
    fn ok(response: Response) -> Self {
        Self {
            response,
            flow: Flow::Continue,
        }
    }

    fn failure(request_type: RequestType, status: StatusCode) -> Self {
        Self::ok(Response::failure(request_type, status))
    }
}

/// Externally visible state of a [`ProtocolSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unauthenticated,
    Authenticated,
    Terminated,
}

/// Keeps a session registered for as long as it is alive.
struct Registration {
    registry: SessionRegistry,
    token: SessionToken,
    name: String,
    released: bool,
}

impl Registration {
    /// Removes the session now and disarms the drop guard.
    fn release(mut self) -> Option<Session> {
        self.released = true;
        self.registry.remove_session(self.token)
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if !self.released && self.registry.remove_session(self.token).is_some() {
            debug!("'{}' deregistered by drop guard", self.name);
        }
    }
}

enum State {
    Unauthenticated,
    Authenticated(Registration),
    Terminated,
}

/// Protocol state for one client connection.
pub struct ProtocolSession {
    registry: SessionRegistry,
    /// This connection's own outbound channel, registered at login.
    channel: SharedSink,
    /// Peer description used in log lines.
    peer: String,
    state: State,
}

impl ProtocolSession {
    pub fn new(registry: SessionRegistry, channel: SharedSink, peer: impl Into<String>) -> Self {
        Self {
            registry,
            channel,
            peer: peer.into(),
            state: State::Unauthenticated,
        }
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            State::Unauthenticated => Phase::Unauthenticated,
            State::Authenticated(_) => Phase::Authenticated,
            State::Terminated => Phase::Terminated,
        }
    }

    /// The logged-in name, if authenticated.
    pub fn name(&self) -> Option<&str> {
        match &self.state {
            State::Authenticated(registration) => Some(&registration.name),
            _ => None,
        }
    }

    /// The issued session token, if authenticated.
    pub fn token(&self) -> Option<SessionToken> {
        match &self.state {
            State::Authenticated(registration) => Some(registration.token),
            _ => None,
        }
    }

    /// Executes one request and returns the reply for the caller.
    pub async fn handle(&mut self, frame: RequestFrame) -> Reply {
        let request_type = frame.request.request_type();

        let (token, name) = match &self.state {
            State::Terminated => {
                return Reply {
                    response: Response::failure(request_type, StatusCode::NotAuthenticated),
                    flow: Flow::Terminate,
                }
            }
            State::Unauthenticated => return self.handle_unauthenticated(frame.request),
            State::Authenticated(registration) => {
                (registration.token, registration.name.clone())
            }
        };

        if request_type == RequestType::Login {
            return Reply::failure(request_type, StatusCode::AlreadyLoggedIn);
        }
        if frame.token != token {
            debug!(
                "{}: '{name}' sent {request_type:?} with a foreign token",
                self.peer
            );
            return Reply::failure(request_type, StatusCode::InvalidToken);
        }

        match frame.request {
            // Handled above.
            Request::Login { .. } => Reply::failure(request_type, StatusCode::AlreadyLoggedIn),
            Request::Show => Reply::ok(Response::Show {
                names: self.registry.list_names(),
            }),
            Request::Talk { receiver, message } => self.talk(&name, &receiver, message).await,
            Request::Yell { message } => self.yell(token, &name, message).await,
            Request::CreateGroup { members } => self.create_group(token, &name, &members).await,
            Request::Discuss { message } => self.discuss(token, &name, message).await,
            Request::LeaveGroup => match self.registry.leave_group(token) {
                Ok(group) => {
                    debug!("'{name}' left {group}");
                    Reply::ok(Response::LeaveGroup)
                }
                Err(e) => Reply::failure(request_type, e.status()),
            },
            Request::Help => Reply::ok(Response::Help {
                commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
            }),
            Request::Exit => {
                self.terminate().await;
                Reply {
                    response: Response::Exit,
                    flow: Flow::Terminate,
                }
            }
        }
    }

    /// Deregisters the session and notifies everyone still online.
    ///
    /// Safe to call in any state and more than once; only the first call on
    /// an authenticated session has an effect.
    pub async fn terminate(&mut self) {
        let previous = std::mem::replace(&mut self.state, State::Terminated);
        let State::Authenticated(registration) = previous else {
            return;
        };
        let Some(departed) = registration.release() else {
            return;
        };

        info!("{}: '{}' logged out", self.peer, departed.name);
        let remaining = self.registry.sessions();
        fan_out(
            &remaining,
            &Response::ExitNotice {
                name: departed.name,
            },
        )
        .await;
    }

    // ── Request handlers ──────────────────────────────────────────────────────

    fn handle_unauthenticated(&mut self, request: Request) -> Reply {
        let request_type = request.request_type();
        let Request::Login { name } = request else {
            return Reply::failure(request_type, StatusCode::NotAuthenticated);
        };

        match self.registry.try_login(&name, self.channel.clone()) {
            Ok(token) => {
                info!("{}: '{name}' logged in", self.peer);
                self.state = State::Authenticated(Registration {
                    registry: self.registry.clone(),
                    token,
                    name,
                    released: false,
                });
                Reply::ok(Response::Login { token })
            }
            Err(e) => {
                info!("{}: login as '{name}' refused: {e}", self.peer);
                Reply::failure(RequestType::Login, e.status())
            }
        }
    }

    async fn talk(&self, sender: &str, receiver: &str, message: String) -> Reply {
        let target = match self.registry.resolve_target(receiver) {
            Ok(target) => target,
            Err(e) => return Reply::failure(RequestType::Talk, e.status()),
        };
        deliver(
            &target,
            &Response::TalkForward {
                sender: sender.to_string(),
                message,
            },
        )
        .await;
        Reply::ok(Response::Talk)
    }

    async fn yell(&self, token: SessionToken, sender: &str, message: String) -> Reply {
        let targets = self.registry.broadcast_targets(token);
        if targets.is_empty() {
            return Reply::failure(RequestType::Yell, StatusCode::NoUserOnline);
        }
        fan_out(
            &targets,
            &Response::YellForward {
                sender: sender.to_string(),
                message,
            },
        )
        .await;
        Reply::ok(Response::Yell)
    }

    async fn create_group(&self, token: SessionToken, name: &str, invitees: &[String]) -> Reply {
        let created = match self.registry.create_group(token, invitees) {
            Ok(created) => created,
            Err(e) => return Reply::failure(RequestType::CreateGroup, e.status()),
        };
        debug!(
            "'{name}' created {} with {:?}",
            created.group.id, created.group.members
        );
        fan_out(
            &created.invited,
            &Response::GroupInvite {
                members: created.group.members.clone(),
            },
        )
        .await;
        Reply::ok(Response::CreateGroup {
            members: created.group.members,
        })
    }

    /// Relays a group message to every other member, PENDING or ACCEPTED.
    ///
    /// There is no separate accept request: a PENDING member's first DISCUSS
    /// counts as accepting the invitation and moves it to ACCEPTED.
    /// LEAVEGROUP is how an invitation is declined.
    async fn discuss(&self, token: SessionToken, sender: &str, message: String) -> Reply {
        let targets = match self.registry.discussion_targets(token) {
            Ok(targets) => targets,
            Err(e) => return Reply::failure(RequestType::Discuss, e.status()),
        };
        fan_out(
            &targets,
            &Response::DiscussForward {
                sender: sender.to_string(),
                message,
            },
        )
        .await;
        Reply::ok(Response::Discuss)
    }
}

/// Builds the ERROR frame sent just before dropping a connection that sent an
/// undecodable or unknown request.
pub fn fatal_reply(error: &ProtocolError) -> Response {
    Response::Failure {
        kind: ResponseType::Error,
        status: error.status(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
