//! SessionRegistry: the shared table of logged-in sessions and group chats.
//!
//! The registry is the only shared mutable state in the server.  Every
//! operation takes the single `parking_lot::RwLock` for its whole duration, so
//! multi-step work such as "is this name free? then insert it" is one atomic
//! critical section.  All methods are synchronous: a guard can never be held
//! across an `.await`, and callers receive cloned snapshots (including the
//! recipients' [`SharedSink`]s) to write to after the lock is released.
//!
//! # Groups
//!
//! A group stores member *names*, never references to sessions.  Delivery
//! looks the names up again through the registry, so a member that has
//! disconnected simply is not found.  Removing a session always removes it
//! from its group as well, and a group with no members left is dissolved.
//!
//! A session belongs to at most one group.  CREATEGROUP takes the initiator
//! out of its current group first, then adds each named invitee as PENDING,
//! skipping names that are not logged in, the initiator's own name,
//! duplicates, and sessions already in another group.  The CREATEGROUP ack
//! and the invites list the members actually included, so the caller sees
//! which names were skipped.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chat_core::{SessionToken, StatusCode, MAX_SESSIONS};
use parking_lot::RwLock;
use rand::Rng;
use thiserror::Error;

use crate::application::delivery::SharedSink;

/// Error type for registry operations.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("user name is already taken")]
    NameTaken,
    #[error("session limit reached")]
    ServerFull,
    #[error("no session holds this token")]
    InvalidToken,
    #[error("no such user is online")]
    UserNotFound,
    #[error("session is not in a group")]
    NotInGroup,
}

impl RegistryError {
    /// Status code reported to the requesting client.
    pub fn status(self) -> StatusCode {
        match self {
            RegistryError::NameTaken => StatusCode::NameTaken,
            RegistryError::ServerFull => StatusCode::ServerFull,
            RegistryError::InvalidToken => StatusCode::InvalidToken,
            RegistryError::UserNotFound => StatusCode::UserNotFound,
            RegistryError::NotInGroup => StatusCode::NotInGroup,
        }
    }
}

/// Identifier of a group chat, unique for the lifetime of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group-{}", self.0)
    }
}

/// A session's standing in its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStatus {
    /// Not in any group.
    None,
    /// Invited, has not spoken yet.
    Pending,
    /// Created the group, or accepted the invitation.
    Accepted,
}

/// Snapshot of one logged-in session.
#[derive(Clone)]
pub struct Session {
    pub name: String,
    pub token: SessionToken,
    /// The session's own outbound channel.
    pub channel: SharedSink,
    pub group: Option<GroupId>,
    pub status: GroupStatus,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("token", &self.token)
            .field("group", &self.group)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Snapshot of one group chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: GroupId,
    pub initiator: String,
    /// Member names, initiator first, then invitees in request order.
    pub members: Vec<String>,
}

/// Result of [`SessionRegistry::create_group`].
#[derive(Debug, Clone)]
pub struct CreatedGroup {
    pub group: Group,
    /// Invited sessions (initiator excluded), in registration order.
    pub invited: Vec<Session>,
}

#[derive(Default)]
struct RegistryState {
    /// Sessions in registration order.
    sessions: Vec<Session>,
    groups: HashMap<GroupId, Group>,
    next_group_id: u64,
}

impl RegistryState {
    fn position_by_token(&self, token: SessionToken) -> Option<usize> {
        self.sessions.iter().position(|s| s.token == token)
    }

    fn position_by_name(&self, name: &str) -> Option<usize> {
        self.sessions.iter().position(|s| s.name == name)
    }

    fn fresh_token(&self) -> SessionToken {
        let mut rng = rand::rng();
        loop {
            let token: SessionToken = rng.random();
            if token != 0 && self.position_by_token(token).is_none() {
                return token;
            }
        }
    }

    /// Removes the session at `index` from its group, dissolving the group if
    /// it ends up empty, and resets the session's group status.
    fn detach_from_group(&mut self, index: usize) -> Option<GroupId> {
        let session = &mut self.sessions[index];
        let group_id = session.group.take()?;
        session.status = GroupStatus::None;
        let name = session.name.clone();

        if let Some(group) = self.groups.get_mut(&group_id) {
            group.members.retain(|member| *member != name);
            if group.members.is_empty() {
                self.groups.remove(&group_id);
            }
        }
        Some(group_id)
    }
}

/// Thread-safe registry handle.  Cloning shares the same underlying table.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RwLock<RegistryState>>,
    max_sessions: usize,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(MAX_SESSIONS)
    }
}

impl SessionRegistry {
    /// Creates an empty registry admitting at most `max_sessions` sessions.
    ///
    /// The limit is clamped to `1..=MAX_SESSIONS` so a full SHOW reply always
    /// fits in one frame.
    pub fn new(max_sessions: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryState::default())),
            max_sessions: max_sessions.clamp(1, MAX_SESSIONS),
        }
    }

    /// The effective session limit.
    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Number of logged-in sessions.
    pub fn len(&self) -> usize {
        self.inner.read().sessions.len()
    }

    /// Returns `true` when nobody is logged in.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers `name` with its outbound `channel` and returns a fresh token.
    ///
    /// The uniqueness check and the insert happen under one write lock, so
    /// two concurrent logins with the same name can never both succeed.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NameTaken`] if `name` is logged in already;
    /// [`RegistryError::ServerFull`] if the session limit is reached.
    pub fn try_login(
        &self,
        name: &str,
        channel: SharedSink,
    ) -> Result<SessionToken, RegistryError> {
        let mut state = self.inner.write();

        if state.position_by_name(name).is_some() {
            return Err(RegistryError::NameTaken);
        }
        if state.sessions.len() >= self.max_sessions {
            return Err(RegistryError::ServerFull);
        }

        let token = state.fresh_token();
        state.sessions.push(Session {
            name: name.to_string(),
            token,
            channel,
            group: None,
            status: GroupStatus::None,
        });
        Ok(token)
    }

    /// Looks up the session holding `token`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InvalidToken`] if no live session holds it.
    pub fn lookup_by_token(&self, token: SessionToken) -> Result<Session, RegistryError> {
        let state = self.inner.read();
        state
            .position_by_token(token)
            .map(|i| state.sessions[i].clone())
            .ok_or(RegistryError::InvalidToken)
    }

    /// Names of all logged-in sessions, in registration order.
    pub fn list_names(&self) -> Vec<String> {
        self.inner
            .read()
            .sessions
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    /// Snapshot of all logged-in sessions, in registration order.
    pub fn sessions(&self) -> Vec<Session> {
        self.inner.read().sessions.clone()
    }

    /// Removes the session holding `token` and takes it out of its group.
    ///
    /// Returns the removed session, or `None` if it was already gone; calling
    /// this twice is harmless.
    pub fn remove_session(&self, token: SessionToken) -> Option<Session> {
        let mut state = self.inner.write();
        let index = state.position_by_token(token)?;
        state.detach_from_group(index);
        Some(state.sessions.remove(index))
    }

    /// Creates a group led by the session holding `token`.
    ///
    /// If the initiator is already in a group it leaves that group first.
    /// Each name in `invitees` is added with status PENDING if it is logged
    /// in and not already in a group; unknown names, the initiator's own name,
    /// duplicates, and sessions busy in another group are skipped.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InvalidToken`] if the initiator is not logged in.
    pub fn create_group(
        &self,
        token: SessionToken,
        invitees: &[String],
    ) -> Result<CreatedGroup, RegistryError> {
        let mut state = self.inner.write();
        let initiator_index = state
            .position_by_token(token)
            .ok_or(RegistryError::InvalidToken)?;
        state.detach_from_group(initiator_index);

        let id = GroupId(state.next_group_id);
        state.next_group_id += 1;

        let initiator = state.sessions[initiator_index].name.clone();
        let mut members = vec![initiator.clone()];
        for name in invitees {
            if members.contains(name) {
                continue;
            }
            let Some(index) = state.position_by_name(name) else {
                continue;
            };
            if state.sessions[index].group.is_some() {
                continue;
            }
            members.push(name.clone());
        }

        let mut invited = Vec::new();
        for session in state.sessions.iter_mut() {
            if session.token == token {
                session.group = Some(id);
                session.status = GroupStatus::Accepted;
            } else if members.contains(&session.name) {
                session.group = Some(id);
                session.status = GroupStatus::Pending;
                invited.push(session.clone());
            }
        }

        let group = Group {
            id,
            initiator,
            members,
        };
        state.groups.insert(id, group.clone());
        Ok(CreatedGroup { group, invited })
    }

    /// Takes the session holding `token` out of its group.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InvalidToken`] if the session is gone;
    /// [`RegistryError::NotInGroup`] if it is not in a group.
    pub fn leave_group(&self, token: SessionToken) -> Result<GroupId, RegistryError> {
        let mut state = self.inner.write();
        let index = state
            .position_by_token(token)
            .ok_or(RegistryError::InvalidToken)?;
        state
            .detach_from_group(index)
            .ok_or(RegistryError::NotInGroup)
    }

    /// Returns the other members of the caller's group, in registration order.
    ///
    /// A PENDING caller becomes ACCEPTED: speaking in a group accepts the
    /// invitation.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InvalidToken`] if the session is gone;
    /// [`RegistryError::NotInGroup`] if it is not in a group.
    pub fn discussion_targets(&self, token: SessionToken) -> Result<Vec<Session>, RegistryError> {
        let mut state = self.inner.write();
        let index = state
            .position_by_token(token)
            .ok_or(RegistryError::InvalidToken)?;
        let group_id = state.sessions[index]
            .group
            .ok_or(RegistryError::NotInGroup)?;

        let caller = &mut state.sessions[index];
        if caller.status == GroupStatus::Pending {
            caller.status = GroupStatus::Accepted;
        }

        Ok(state
            .sessions
            .iter()
            .filter(|s| s.token != token && s.group == Some(group_id))
            .cloned()
            .collect())
    }

    /// Every session except the one holding `exclude`, in registration order.
    pub fn broadcast_targets(&self, exclude: SessionToken) -> Vec<Session> {
        self.inner
            .read()
            .sessions
            .iter()
            .filter(|s| s.token != exclude)
            .cloned()
            .collect()
    }

    /// Looks up a session by name for direct delivery.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UserNotFound`] if nobody by that name is logged in.
    pub fn resolve_target(&self, name: &str) -> Result<Session, RegistryError> {
        let state = self.inner.read();
        state
            .position_by_name(name)
            .map(|i| state.sessions[i].clone())
            .ok_or(RegistryError::UserNotFound)
    }

    /// Snapshot of the group with `id`, if it still exists.
    pub fn group(&self, id: GroupId) -> Option<Group> {
        self.inner.read().groups.get(&id).cloned()
    }

    /// Number of live groups.
    pub fn group_count(&self) -> usize {
        self.inner.read().groups.len()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
