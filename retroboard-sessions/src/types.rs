//! Session record and change-set types

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Board identifier
pub type BoardId = Uuid;
/// Participant identifier
pub type UserId = Uuid;

/// Role a participant holds on a board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionRole {
    /// Elevated authority over other sessions of the same board
    Moderator,
    Participant,
}

impl SessionRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionRole::Moderator => "MODERATOR",
            SessionRole::Participant => "PARTICIPANT",
        }
    }
}

impl std::fmt::Display for SessionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "MODERATOR" => Ok(SessionRole::Moderator),
            "PARTICIPANT" => Ok(SessionRole::Participant),
            _ => Err(format!("Unknown session role: {}", s)),
        }
    }
}

/// A participant's state on one board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSession {
    pub board: BoardId,
    pub user: UserId,
    pub role: SessionRole,
    /// Transport presence
    pub connected: bool,
    pub ready: bool,
    pub show_hidden_columns: bool,
    pub raised_hand: bool,
    pub voting_completed: bool,
    pub created_at: DateTime<Utc>,
}

impl BoardSession {
    /// Create a fresh, connected session.
    ///
    /// `created_at` is truncated to microseconds so that every store returns
    /// the same value it was given.
    pub fn new(board: BoardId, user: UserId, role: SessionRole) -> Self {
        Self {
            board,
            user,
            role,
            connected: true,
            ready: false,
            show_hidden_columns: false,
            raised_hand: false,
            voting_completed: false,
            created_at: Utc::now().trunc_subsecs(6),
        }
    }

    pub fn is_moderator(&self) -> bool {
        self.role == SessionRole::Moderator
    }

    /// Apply every present field of `changes`; `board`, `user` and `created_at` are untouched.
    pub fn apply(&mut self, changes: &SessionUpdate) {
        if let Some(role) = changes.role {
            self.role = role;
        }
        if let Some(connected) = changes.connected {
            self.connected = connected;
        }
        if let Some(ready) = changes.ready {
            self.ready = ready;
        }
        if let Some(show_hidden_columns) = changes.show_hidden_columns {
            self.show_hidden_columns = show_hidden_columns;
        }
        if let Some(raised_hand) = changes.raised_hand {
            self.raised_hand = raised_hand;
        }
        if let Some(voting_completed) = changes.voting_completed {
            self.voting_completed = voting_completed;
        }
    }
}

/// Sparse set of field changes; absent fields are left as they are.
///
/// Unknown keys fail deserialization, so only updatable fields can be expressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SessionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<SessionRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_hidden_columns: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raised_hand: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voting_completed: Option<bool>,
}

impl SessionUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(mut self, role: SessionRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn connected(mut self, connected: bool) -> Self {
        self.connected = Some(connected);
        self
    }

    pub fn ready(mut self, ready: bool) -> Self {
        self.ready = Some(ready);
        self
    }

    pub fn show_hidden_columns(mut self, show: bool) -> Self {
        self.show_hidden_columns = Some(show);
        self
    }

    pub fn raised_hand(mut self, raised: bool) -> Self {
        self.raised_hand = Some(raised);
        self
    }

    pub fn voting_completed(mut self, completed: bool) -> Self {
        self.voting_completed = Some(completed);
        self
    }

    /// True when no field is present
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn touches_role(&self) -> bool {
        self.role.is_some()
    }
}

/// Request to change one participant's session
#[derive(Debug, Clone)]
pub struct SessionUpdateRequest {
    pub board: BoardId,
    /// Verified identity of the requester
    pub caller: UserId,
    /// Session being changed
    pub user: UserId,
    pub changes: SessionUpdate,
}

/// Request to apply the same changes to every session of a board
#[derive(Debug, Clone)]
pub struct SessionsUpdateRequest {
    pub board: BoardId,
    pub caller: UserId,
    pub changes: SessionUpdate,
}

/// Notification published after a successful mutation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEvent {
    ParticipantJoined {
        session: BoardSession,
    },
    ParticipantUpdated {
        session: BoardSession,
    },
    ParticipantsUpdated {
        board: BoardId,
        sessions: Vec<BoardSession>,
    },
    ParticipantLeft {
        board: BoardId,
        user: UserId,
    },
}

impl SessionEvent {
    pub fn board(&self) -> BoardId {
        match self {
            SessionEvent::ParticipantJoined { session }
            | SessionEvent::ParticipantUpdated { session } => session.board,
            SessionEvent::ParticipantsUpdated { board, .. }
            | SessionEvent::ParticipantLeft { board, .. } => *board,
        }
    }
}
