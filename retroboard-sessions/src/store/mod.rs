//! Session Store - persistence layer for board sessions
//!
//! Stores are partitioned per board: every mutation is scoped to a single
//! board and never holds a process-wide lock. The "board keeps a moderator"
//! invariant is enforced by the store itself at commit time, so it holds
//! regardless of what the caller read earlier.

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemorySessionStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSessionStore;

use crate::filter::SessionFilter;
use crate::types::{BoardId, BoardSession, SessionUpdate, UserId};
use async_trait::async_trait;
use retroboard_core::RetroboardError;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session {user} not found on board {board}")]
    NotFound { board: BoardId, user: UserId },

    #[error("session {user} already exists on board {board}")]
    Duplicate { board: BoardId, user: UserId },

    #[error("board {board} would be left without a moderator")]
    LastModerator { board: BoardId },

    #[error("caller {caller} is no longer a moderator of board {board}")]
    CallerNotModerator { board: BoardId, caller: UserId },

    #[error(transparent)]
    Backend(#[from] RetroboardError),
}

/// Preconditions evaluated atomically with a single-row write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateGuard {
    /// This user must still be a moderator of the board when the write commits
    pub acting_moderator: Option<UserId>,
}

impl UpdateGuard {
    /// No precondition beyond the store's own invariants
    pub fn none() -> Self {
        Self::default()
    }

    pub fn moderator(caller: UserId) -> Self {
        Self {
            acting_moderator: Some(caller),
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new session; fails with `Duplicate` if (board, user) exists
    async fn create(&self, session: BoardSession) -> StoreResult<BoardSession>;

    /// Sessions of `board` matching `filter`, oldest first
    async fn list(&self, board: BoardId, filter: &SessionFilter)
        -> StoreResult<Vec<BoardSession>>;

    async fn get(&self, board: BoardId, user: UserId) -> StoreResult<BoardSession>;

    /// Apply `changes` to one row atomically, checking `guard` and the
    /// moderator invariant against the committed row set.
    async fn update_one(
        &self,
        board: BoardId,
        user: UserId,
        changes: &SessionUpdate,
        guard: UpdateGuard,
    ) -> StoreResult<BoardSession>;

    /// Apply `changes` to every row of `board` in one transaction.
    ///
    /// An empty board is a successful no-op.
    async fn update_all(
        &self,
        board: BoardId,
        changes: &SessionUpdate,
    ) -> StoreResult<Vec<BoardSession>>;

    /// Delete a session; the last moderator cannot leave while others remain
    async fn remove(&self, board: BoardId, user: UserId) -> StoreResult<()>;
}
