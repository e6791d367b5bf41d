//! In-process session store
//!
//! Each board owns its own partition lock. The outer map lock is only held
//! long enough to look up, insert or evict a partition, and never while a
//! partition lock is held.

use super::{SessionStore, StoreError, StoreResult, UpdateGuard};
use crate::filter::SessionFilter;
use crate::types::{BoardId, BoardSession, SessionRole, SessionUpdate, UserId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Sessions of one board, kept in insertion order
#[derive(Debug, Default)]
struct BoardPartition {
    sessions: Vec<BoardSession>,
    /// Emptied by a removal and about to leave the map; writers must not reuse it
    retired: bool,
}

impl BoardPartition {
    fn position(&self, user: UserId) -> Option<usize> {
        self.sessions.iter().position(|s| s.user == user)
    }

    fn has_other_moderator(&self, user: UserId) -> bool {
        self.sessions
            .iter()
            .any(|s| s.user != user && s.role == SessionRole::Moderator)
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    boards: RwLock<HashMap<BoardId, Arc<RwLock<BoardPartition>>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn partition(&self, board: BoardId) -> Option<Arc<RwLock<BoardPartition>>> {
        self.boards.read().await.get(&board).cloned()
    }

    async fn partition_or_create(&self, board: BoardId) -> Arc<RwLock<BoardPartition>> {
        if let Some(partition) = self.partition(board).await {
            return partition;
        }
        self.boards
            .write()
            .await
            .entry(board)
            .or_default()
            .clone()
    }

    /// Drop `partition` from the map unless it has already been replaced
    async fn evict(&self, board: BoardId, partition: &Arc<RwLock<BoardPartition>>) {
        let mut boards = self.boards.write().await;
        if boards
            .get(&board)
            .is_some_and(|current| Arc::ptr_eq(current, partition))
        {
            boards.remove(&board);
            debug!(board = %board, "Empty board partition evicted");
        }
    }

    #[cfg(test)]
    async fn board_count(&self) -> usize {
        self.boards.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: BoardSession) -> StoreResult<BoardSession> {
        loop {
            let handle = self.partition_or_create(session.board).await;
            let mut partition = handle.write().await;

            if partition.retired {
                drop(partition);
                self.evict(session.board, &handle).await;
                continue;
            }

            if partition.position(session.user).is_some() {
                return Err(StoreError::Duplicate {
                    board: session.board,
                    user: session.user,
                });
            }

            partition.sessions.push(session.clone());
            debug!(board = %session.board, user = %session.user, "Session created");
            return Ok(session);
        }
    }

    async fn list(
        &self,
        board: BoardId,
        filter: &SessionFilter,
    ) -> StoreResult<Vec<BoardSession>> {
        let Some(partition) = self.partition(board).await else {
            return Ok(Vec::new());
        };
        let partition = partition.read().await;

        let mut sessions: Vec<BoardSession> = partition
            .sessions
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        // stable, so insertion order breaks ties
        sessions.sort_by_key(|s| s.created_at);
        Ok(sessions)
    }

    async fn get(&self, board: BoardId, user: UserId) -> StoreResult<BoardSession> {
        let partition = self
            .partition(board)
            .await
            .ok_or(StoreError::NotFound { board, user })?;
        let partition = partition.read().await;

        partition
            .sessions
            .iter()
            .find(|s| s.user == user)
            .cloned()
            .ok_or(StoreError::NotFound { board, user })
    }

    async fn update_one(
        &self,
        board: BoardId,
        user: UserId,
        changes: &SessionUpdate,
        guard: UpdateGuard,
    ) -> StoreResult<BoardSession> {
        let partition = self
            .partition(board)
            .await
            .ok_or(StoreError::NotFound { board, user })?;
        let mut partition = partition.write().await;

        let index = partition
            .position(user)
            .ok_or(StoreError::NotFound { board, user })?;

        let current = &partition.sessions[index];
        let demotes = current.role == SessionRole::Moderator
            && changes.role == Some(SessionRole::Participant);
        if demotes && !partition.has_other_moderator(user) {
            return Err(StoreError::LastModerator { board });
        }

        if let Some(caller) = guard.acting_moderator {
            let still_moderator = partition
                .sessions
                .iter()
                .any(|s| s.user == caller && s.role == SessionRole::Moderator);
            if !still_moderator {
                return Err(StoreError::CallerNotModerator { board, caller });
            }
        }

        let session = &mut partition.sessions[index];
        session.apply(changes);
        Ok(session.clone())
    }

    async fn update_all(
        &self,
        board: BoardId,
        changes: &SessionUpdate,
    ) -> StoreResult<Vec<BoardSession>> {
        let Some(partition) = self.partition(board).await else {
            return Ok(Vec::new());
        };
        let mut partition = partition.write().await;

        let mut staged = partition.sessions.clone();
        for session in staged.iter_mut() {
            session.apply(changes);
        }

        if !staged.is_empty() && !staged.iter().any(BoardSession::is_moderator) {
            return Err(StoreError::LastModerator { board });
        }

        partition.sessions = staged;

        let mut sessions = partition.sessions.clone();
        sessions.sort_by_key(|s| s.created_at);
        debug!(board = %board, count = sessions.len(), "Bulk session update committed");
        Ok(sessions)
    }

    async fn remove(&self, board: BoardId, user: UserId) -> StoreResult<()> {
        let handle = self
            .partition(board)
            .await
            .ok_or(StoreError::NotFound { board, user })?;
        let mut partition = handle.write().await;

        let index = partition
            .position(user)
            .ok_or(StoreError::NotFound { board, user })?;

        let leaving = &partition.sessions[index];
        if leaving.is_moderator()
            && partition.sessions.len() > 1
            && !partition.has_other_moderator(user)
        {
            return Err(StoreError::LastModerator { board });
        }

        partition.sessions.remove(index);
        debug!(board = %board, user = %user, "Session removed");

        if partition.sessions.is_empty() {
            partition.retired = true;
            drop(partition);
            self.evict(board, &handle).await;
        }
        Ok(())
    }
}
