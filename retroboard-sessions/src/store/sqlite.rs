//! SQLite-backed session store
//!
//! Single-row writes are one conditional statement, so their guards are
//! evaluated against the committed row set. Bulk writes run in a transaction
//! that rolls back if the future is dropped before commit.

use super::{SessionStore, StoreError, StoreResult, UpdateGuard};
use crate::filter::SessionFilter;
use crate::types::{BoardId, BoardSession, SessionRole, SessionUpdate, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use retroboard_core::{storage_error, RetroboardError, StorageConfig};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

const COMPONENT: &str = "sqlite_session_store";

const SESSION_COLUMNS: &str = "board, user_id, role, connected, ready, show_hidden_columns, \
     raised_hand, voting_completed, created_at";

/// Database row
#[derive(Debug, sqlx::FromRow)]
struct SessionRecord {
    board: String,
    user_id: String,
    role: String,
    connected: bool,
    ready: bool,
    show_hidden_columns: bool,
    raised_hand: bool,
    voting_completed: bool,
    created_at: i64,
}

impl SessionRecord {
    fn into_session(self) -> StoreResult<BoardSession> {
        let board = Uuid::parse_str(&self.board)
            .map_err(|e| storage_error!(format!("Corrupt board id '{}'", self.board), COMPONENT, e))?;
        let user = Uuid::parse_str(&self.user_id).map_err(|e| {
            storage_error!(format!("Corrupt user id '{}'", self.user_id), COMPONENT, e)
        })?;
        let role = SessionRole::from_str(&self.role)
            .map_err(|e| storage_error!(format!("Corrupt role: {}", e), COMPONENT))?;
        let created_at = DateTime::<Utc>::from_timestamp_micros(self.created_at).ok_or_else(|| {
            storage_error!(format!("Corrupt created_at {}", self.created_at), COMPONENT)
        })?;

        Ok(BoardSession {
            board,
            user,
            role,
            connected: self.connected,
            ready: self.ready,
            show_hidden_columns: self.show_hidden_columns,
            raised_hand: self.raised_hand,
            voting_completed: self.voting_completed,
            created_at,
        })
    }
}

fn backend(operation: &str, e: sqlx::Error) -> StoreError {
    StoreError::Backend(RetroboardError::Storage {
        message: format!("Failed to {}: {}", operation, e),
        source: Some(Box::new(e)),
        context: retroboard_core::ErrorContext::new(COMPONENT).with_operation(operation),
    })
}

#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Connect using the storage section of the configuration
    pub async fn connect(config: &StorageConfig) -> StoreResult<Self> {
        info!("Connecting session store: {}", config.database_url);

        let in_memory = config.database_url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(|e| backend("parse database url", e))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

        let pool_options = if in_memory {
            // every connection to :memory: is its own database
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            let path = options.get_filename().to_path_buf();
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Backend(storage_error!(
                        format!("Failed to create directory {}", parent.display()),
                        COMPONENT,
                        e
                    ))
                })?;
            }
            options = options.journal_mode(SqliteJournalMode::Wal);
            SqlitePoolOptions::new().max_connections(config.max_connections)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| backend("connect", e))?;

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, creating the schema if needed
    pub async fn from_pool(pool: SqlitePool) -> StoreResult<Self> {
        let store = Self { pool };
        store.create_tables().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn create_tables(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS board_sessions (
                board TEXT NOT NULL,
                user_id TEXT NOT NULL,
                role TEXT NOT NULL CHECK (role IN ('MODERATOR', 'PARTICIPANT')),
                connected BOOLEAN NOT NULL DEFAULT FALSE,
                ready BOOLEAN NOT NULL DEFAULT FALSE,
                show_hidden_columns BOOLEAN NOT NULL DEFAULT FALSE,
                raised_hand BOOLEAN NOT NULL DEFAULT FALSE,
                voting_completed BOOLEAN NOT NULL DEFAULT FALSE,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (board, user_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| backend("create board_sessions table", e))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_board_sessions_created ON board_sessions(board, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| backend("create board_sessions index", e))?;

        debug!("board_sessions table ready");
        Ok(())
    }

    async fn fetch_optional(&self, board: BoardId, user: UserId) -> StoreResult<Option<BoardSession>> {
        let query = format!(
            "SELECT {} FROM board_sessions WHERE board = ? AND user_id = ?",
            SESSION_COLUMNS
        );
        let record = sqlx::query_as::<_, SessionRecord>(&query)
            .bind(board.to_string())
            .bind(user.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend("fetch session", e))?;

        record.map(SessionRecord::into_session).transpose()
    }

    /// Explain why a guarded single-row write touched nothing
    async fn diagnose(
        &self,
        board: BoardId,
        user: UserId,
        changes: &SessionUpdate,
        guard: UpdateGuard,
    ) -> StoreError {
        let target = match self.fetch_optional(board, user).await {
            Err(e) => return e,
            Ok(None) => return StoreError::NotFound { board, user },
            Ok(Some(target)) => target,
        };

        let demotes = target.is_moderator() && changes.role == Some(SessionRole::Participant);
        if demotes {
            match self.count_moderators(board).await {
                Err(e) => return e,
                Ok(count) if count <= 1 => return StoreError::LastModerator { board },
                Ok(_) => {}
            }
        }

        if let Some(caller) = guard.acting_moderator {
            match self.fetch_optional(board, caller).await {
                Err(e) => return e,
                Ok(Some(session)) if session.is_moderator() => {}
                Ok(_) => return StoreError::CallerNotModerator { board, caller },
            }
        }

        // the blocking row changed again before we looked
        StoreError::LastModerator { board }
    }

    async fn count_moderators(&self, board: BoardId) -> StoreResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM board_sessions WHERE board = ? AND role = 'MODERATOR'",
        )
        .bind(board.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| backend("count moderators", e))
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create(&self, session: BoardSession) -> StoreResult<BoardSession> {
        let result = sqlx::query(
            r#"
            INSERT INTO board_sessions (board, user_id, role, connected, ready,
                show_hidden_columns, raised_hand, voting_completed, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.board.to_string())
        .bind(session.user.to_string())
        .bind(session.role.as_str())
        .bind(session.connected)
        .bind(session.ready)
        .bind(session.show_hidden_columns)
        .bind(session.raised_hand)
        .bind(session.voting_completed)
        .bind(session.created_at.timestamp_micros())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(board = %session.board, user = %session.user, "Session created");
                Ok(session)
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::Duplicate {
                    board: session.board,
                    user: session.user,
                })
            }
            Err(e) => Err(backend("insert session", e)),
        }
    }

    async fn list(
        &self,
        board: BoardId,
        filter: &SessionFilter,
    ) -> StoreResult<Vec<BoardSession>> {
        let query = format!(
            r#"
            SELECT {} FROM board_sessions
            WHERE board = ?1
              AND (?2 IS NULL OR connected = ?2)
              AND (?3 IS NULL OR ready = ?3)
              AND (?4 IS NULL OR raised_hand = ?4)
              AND (?5 IS NULL OR role = ?5)
            ORDER BY created_at ASC, rowid ASC
            "#,
            SESSION_COLUMNS
        );

        let records = sqlx::query_as::<_, SessionRecord>(&query)
            .bind(board.to_string())
            .bind(filter.connected)
            .bind(filter.ready)
            .bind(filter.raised_hand)
            .bind(filter.role.map(|r| r.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| backend("list sessions", e))?;

        records.into_iter().map(SessionRecord::into_session).collect()
    }

    async fn get(&self, board: BoardId, user: UserId) -> StoreResult<BoardSession> {
        self.fetch_optional(board, user)
            .await?
            .ok_or(StoreError::NotFound { board, user })
    }

    async fn update_one(
        &self,
        board: BoardId,
        user: UserId,
        changes: &SessionUpdate,
        guard: UpdateGuard,
    ) -> StoreResult<BoardSession> {
        // WHERE sees the pre-update row; the subqueries see the committed board.
        let query = format!(
            r#"
            UPDATE board_sessions SET
                role = COALESCE(?1, role),
                connected = COALESCE(?2, connected),
                ready = COALESCE(?3, ready),
                show_hidden_columns = COALESCE(?4, show_hidden_columns),
                raised_hand = COALESCE(?5, raised_hand),
                voting_completed = COALESCE(?6, voting_completed)
            WHERE board = ?7 AND user_id = ?8
              AND (?9 IS NULL OR EXISTS (
                    SELECT 1 FROM board_sessions c
                    WHERE c.board = ?7 AND c.user_id = ?9 AND c.role = 'MODERATOR'))
              AND (role <> 'MODERATOR'
                   OR COALESCE(?1, role) = 'MODERATOR'
                   OR EXISTS (
                    SELECT 1 FROM board_sessions m
                    WHERE m.board = ?7 AND m.user_id <> ?8 AND m.role = 'MODERATOR'))
            RETURNING {}
            "#,
            SESSION_COLUMNS
        );

        let record = sqlx::query_as::<_, SessionRecord>(&query)
            .bind(changes.role.map(|r| r.as_str()))
            .bind(changes.connected)
            .bind(changes.ready)
            .bind(changes.show_hidden_columns)
            .bind(changes.raised_hand)
            .bind(changes.voting_completed)
            .bind(board.to_string())
            .bind(user.to_string())
            .bind(guard.acting_moderator.map(|c| c.to_string()))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend("update session", e))?;

        match record {
            Some(record) => record.into_session(),
            None => Err(self.diagnose(board, user, changes, guard).await),
        }
    }

    async fn update_all(
        &self,
        board: BoardId,
        changes: &SessionUpdate,
    ) -> StoreResult<Vec<BoardSession>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| backend("begin bulk update", e))?;

        let result = sqlx::query(
            r#"
            UPDATE board_sessions SET
                role = COALESCE(?1, role),
                connected = COALESCE(?2, connected),
                ready = COALESCE(?3, ready),
                show_hidden_columns = COALESCE(?4, show_hidden_columns),
                raised_hand = COALESCE(?5, raised_hand),
                voting_completed = COALESCE(?6, voting_completed)
            WHERE board = ?7
            "#,
        )
        .bind(changes.role.map(|r| r.as_str()))
        .bind(changes.connected)
        .bind(changes.ready)
        .bind(changes.show_hidden_columns)
        .bind(changes.raised_hand)
        .bind(changes.voting_completed)
        .bind(board.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| backend("bulk update sessions", e))?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| backend("rollback bulk update", e))?;
            return Ok(Vec::new());
        }

        let query = format!(
            "SELECT {} FROM board_sessions WHERE board = ? ORDER BY created_at ASC, rowid ASC",
            SESSION_COLUMNS
        );
        let records = sqlx::query_as::<_, SessionRecord>(&query)
            .bind(board.to_string())
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| backend("read back bulk update", e))?;

        let sessions = records
            .into_iter()
            .map(SessionRecord::into_session)
            .collect::<StoreResult<Vec<_>>>()?;

        if !sessions.iter().any(BoardSession::is_moderator) {
            tx.rollback()
                .await
                .map_err(|e| backend("rollback bulk update", e))?;
            return Err(StoreError::LastModerator { board });
        }

        tx.commit()
            .await
            .map_err(|e| backend("commit bulk update", e))?;

        debug!(board = %board, count = sessions.len(), "Bulk session update committed");
        Ok(sessions)
    }

    async fn remove(&self, board: BoardId, user: UserId) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM board_sessions
            WHERE board = ?1 AND user_id = ?2
              AND (role <> 'MODERATOR'
                   OR EXISTS (
                    SELECT 1 FROM board_sessions m
                    WHERE m.board = ?1 AND m.user_id <> ?2 AND m.role = 'MODERATOR')
                   OR NOT EXISTS (
                    SELECT 1 FROM board_sessions o
                    WHERE o.board = ?1 AND o.user_id <> ?2))
            "#,
        )
        .bind(board.to_string())
        .bind(user.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| backend("remove session", e))?;

        if result.rows_affected() == 1 {
            debug!(board = %board, user = %user, "Session removed");
            return Ok(());
        }

        match self.fetch_optional(board, user).await? {
            None => Err(StoreError::NotFound { board, user }),
            Some(_) => Err(StoreError::LastModerator { board }),
        }
    }
}
