//! Cancelled or timed-out writes never leave a partial commit

use retroboard_core::{ServerConfig, StorageConfig};
use retroboard_sessions::{
    BoardSession, SessionError, SessionFilter, SessionService, SessionStore, SessionUpdate,
    SessionsUpdateRequest, SqliteSessionStore,
};
use sqlx::{Sqlite, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

async fn file_store(dir: &TempDir) -> Arc<SqliteSessionStore> {
    let config = StorageConfig {
        database_url: format!("sqlite:{}", dir.path().join("sessions.db").display()),
        max_connections: 4,
        busy_timeout_ms: 5_000,
    };
    Arc::new(SqliteSessionStore::connect(&config).await.unwrap())
}

async fn seeded_board(service: &SessionService) -> (Uuid, Uuid) {
    let board = Uuid::new_v4();
    let moderator = Uuid::new_v4();
    service.join(board, moderator).await.unwrap();
    for _ in 0..3 {
        service.join(board, Uuid::new_v4()).await.unwrap();
    }
    (board, moderator)
}

/// Take the database write lock from a second connection and keep it
async fn hold_write_lock(store: &SqliteSessionStore, board: Uuid) -> Transaction<'static, Sqlite> {
    let mut tx = store.pool().begin().await.unwrap();
    sqlx::query("UPDATE board_sessions SET ready = ready WHERE board = ?")
        .bind(board.to_string())
        .execute(&mut *tx)
        .await
        .unwrap();
    tx
}

async fn assert_untouched(store: &dyn SessionStore, board: Uuid) {
    let sessions = store.list(board, &SessionFilter::all()).await.unwrap();
    assert_eq!(sessions.len(), 4);
    assert!(sessions.iter().all(|s| !s.ready), "partial commit: {:?}", sessions);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dropped_bulk_update_leaves_board_unchanged() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir).await;
    let service = SessionService::new(store.clone());
    let (board, _) = seeded_board(&service).await;

    let blocker = hold_write_lock(&store, board).await;
    let changes = SessionUpdate::new().ready(true);
    let cancelled =
        tokio::time::timeout(Duration::from_millis(200), store.update_all(board, &changes)).await;
    assert!(cancelled.is_err(), "bulk update finished while the database was locked");

    blocker.rollback().await.unwrap();
    assert_untouched(store.as_ref(), board).await;

    // the pool is still usable afterwards
    let updated = store.update_all(board, &changes).await.unwrap();
    assert!(updated.iter().all(|s| s.ready));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_timed_out_bulk_update_is_internal() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir).await;
    let config = ServerConfig {
        operation_timeout_ms: 200,
        ..ServerConfig::default()
    };
    let service = SessionService::with_options(store.clone(), &config);
    let (board, moderator) = seeded_board(&service).await;
    let mut events = service.subscribe();

    let blocker = hold_write_lock(&store, board).await;
    let error = service
        .update_all(SessionsUpdateRequest {
            board,
            caller: moderator,
            changes: SessionUpdate::new().ready(true),
        })
        .await
        .unwrap_err();

    assert!(matches!(error, SessionError::Internal { .. }), "got {:?}", error);
    assert_eq!(error.http_status(), 500);
    assert!(!error.user_message().contains("timeout"));

    blocker.rollback().await.unwrap();
    assert_untouched(store.as_ref(), board).await;
    assert!(events.try_recv().is_err(), "no event for a failed update");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_timed_out_single_update_is_internal() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir).await;
    let config = ServerConfig {
        operation_timeout_ms: 200,
        ..ServerConfig::default()
    };
    let service = SessionService::with_options(store.clone(), &config);
    let (board, moderator) = seeded_board(&service).await;

    let blocker = hold_write_lock(&store, board).await;
    let error = service
        .update(retroboard_sessions::SessionUpdateRequest {
            board,
            caller: moderator,
            user: moderator,
            changes: SessionUpdate::new().ready(true),
        })
        .await
        .unwrap_err();
    assert!(matches!(error, SessionError::Internal { .. }), "got {:?}", error);
    assert_eq!(error.http_status(), 500);

    // a single-row write is one statement, so it lands whole or not at all
    blocker.rollback().await.unwrap();
    let session: BoardSession = store.get(board, moderator).await.unwrap();
    assert_eq!(session.user, moderator);
    assert!(session.is_moderator());
}
