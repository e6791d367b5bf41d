//! Commit-time invariants under concurrent writers

use futures::future::join_all;
use retroboard_core::StorageConfig;
use retroboard_sessions::{
    DenialReason, MemorySessionStore, SessionError, SessionFilter, SessionRole, SessionService,
    SessionStore, SessionUpdate, SessionUpdateRequest, SessionsUpdateRequest,
    SqliteSessionStore, StoreError, UpdateGuard,
};
use std::sync::Arc;
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

/// Two moderators demote each other at the same time, directly at the store
async fn mutual_demotion_at_store(store: Arc<dyn SessionStore>) {
    let board = Uuid::new_v4();
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    for user in [a, b] {
        store
            .create(retroboard_sessions::BoardSession::new(board, user, SessionRole::Moderator))
            .await
            .unwrap();
    }

    let demote = SessionUpdate::new().role(SessionRole::Participant);
    let first = {
        let store = store.clone();
        tokio::spawn(async move {
            store
                .update_one(board, b, &demote, UpdateGuard::moderator(a))
                .await
        })
    };
    let second = {
        let store = store.clone();
        tokio::spawn(async move {
            store
                .update_one(board, a, &demote, UpdateGuard::moderator(b))
                .await
        })
    };

    let results = vec![first.await.unwrap(), second.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "results: {:?}", results);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(StoreError::LastModerator { .. }))));

    let moderators = store
        .list(board, &SessionFilter::all().with_role(SessionRole::Moderator))
        .await
        .unwrap();
    assert_eq!(moderators.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mutual_demotion_memory_store() {
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    for _ in 0..20 {
        mutual_demotion_at_store(store.clone()).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mutual_demotion_sqlite_store() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir).await;
    for _ in 0..10 {
        mutual_demotion_at_store(store.clone()).await;
    }
}

/// The same race through the service; the loser is denied either at
/// authorization or at commit, but never succeeds.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mutual_demotion_through_service() {
    let dir = TempDir::new().unwrap();
    let service = SessionService::new(file_store(&dir).await);

    for _ in 0..10 {
        let board = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        service.join(board, a).await.unwrap();
        service.join(board, b).await.unwrap();
        service
            .update(SessionUpdateRequest {
                board,
                caller: a,
                user: b,
                changes: SessionUpdate::new().role(SessionRole::Moderator),
            })
            .await
            .unwrap();

        let demote = SessionUpdate::new().role(SessionRole::Participant);
        let results = join_all([(a, b), (b, a)].into_iter().map(|(caller, user)| {
            let service = service.clone();
            async move {
                service
                    .update(SessionUpdateRequest {
                        board,
                        caller,
                        user,
                        changes: demote,
                    })
                    .await
            }
        }))
        .await;

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for result in &results {
            if let Err(error) = result {
                assert!(
                    matches!(
                        error,
                        SessionError::Denied {
                            reason: DenialReason::LastModerator | DenialReason::InsufficientRole
                        }
                    ),
                    "unexpected error: {:?}",
                    error
                );
            }
        }

        let moderators = service
            .list(board, &SessionFilter::all().with_role(SessionRole::Moderator))
            .await
            .unwrap();
        assert_eq!(moderators.len(), 1);
    }
}

/// Readers racing a bulk update see the board either before or after it
async fn bulk_update_is_never_half_visible(store: Arc<dyn SessionStore>) {
    let service = SessionService::new(store);
    let board = Uuid::new_v4();
    let mut users = Vec::new();
    for _ in 0..10 {
        let user = Uuid::new_v4();
        service.join(board, user).await.unwrap();
        users.push(user);
    }

    let writer = {
        let service = service.clone();
        let caller = users[0];
        tokio::spawn(async move {
            service
                .update_all(SessionsUpdateRequest {
                    board,
                    caller,
                    changes: SessionUpdate::new().ready(true),
                })
                .await
        })
    };

    let readers = (0..8).map(|_| {
        let service = service.clone();
        tokio::spawn(async move { service.list(board, &SessionFilter::all()).await })
    });

    for reader in join_all(readers).await {
        let sessions = reader.unwrap().unwrap();
        let ready = sessions.iter().filter(|s| s.ready).count();
        assert!(ready == 0 || ready == sessions.len(), "saw {} of {}", ready, sessions.len());
    }

    let updated = writer.await.unwrap().unwrap();
    assert!(updated.iter().all(|s| s.ready));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_bulk_update_visibility_memory_store() {
    bulk_update_is_never_half_visible(Arc::new(MemorySessionStore::new())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_bulk_update_visibility_sqlite_store() {
    let dir = TempDir::new().unwrap();
    bulk_update_is_never_half_visible(file_store(&dir).await).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_keep_one_session_per_user() {
    let dir = TempDir::new().unwrap();
    let service = SessionService::new(file_store(&dir).await);
    let board = Uuid::new_v4();
    let user = Uuid::new_v4();

    let results = join_all((0..6).map(|_| {
        let service = service.clone();
        async move { service.join(board, user).await }
    }))
    .await;

    for result in results {
        let session = result.unwrap();
        assert_eq!(session.user, user);
        assert!(session.connected);
    }
    assert_eq!(service.list(board, &SessionFilter::all()).await.unwrap().len(), 1);
}
