//! Session Service - authorization-aware access to board sessions
//!
//! Orchestrates the store and the authorization engine for the public
//! operations and publishes a [`SessionEvent`] after every successful
//! mutation.

use crate::authorization::{authorize_bulk, authorize_update, RoleChange};
use crate::errors::{DenialReason, SessionError, SessionResult};
use crate::filter::SessionFilter;
use crate::store::{SessionStore, StoreError, StoreResult, UpdateGuard};
use crate::types::{
    BoardId, BoardSession, SessionEvent, SessionRole, SessionUpdate, SessionUpdateRequest,
    SessionsUpdateRequest, UserId,
};
use retroboard_core::{performance::measure_async, with_timeout, ServerConfig};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Entry point for every session operation
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    events: broadcast::Sender<SessionEvent>,
    operation_timeout_ms: u64,
}

impl SessionService {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self::with_options(store, &ServerConfig::default())
    }

    /// Create a service using the timeout and event buffer from `config`
    pub fn with_options(store: Arc<dyn SessionStore>, config: &ServerConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        Self {
            store,
            events,
            operation_timeout_ms: config.operation_timeout_ms,
        }
    }

    /// Receive events for every board; consumers filter with [`SessionEvent::board`]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// List the sessions of a board, oldest first
    pub async fn list(
        &self,
        board: BoardId,
        filter: &SessionFilter,
    ) -> SessionResult<Vec<BoardSession>> {
        self.run("list_sessions", self.store.list(board, filter)).await
    }

    pub async fn get(&self, board: BoardId, user: UserId) -> SessionResult<BoardSession> {
        self.run("get_session", self.store.get(board, user)).await
    }

    /// Change one session on behalf of `request.caller`.
    ///
    /// Either every requested field is applied or the request fails.
    pub async fn update(&self, request: SessionUpdateRequest) -> SessionResult<BoardSession> {
        let SessionUpdateRequest {
            board,
            caller,
            user,
            mut changes,
        } = request;

        if changes.is_empty() {
            return Err(SessionError::invalid_input("update contains no fields"));
        }

        let sessions = self
            .run("list_sessions", self.store.list(board, &SessionFilter::all()))
            .await?;
        let caller_session = sessions.iter().find(|s| s.user == caller);
        let target = match sessions.iter().find(|s| s.user == user) {
            Some(target) => target,
            None if caller_session.is_none() => {
                return Err(SessionError::denied(DenialReason::NotAMember))
            }
            None => {
                return Err(SessionError::not_found(format!(
                    "Session {} on board {}",
                    user, board
                )))
            }
        };
        let moderators = sessions.iter().filter(|s| s.is_moderator()).count();

        let guard =
            authorize_update(caller_session, target, &changes, moderators).map_err(|reason| {
                debug!(
                    board = %board,
                    caller = %caller,
                    user = %user,
                    reason = reason.code(),
                    "Update denied"
                );
                SessionError::denied(reason)
            })?;

        if RoleChange::of(target.role, changes.role) == RoleChange::None {
            changes.role = None;
        }

        let session = self
            .run(
                "update_session",
                self.store.update_one(board, user, &changes, guard),
            )
            .await?;

        self.publish(SessionEvent::ParticipantUpdated {
            session: session.clone(),
        });
        Ok(session)
    }

    /// Apply the same change to every session of a board
    pub async fn update_all(
        &self,
        request: SessionsUpdateRequest,
    ) -> SessionResult<Vec<BoardSession>> {
        let SessionsUpdateRequest {
            board,
            caller,
            changes,
        } = request;

        if changes.is_empty() {
            return Err(SessionError::invalid_input("update contains no fields"));
        }

        let caller_session = self.find(board, caller).await?;
        authorize_bulk(caller_session.as_ref(), &changes).map_err(SessionError::denied)?;

        let sessions = self
            .run("update_all_sessions", self.store.update_all(board, &changes))
            .await?;

        info!(board = %board, count = sessions.len(), "Updated all sessions");
        if !sessions.is_empty() {
            self.publish(SessionEvent::ParticipantsUpdated {
                board,
                sessions: sessions.clone(),
            });
        }
        Ok(sessions)
    }

    /// Add `user` to a board, or mark an existing session connected again.
    ///
    /// The first session on a board becomes its moderator.
    pub async fn join(&self, board: BoardId, user: UserId) -> SessionResult<BoardSession> {
        if self.find(board, user).await?.is_some() {
            return self.reconnect(board, user).await;
        }

        let existing = self
            .run("list_sessions", self.store.list(board, &SessionFilter::all()))
            .await?;
        let role = if existing.is_empty() {
            SessionRole::Moderator
        } else {
            SessionRole::Participant
        };

        let session = BoardSession::new(board, user, role);
        let created = with_timeout(
            measure_async("create_session", self.store.create(session)),
            self.operation_timeout_ms,
            "create_session",
        )
        .await
        .map_err(StoreError::from);

        match created.and_then(|result| result) {
            Ok(session) => {
                info!(board = %board, user = %user, role = %session.role, "Participant joined");
                self.publish(SessionEvent::ParticipantJoined {
                    session: session.clone(),
                });
                Ok(session)
            }
            // lost a race against a concurrent join of the same user
            Err(StoreError::Duplicate { .. }) => self.reconnect(board, user).await,
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a session from a board.
    ///
    /// Anyone may leave; removing someone else requires a moderator.
    pub async fn leave(&self, board: BoardId, caller: UserId, user: UserId) -> SessionResult<()> {
        let caller_session = self
            .find(board, caller)
            .await?
            .ok_or_else(|| SessionError::denied(DenialReason::NotAMember))?;

        if caller != user && !caller_session.is_moderator() {
            return Err(SessionError::denied(DenialReason::InsufficientRole));
        }

        self.run("remove_session", self.store.remove(board, user)).await?;

        info!(board = %board, user = %user, "Participant left");
        self.publish(SessionEvent::ParticipantLeft { board, user });
        Ok(())
    }

    async fn reconnect(&self, board: BoardId, user: UserId) -> SessionResult<BoardSession> {
        let result = self
            .run(
                "reconnect_session",
                self.store.update_one(
                    board,
                    user,
                    &SessionUpdate::new().connected(true),
                    UpdateGuard::none(),
                ),
            )
            .await;

        let session = match result {
            Ok(session) => session,
            Err(SessionError::NotFound { .. }) => {
                return Err(SessionError::conflict(format!(
                    "Session {} on board {} changed while joining",
                    user, board
                )))
            }
            Err(e) => return Err(e),
        };

        debug!(board = %board, user = %user, "Participant reconnected");
        self.publish(SessionEvent::ParticipantUpdated {
            session: session.clone(),
        });
        Ok(session)
    }

    async fn find(&self, board: BoardId, user: UserId) -> SessionResult<Option<BoardSession>> {
        match self.run("get_session", self.store.get(board, user)).await {
            Ok(session) => Ok(Some(session)),
            Err(SessionError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Run a store call under the operation timeout
    async fn run<F, T>(&self, operation: &str, future: F) -> SessionResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match with_timeout(measure_async(operation, future), self.operation_timeout_ms, operation)
            .await
        {
            Ok(result) => result.map_err(SessionError::from),
            Err(timeout) => Err(StoreError::Backend(timeout).into()),
        }
    }

    fn publish(&self, event: SessionEvent) {
        // no subscribers is not an error
        if let Ok(receivers) = self.events.send(event) {
            debug!(receivers = receivers, "Session event published");
        }
    }
}
