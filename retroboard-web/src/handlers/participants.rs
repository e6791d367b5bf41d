//! Board participant handlers

use super::extract::{ApiJson, ApiPath};
use crate::{auth::CallerIdentity, ApiError, AppState};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::Json,
};
use retroboard_sessions::{
    BoardId, BoardSession, SessionFilter, SessionUpdate, SessionUpdateRequest,
    SessionsUpdateRequest, UserId,
};
use tracing::{debug, info};

type ApiResult<T> = Result<T, ApiError>;

/// List the participants of a board.
///
/// Query parameters narrow the listing; unknown or malformed ones are ignored.
pub async fn list_participants(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
    ApiPath(board): ApiPath<BoardId>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> ApiResult<Json<Vec<BoardSession>>> {
    let filter = match query {
        Ok(Query(params)) => SessionFilter::from_query(params),
        Err(rejection) => {
            debug!("Ignoring undecodable query string: {}", rejection);
            SessionFilter::all()
        }
    };
    debug!(board = %board, caller = %caller, filter = ?filter, "Listing participants");

    let sessions = state.sessions.list(board, &filter).await?;
    Ok(Json(sessions))
}

pub async fn get_participant(
    State(state): State<AppState>,
    CallerIdentity(_caller): CallerIdentity,
    ApiPath((board, user)): ApiPath<(BoardId, UserId)>,
) -> ApiResult<Json<BoardSession>> {
    let session = state.sessions.get(board, user).await?;
    Ok(Json(session))
}

/// Change one participant's session
pub async fn update_participant(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
    ApiPath((board, user)): ApiPath<(BoardId, UserId)>,
    ApiJson(changes): ApiJson<SessionUpdate>,
) -> ApiResult<Json<BoardSession>> {
    let session = state
        .sessions
        .update(SessionUpdateRequest {
            board,
            caller,
            user,
            changes,
        })
        .await?;
    Ok(Json(session))
}

/// Apply one change to every participant of a board
pub async fn update_all_participants(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
    ApiPath(board): ApiPath<BoardId>,
    ApiJson(changes): ApiJson<SessionUpdate>,
) -> ApiResult<Json<Vec<BoardSession>>> {
    let sessions = state
        .sessions
        .update_all(SessionsUpdateRequest {
            board,
            caller,
            changes,
        })
        .await?;
    Ok(Json(sessions))
}

/// Join the board as the calling user
pub async fn join_board(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
    ApiPath(board): ApiPath<BoardId>,
) -> ApiResult<(StatusCode, Json<BoardSession>)> {
    let session = state.sessions.join(board, caller).await?;
    info!(board = %board, user = %caller, "Joined board via HTTP");
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn leave_board(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
    ApiPath((board, user)): ApiPath<(BoardId, UserId)>,
) -> ApiResult<StatusCode> {
    state.sessions.leave(board, caller, user).await?;
    Ok(StatusCode::NO_CONTENT)
}
