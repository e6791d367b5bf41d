//! Route definitions for the Retroboard web server

use crate::{handlers, AppState};
use axum::{
    routing::get,
    Router,
};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Board participants
        .route(
            "/boards/{board}/participants",
            get(handlers::list_participants)
                .put(handlers::update_all_participants)
                .post(handlers::join_board),
        )
        .route(
            "/boards/{board}/participants/{session}",
            get(handlers::get_participant)
                .put(handlers::update_participant)
                .delete(handlers::leave_board),
        )
}

