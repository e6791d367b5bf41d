//! Retroboard Web Server
//!
//! Main web server implementation using Axum.

use crate::{create_app, AppState, WebError, WebResult};
use axum::serve;
use retroboard_core::RetroboardConfig;
use retroboard_sessions::SessionEvent;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

/// Main Retroboard web server
pub struct RetroboardServer {
    config: RetroboardConfig,
    state: AppState,
}

impl RetroboardServer {
    /// Create a new server, opening the configured session store
    pub async fn new(config: RetroboardConfig) -> WebResult<Self> {
        config.validate()?;
        let state = AppState::new(config.clone()).await?;

        Ok(Self { config, state })
    }

    /// Serve until ctrl-c
    pub async fn start(self) -> WebResult<()> {
        let address = self.config.server.address();

        info!("Starting Retroboard web server");
        info!("Storage: {}", self.config.storage.database_url);

        let app = create_app(self.state.clone());

        let listener = TcpListener::bind(&address)
            .await
            .map_err(WebError::Server)?;

        info!("Server listening on http://{}", address);

        // Log session changes until a realtime transport subscribes
        let mut events = self.state.sessions.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => log_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped = skipped, "Session event log fell behind")
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        if let Err(e) = serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            error!("Server error: {}", e);
            return Err(WebError::Server(e));
        }

        info!("Server stopped");
        Ok(())
    }

    /// Get server configuration
    pub fn config(&self) -> &RetroboardConfig {
        &self.config
    }

    /// Get application state
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::ParticipantJoined { session } => {
            debug!(board = %session.board, user = %session.user, "event: participant joined")
        }
        SessionEvent::ParticipantUpdated { session } => {
            debug!(board = %session.board, user = %session.user, "event: participant updated")
        }
        SessionEvent::ParticipantsUpdated { board, sessions } => {
            debug!(board = %board, count = sessions.len(), "event: participants updated")
        }
        SessionEvent::ParticipantLeft { board, user } => {
            debug!(board = %board, user = %user, "event: participant left")
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Builder for RetroboardServer
pub struct RetroboardServerBuilder {
    config: RetroboardConfig,
}

impl RetroboardServerBuilder {
    pub fn new() -> Self {
        Self {
            config: RetroboardConfig::default(),
        }
    }

    /// Start from an existing configuration
    pub fn config(mut self, config: RetroboardConfig) -> Self {
        self.config = config;
        self
    }

    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    /// Set database URL; `memory` selects the in-process store
    pub fn database_url<S: Into<String>>(mut self, database_url: S) -> Self {
        self.config.storage.database_url = database_url.into();
        self
    }

    /// Build the server
    pub async fn build(self) -> WebResult<RetroboardServer> {
        RetroboardServer::new(self.config).await
    }
}

impl Default for RetroboardServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
