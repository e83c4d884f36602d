// cirrus-server/src/server.rs
// ============================================================================
// Module: Server Lifecycle
// Description: Listener binding, TLS selection, and graceful shutdown.
// Purpose: Supervise the HTTP surface: bind, serve, drain, and report
//          completion to the caller.
// Dependencies: axum, axum-server, tokio, crate::{config, routes, state,
//               tls}
// ============================================================================

//! ## Overview
//! The server binds one listener in the configured TLS mode and serves the
//! route table until the shutdown future resolves. Shutdown stops accepting
//! connections, drains in-flight handlers within the configured grace
//! window, then closes; `serve` returning is the completion notification to
//! the supervisor.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use cirrus_core::DataStore;
use thiserror::Error;

use crate::config::ServerConfig;
use crate::config::TlsMode;
use crate::routes;
use crate::state::AppState;
use crate::tls;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures raised by the server lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound or failed while serving.
    #[error("server transport failed: {0}")]
    Transport(String),
    /// TLS materials could not be loaded or were invalid.
    #[error("tls error: {0}")]
    Tls(String),
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// The emulator's HTTP surface.
pub struct ApiServer {
    /// Shared handler state.
    state: Arc<AppState>,
}

impl ApiServer {
    /// Builds a server around an existing store.
    #[must_use]
    pub fn new(config: ServerConfig, store: DataStore) -> Self {
        Self {
            state: Arc::new(AppState::new(config, store)),
        }
    }

    /// Returns the shared state (tests inspect the store through it).
    #[must_use]
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Builds the route table; exposed so tests can serve it on an
    /// ephemeral listener.
    #[must_use]
    pub fn router(&self) -> Router {
        routes::router(Arc::clone(&self.state))
    }

    /// Serves until the shutdown future resolves.
    ///
    /// Returning `Ok(())` after a shutdown signal means the drain finished
    /// (or the grace window elapsed and remaining connections were closed).
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding fails, TLS materials are
    /// invalid, or the listener fails while serving.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let config = self.state.config.clone();
        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let router = self.router();

        let handle = axum_server::Handle::new();
        let drain_handle = handle.clone();
        let grace = config.shutdown_grace;
        tokio::spawn(async move {
            shutdown.await;
            drain_handle.graceful_shutdown(Some(grace));
        });

        match tls::rustls_config(&config.tls)? {
            Some(tls_config) => axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(router.into_make_service())
                .await
                .map_err(|err| ServerError::Transport(format!("https server failed: {err}"))),
            None => axum_server::bind(addr)
                .handle(handle)
                .serve(router.into_make_service())
                .await
                .map_err(|err| ServerError::Transport(format!("http server failed: {err}"))),
        }
    }
}

impl std::fmt::Debug for ApiServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiServer").field("config", &self.state.config).finish()
    }
}

/// Scheme string for the configured TLS mode, for startup banners.
#[must_use]
pub fn scheme_of(mode: &TlsMode) -> &'static str {
    match mode {
        TlsMode::Disabled => "http",
        _ => "https",
    }
}
