// cirrus-server/src/lib.rs
// ============================================================================
// Module: Cirrus Server Library
// Description: Public API surface for the emulator's HTTP layer.
// Purpose: Expose the server, its configuration, and the pieces tests need.
// Dependencies: crate::{auth, config, envelope, error, handlers, headers,
//               logging, routes, server, state, tls}
// ============================================================================

//! ## Overview
//! The server crate owns everything between the wire and the core: route
//! dispatch, authentication, header extraction, response envelopes, TLS
//! materials, request logging, and lifecycle. Status codes exist only here;
//! the store and query engine below deal in tagged errors.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod auth;
pub mod config;
pub mod envelope;
pub mod error;
pub mod handlers;
pub mod headers;
pub mod logging;
pub mod routes;
pub mod server;
pub mod state;
pub mod tls;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use auth::EMULATOR_MASTER_KEY;
pub use config::LogLevel;
pub use config::ServerConfig;
pub use config::TlsMode;
pub use error::ApiError;
pub use server::ApiServer;
pub use server::ServerError;
pub use state::AppState;
