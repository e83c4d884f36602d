// cirrus-server/src/state.rs
// ============================================================================
// Module: Server State
// Description: Shared state threaded through every handler.
// Purpose: No module-level singletons; the supervisor owns the store and
//          hands it to the router explicitly.
// Dependencies: cirrus-core, crate::{config, logging}
// ============================================================================

//! ## Overview
//! One [`AppState`] instance is built per server and shared behind an `Arc`.
//! Tests construct isolated states (and stores) per scenario.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use cirrus_core::DataStore;

use crate::config::LogLevel;
use crate::config::ServerConfig;
use crate::logging::NoopRequestLog;
use crate::logging::RequestLogSink;
use crate::logging::StderrRequestLog;

// ============================================================================
// SECTION: State
// ============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    /// The data store; the only process-wide mutable state.
    pub store: DataStore,
    /// Server configuration.
    pub config: ServerConfig,
    /// Request log sink selected from the log level.
    pub log: Arc<dyn RequestLogSink>,
}

impl AppState {
    /// Builds server state, picking the log sink from the configuration.
    #[must_use]
    pub fn new(config: ServerConfig, store: DataStore) -> Self {
        let log: Arc<dyn RequestLogSink> = match config.log_level {
            LogLevel::Debug => Arc::new(StderrRequestLog),
            LogLevel::Info => Arc::new(NoopRequestLog),
        };
        Self {
            store,
            config,
            log,
        }
    }
}
