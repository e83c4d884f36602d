// cirrus-server/src/config.rs
// ============================================================================
// Module: Server Configuration
// Description: Runtime configuration for the HTTP surface.
// Purpose: One validated struct threaded from the CLI into the server; no
//          module-level settings.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The server is configured once at construction. Defaults favor the
//! development workflow the emulator exists for: HTTPS on the built-in
//! certificate, quiet logging, and the well-known emulator master key.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 8081;
/// Default maximum request body size in bytes.
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
/// Default server-wide request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Default grace window for draining in-flight requests at shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// TLS listener mode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TlsMode {
    /// HTTPS with the built-in self-signed certificate.
    #[default]
    BuiltIn,
    /// HTTPS with operator-provided certificate materials.
    Files {
        /// PEM certificate chain path.
        cert_path: PathBuf,
        /// PEM private key path.
        key_path: PathBuf,
    },
    /// Plain HTTP; only when explicitly disabled.
    Disabled,
}

/// Request logging level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Quiet: lifecycle messages only.
    #[default]
    Info,
    /// Per-request logging to stderr.
    Debug,
}

/// Server configuration threaded explicitly through every handler.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port to bind.
    pub port: u16,
    /// TLS listener mode.
    pub tls: TlsMode,
    /// Operator-configured master key; the well-known emulator key is
    /// always accepted alongside it.
    pub account_key: Option<String>,
    /// Request logging level.
    pub log_level: LogLevel,
    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
    /// Server-wide handler timeout.
    pub request_timeout: Duration,
    /// Grace window for draining in-flight handlers at shutdown.
    pub shutdown_grace: Duration,
    /// Page cap applied when the client sends no `x-ms-max-item-count`.
    pub default_page_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            tls: TlsMode::default(),
            account_key: None,
            log_level: LogLevel::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            default_page_size: cirrus_query::DEFAULT_PAGE_SIZE,
        }
    }
}
