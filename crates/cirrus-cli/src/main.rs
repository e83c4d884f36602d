// cirrus-cli/src/main.rs
// ============================================================================
// Module: Cirrus CLI Entry Point
// Description: Flag, environment, and config-file resolution plus server
//              supervision.
// Purpose: Boot the emulator, seed it from a snapshot, and persist one on
//          shutdown.
// Dependencies: cirrus-core, cirrus-server, clap, thiserror, tokio, toml
// ============================================================================

//! ## Overview
//! Configuration resolves in three layers: explicit flags win over
//! environment variables (`CIRRUS_*`), which win over an optional TOML file,
//! which wins over defaults. Startup fails closed: a missing or invalid
//! initial snapshot stops the process rather than serving an empty store
//! the operator did not ask for.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::ValueEnum;
use cirrus_core::DataStore;
use cirrus_core::snapshot;
use cirrus_server::ApiServer;
use cirrus_server::LogLevel;
use cirrus_server::ServerConfig;
use cirrus_server::TlsMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum initial snapshot size in bytes.
const MAX_SNAPSHOT_BYTES: usize = 256 * 1024 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Command-line flags; each has a `CIRRUS_*` environment fallback.
#[derive(Parser, Debug)]
#[command(name = "cirrus", version, about = "In-memory document-database emulator")]
struct Cli {
    /// TCP port to listen on.
    #[arg(long, env = "CIRRUS_PORT", value_name = "PORT")]
    port: Option<u16>,
    /// Serve plain HTTP instead of HTTPS.
    #[arg(long, env = "CIRRUS_DISABLE_TLS")]
    disable_tls: bool,
    /// PEM certificate chain path (requires --tls-key).
    #[arg(long, env = "CIRRUS_TLS_CERT", value_name = "PATH")]
    tls_cert: Option<PathBuf>,
    /// PEM private key path (requires --tls-cert).
    #[arg(long, env = "CIRRUS_TLS_KEY", value_name = "PATH")]
    tls_key: Option<PathBuf>,
    /// Accepted master key; the well-known emulator key always works.
    #[arg(long, env = "CIRRUS_ACCOUNT_KEY", value_name = "KEY")]
    account_key: Option<String>,
    /// Log level; `debug` enables per-request logging.
    #[arg(long, env = "CIRRUS_LOG_LEVEL", value_enum, value_name = "LEVEL")]
    log_level: Option<CliLogLevel>,
    /// Snapshot JSON to load at boot.
    #[arg(long, env = "CIRRUS_INITIAL_DATA", value_name = "PATH")]
    initial_data: Option<PathBuf>,
    /// Snapshot JSON to write at shutdown.
    #[arg(long, env = "CIRRUS_PERSIST_TO", value_name = "PATH")]
    persist_to: Option<PathBuf>,
    /// Optional TOML configuration file merged beneath flags.
    #[arg(long, env = "CIRRUS_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Log levels accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliLogLevel {
    /// Quiet lifecycle logging.
    Info,
    /// Per-request logging to stderr.
    Debug,
}

/// Optional TOML configuration file shape.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    /// TCP port to listen on.
    port: Option<u16>,
    /// Serve plain HTTP instead of HTTPS.
    disable_tls: Option<bool>,
    /// PEM certificate chain path.
    tls_cert: Option<PathBuf>,
    /// PEM private key path.
    tls_key: Option<PathBuf>,
    /// Accepted master key.
    account_key: Option<String>,
    /// Log level string (`info` or `debug`).
    log_level: Option<String>,
    /// Snapshot JSON to load at boot.
    initial_data: Option<PathBuf>,
    /// Snapshot JSON to write at shutdown.
    persist_to: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI failures surfaced on stderr with a non-zero exit.
#[derive(Debug, Error)]
enum CliError {
    /// Configuration file problems.
    #[error("config error: {0}")]
    Config(String),
    /// Initial snapshot problems.
    #[error("initial data error: {0}")]
    InitialData(String),
    /// Snapshot persistence problems.
    #[error("persist error: {0}")]
    Persist(String),
    /// Server lifecycle problems.
    #[error("{0}")]
    Server(#[from] cirrus_server::ServerError),
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("cirrus: {error}");
            ExitCode::FAILURE
        }
    }
}

/// Resolves configuration, seeds the store, and supervises the server.
fn run(cli: Cli) -> Result<(), CliError> {
    let file = load_file_config(cli.config.as_deref())?;
    let (config, initial_data, persist_to) = resolve_config(&cli, &file)?;
    let store = DataStore::new();
    if let Some(path) = &initial_data {
        load_initial_data(&store, path)?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::Config(format!("runtime start failed: {err}")))?;
    let scheme = cirrus_server::server::scheme_of(&config.tls);
    eprintln!("cirrus: listening on {scheme}://0.0.0.0:{}", config.port);

    let serve_store = store.clone();
    runtime.block_on(async move {
        let server = ApiServer::new(config, serve_store);
        server
            .serve(async {
                let _ = tokio::signal::ctrl_c().await;
                eprintln!("cirrus: shutting down");
            })
            .await
    })?;

    if let Some(path) = &persist_to {
        persist_snapshot(&store, path)?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Configuration Resolution
// ============================================================================

/// Loads the optional TOML configuration file with a size limit.
fn load_file_config(path: Option<&Path>) -> Result<FileConfig, CliError> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };
    let raw = fs::read_to_string(path)
        .map_err(|err| CliError::Config(format!("cannot read {}: {err}", path.display())))?;
    if raw.len() > MAX_CONFIG_FILE_SIZE {
        return Err(CliError::Config(format!(
            "{} exceeds the {MAX_CONFIG_FILE_SIZE}-byte limit",
            path.display()
        )));
    }
    toml::from_str(&raw)
        .map_err(|err| CliError::Config(format!("invalid config {}: {err}", path.display())))
}

/// Merges flags over the file config over defaults.
fn resolve_config(
    cli: &Cli,
    file: &FileConfig,
) -> Result<(ServerConfig, Option<PathBuf>, Option<PathBuf>), CliError> {
    let defaults = ServerConfig::default();
    let disable_tls = cli.disable_tls || file.disable_tls.unwrap_or(false);
    let tls_cert = cli.tls_cert.clone().or_else(|| file.tls_cert.clone());
    let tls_key = cli.tls_key.clone().or_else(|| file.tls_key.clone());
    let tls = match (disable_tls, tls_cert, tls_key) {
        (true, _, _) => TlsMode::Disabled,
        (false, Some(cert_path), Some(key_path)) => TlsMode::Files {
            cert_path,
            key_path,
        },
        (false, None, None) => TlsMode::BuiltIn,
        _ => {
            return Err(CliError::Config(
                "--tls-cert and --tls-key must be provided together".to_string(),
            ));
        }
    };
    let log_level = match cli.log_level {
        Some(CliLogLevel::Debug) => LogLevel::Debug,
        Some(CliLogLevel::Info) => LogLevel::Info,
        None => match file.log_level.as_deref() {
            Some(level) if level.eq_ignore_ascii_case("debug") => LogLevel::Debug,
            Some(level) if level.eq_ignore_ascii_case("info") => LogLevel::Info,
            Some(other) => {
                return Err(CliError::Config(format!("unknown log level '{other}'")));
            }
            None => LogLevel::Info,
        },
    };
    let config = ServerConfig {
        port: cli.port.or(file.port).unwrap_or(defaults.port),
        tls,
        account_key: cli.account_key.clone().or_else(|| file.account_key.clone()),
        log_level,
        ..defaults
    };
    let initial_data = cli.initial_data.clone().or_else(|| file.initial_data.clone());
    let persist_to = cli.persist_to.clone().or_else(|| file.persist_to.clone());
    Ok((config, initial_data, persist_to))
}

// ============================================================================
// SECTION: Snapshot IO
// ============================================================================

/// Seeds the store from a snapshot file; failure stops startup.
fn load_initial_data(store: &DataStore, path: &Path) -> Result<(), CliError> {
    let bytes = fs::read(path)
        .map_err(|err| CliError::InitialData(format!("cannot read {}: {err}", path.display())))?;
    if bytes.len() > MAX_SNAPSHOT_BYTES {
        return Err(CliError::InitialData(format!(
            "{} exceeds the {MAX_SNAPSHOT_BYTES}-byte limit",
            path.display()
        )));
    }
    snapshot::import_bytes(store, &bytes)
        .map_err(|err| CliError::InitialData(format!("{}: {err}", path.display())))
}

/// Writes the store snapshot at shutdown.
fn persist_snapshot(store: &DataStore, path: &Path) -> Result<(), CliError> {
    let bytes = snapshot::export_bytes(store)
        .map_err(|err| CliError::Persist(err.to_string()))?;
    fs::write(path, bytes)
        .map_err(|err| CliError::Persist(format!("cannot write {}: {err}", path.display())))?;
    eprintln!("cirrus: snapshot written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn cli_defaults() -> Cli {
        Cli {
            port: None,
            disable_tls: false,
            tls_cert: None,
            tls_key: None,
            account_key: None,
            log_level: None,
            initial_data: None,
            persist_to: None,
            config: None,
        }
    }

    #[test]
    fn defaults_resolve_to_https_on_the_builtin_certificate() {
        let (config, initial, persist) =
            resolve_config(&cli_defaults(), &FileConfig::default()).expect("resolves");
        assert_eq!(config.port, cirrus_server::config::DEFAULT_PORT);
        assert_eq!(config.tls, TlsMode::BuiltIn);
        assert_eq!(config.account_key, None);
        assert!(initial.is_none());
        assert!(persist.is_none());
    }

    #[test]
    fn flags_override_the_config_file() {
        let mut cli = cli_defaults();
        cli.port = Some(9000);
        cli.log_level = Some(CliLogLevel::Debug);
        let file = FileConfig {
            port: Some(7000),
            log_level: Some("info".to_string()),
            account_key: Some("file-key".to_string()),
            ..FileConfig::default()
        };
        let (config, _, _) = resolve_config(&cli, &file).expect("resolves");
        assert_eq!(config.port, 9000);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.account_key.as_deref(), Some("file-key"));
    }

    #[test]
    fn partial_tls_material_is_rejected() {
        let mut cli = cli_defaults();
        cli.tls_cert = Some("/tmp/cert.pem".into());
        let error = resolve_config(&cli, &FileConfig::default()).unwrap_err();
        assert!(matches!(error, CliError::Config(_)));
    }

    #[test]
    fn disable_tls_wins_over_certificate_paths() {
        let mut cli = cli_defaults();
        cli.disable_tls = true;
        cli.tls_cert = Some("/tmp/cert.pem".into());
        cli.tls_key = Some("/tmp/key.pem".into());
        let (config, _, _) = resolve_config(&cli, &FileConfig::default()).expect("resolves");
        assert_eq!(config.tls, TlsMode::Disabled);
    }

    #[test]
    fn config_file_round_trips_through_toml() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "port = 7171\ndisable_tls = true\nlog_level = \"debug\"")
            .expect("write config");
        let parsed = load_file_config(Some(file.path())).expect("loads");
        assert_eq!(parsed.port, Some(7171));
        assert_eq!(parsed.disable_tls, Some(true));
        let (config, _, _) = resolve_config(&cli_defaults(), &parsed).expect("resolves");
        assert_eq!(config.port, 7171);
        assert_eq!(config.tls, TlsMode::Disabled);
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn unknown_config_keys_fail_closed() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "prot = 7171").expect("write config");
        assert!(matches!(load_file_config(Some(file.path())), Err(CliError::Config(_))));
    }

    #[test]
    fn invalid_initial_data_stops_startup() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "not json").expect("write snapshot");
        let store = DataStore::new();
        let error = load_initial_data(&store, file.path()).unwrap_err();
        assert!(matches!(error, CliError::InitialData(_)));
    }

    #[test]
    fn snapshot_persists_and_reloads() {
        let store = DataStore::new();
        store.create_database(serde_json::json!({"id": "db1"})).expect("db");
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("snapshot.json");
        persist_snapshot(&store, &path).expect("persists");
        let restored = DataStore::new();
        load_initial_data(&restored, &path).expect("loads");
        assert!(restored.get_database("db1").is_ok());
    }
}
