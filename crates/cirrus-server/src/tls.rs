// cirrus-server/src/tls.rs
// ============================================================================
// Module: TLS Materials
// Description: rustls server configuration from operator files or the
//              built-in self-signed certificate.
// Purpose: Default the listener to HTTPS without requiring any operator
//          provisioning.
// Dependencies: axum-server, rustls, rustls-pemfile
// ============================================================================

//! ## Overview
//! Three listener modes: operator-provided PEM paths, the built-in
//! self-signed certificate (the default), or plain HTTP when TLS is
//! explicitly disabled. Certificate provisioning itself is out of scope;
//! this module only loads materials.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::pki_types::CertificateDer;
use rustls::pki_types::PrivateKeyDer;

use crate::config::TlsMode;
use crate::server::ServerError;

// ============================================================================
// SECTION: Built-In Materials
// ============================================================================

/// Built-in self-signed certificate (PEM).
const BUILTIN_CERT_PEM: &[u8] = include_bytes!("tls/builtin_cert.pem");
/// Built-in private key (PEM, PKCS#8).
const BUILTIN_KEY_PEM: &[u8] = include_bytes!("tls/builtin_key.pem");

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Builds the rustls configuration for a TLS mode.
///
/// Returns `None` for [`TlsMode::Disabled`].
///
/// # Errors
///
/// Returns [`ServerError::Tls`] when certificate materials cannot be read
/// or are malformed.
pub fn rustls_config(mode: &TlsMode) -> Result<Option<RustlsConfig>, ServerError> {
    let (certs, key) = match mode {
        TlsMode::Disabled => return Ok(None),
        TlsMode::BuiltIn => (
            read_certificates(&mut BufReader::new(BUILTIN_CERT_PEM), "built-in certificate")?,
            read_private_key(&mut BufReader::new(BUILTIN_KEY_PEM), "built-in key")?,
        ),
        TlsMode::Files {
            cert_path,
            key_path,
        } => (load_certificates(cert_path)?, load_private_key(key_path)?),
    };
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    let mut config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|err| ServerError::Tls(format!("tls config invalid: {err}")))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(Some(RustlsConfig::from_config(Arc::new(config))))
}

/// Loads a PEM-encoded certificate chain from disk.
fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, ServerError> {
    let file = File::open(path)
        .map_err(|err| ServerError::Tls(format!("tls cert open failed: {err}")))?;
    read_certificates(&mut BufReader::new(file), &path.display().to_string())
}

/// Reads a PEM certificate chain from any reader.
fn read_certificates(
    reader: &mut dyn std::io::BufRead,
    label: &str,
) -> Result<Vec<CertificateDer<'static>>, ServerError> {
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(reader)
        .collect::<Result<_, _>>()
        .map_err(|err| ServerError::Tls(format!("tls cert read failed ({label}): {err}")))?;
    if certs.is_empty() {
        return Err(ServerError::Tls(format!("{label} contains no certificates")));
    }
    Ok(certs)
}

/// Loads a PEM-encoded private key from disk.
fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, ServerError> {
    let file = File::open(path)
        .map_err(|err| ServerError::Tls(format!("tls key open failed: {err}")))?;
    read_private_key(&mut BufReader::new(file), &path.display().to_string())
}

/// Reads a PEM private key from any reader.
fn read_private_key(
    reader: &mut dyn std::io::BufRead,
    label: &str,
) -> Result<PrivateKeyDer<'static>, ServerError> {
    rustls_pemfile::private_key(reader)
        .map_err(|err| ServerError::Tls(format!("tls key read failed ({label}): {err}")))?
        .ok_or_else(|| ServerError::Tls(format!("{label} contains no private key")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_materials_produce_a_config() {
        let config = rustls_config(&TlsMode::BuiltIn).expect("builds");
        assert!(config.is_some());
    }

    #[test]
    fn disabled_mode_yields_no_config() {
        let config = rustls_config(&TlsMode::Disabled).expect("builds");
        assert!(config.is_none());
    }

    #[test]
    fn missing_files_fail_with_a_tls_error() {
        let mode = TlsMode::Files {
            cert_path: "/nonexistent/cert.pem".into(),
            key_path: "/nonexistent/key.pem".into(),
        };
        assert!(matches!(rustls_config(&mode), Err(ServerError::Tls(_))));
    }
}
