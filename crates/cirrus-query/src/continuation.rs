// cirrus-query/src/continuation.rs
// ============================================================================
// Module: Continuation Tokens
// Description: Versioned, fingerprinted pagination cursors.
// Purpose: Resume a paginated query across requests without trusting the
//          client with anything but an opaque blob.
// Dependencies: base64, serde, serde_jcs, sha2, crate::error
// ============================================================================

//! ## Overview
//! A continuation token is a URL-safe base64 blob: one version byte followed
//! by the JSON-encoded cursor. The cursor carries a fingerprint of the query
//! text and parameter set (SHA-256 over RFC 8785 canonical JSON), so a token
//! replayed against a different query fails validation before any cursor
//! field is interpreted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;

use crate::error::QueryError;
use crate::error::QueryResult;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Version byte prefixed to every encoded token.
const TOKEN_VERSION: u8 = 1;
/// Maximum accepted token size in bytes after decoding.
const MAX_TOKEN_BYTES: usize = 64 * 1024;

// ============================================================================
// SECTION: Token Types
// ============================================================================

/// Decoded continuation token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuationToken {
    /// Fingerprint of the query text and parameter set.
    pub fingerprint: String,
    /// Cursor into the result stream.
    pub cursor: Cursor,
}

/// Cursor variants for the two execution strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Cursor {
    /// Materialized execution (ordered, grouped, or distinct queries):
    /// resume at a row offset into the stable merged result.
    Offset {
        /// Next row offset to emit.
        skip: u64,
        /// Sort key of the last emitted row, carried as a tiebreaker for
        /// diagnostics and future validation.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order_key: Option<Value>,
    },
    /// Incremental scans: resume from per-partition document cursors.
    Scan {
        /// Documents fully consumed per partition, in partition order.
        cursors: Vec<u64>,
        /// Join rows already emitted from the first unconsumed document.
        row_in_doc: u64,
        /// `OFFSET` rows still to be skipped.
        remaining_offset: u64,
        /// Row budget left under `LIMIT`/`TOP`, when bounded.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        remaining_limit: Option<u64>,
    },
}

// ============================================================================
// SECTION: Fingerprint
// ============================================================================

/// Fingerprints a query text and parameter set.
///
/// The fingerprint is a SHA-256 over the RFC 8785 canonical JSON of
/// `{"query": …, "parameters": …}`, hex-encoded. Two requests share a
/// fingerprint exactly when they would produce the same result stream.
#[must_use]
pub fn query_fingerprint(text: &str, params: &BTreeMap<String, Value>) -> String {
    let subject = serde_json::json!({
        "query": text,
        "parameters": params,
    });
    let canonical = serde_jcs::to_vec(&subject)
        .unwrap_or_else(|_| serde_json::to_vec(&subject).unwrap_or_default());
    let digest = Sha256::digest(&canonical);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

// ============================================================================
// SECTION: Encoding
// ============================================================================

/// Encodes a token as an opaque, URL-safe string.
#[must_use]
pub fn encode(token: &ContinuationToken) -> String {
    let mut bytes = vec![TOKEN_VERSION];
    bytes.extend(serde_json::to_vec(token).unwrap_or_default());
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decodes a token and validates it against the expected fingerprint.
///
/// The version byte and fingerprint are checked before any cursor field is
/// interpreted.
///
/// # Errors
///
/// Returns [`QueryError::BadContinuation`] for undecodable blobs, version
/// mismatches, oversized tokens, and fingerprint mismatches.
pub fn decode(raw: &str, expected_fingerprint: &str) -> QueryResult<ContinuationToken> {
    let bytes = URL_SAFE_NO_PAD
        .decode(raw.trim())
        .map_err(|_| QueryError::BadContinuation("token is not valid base64".to_string()))?;
    if bytes.len() > MAX_TOKEN_BYTES {
        return Err(QueryError::BadContinuation("token exceeds size limit".to_string()));
    }
    let Some((&version, body)) = bytes.split_first() else {
        return Err(QueryError::BadContinuation("token is empty".to_string()));
    };
    if version != TOKEN_VERSION {
        return Err(QueryError::BadContinuation(format!(
            "unsupported token version {version}"
        )));
    }
    let token: ContinuationToken = serde_json::from_slice(body)
        .map_err(|_| QueryError::BadContinuation("token body is malformed".to_string()))?;
    if token.fingerprint != expected_fingerprint {
        return Err(QueryError::BadContinuation(
            "token was issued for a different query".to_string(),
        ));
    }
    Ok(token)
}
