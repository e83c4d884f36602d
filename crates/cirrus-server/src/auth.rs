// cirrus-server/src/auth.rs
// ============================================================================
// Module: Master-Key Authentication
// Description: Fail-closed master-key check on the `Authorization` header.
// Purpose: Accept the configured account key and the well-known emulator
//          key; reject everything else before any store call.
// Dependencies: crate::error
// ============================================================================

//! ## Overview
//! The emulator authenticates with a shared master key. The middleware
//! accepts the operator-configured literal and the well-known emulator key;
//! any other header value is a 401 that short-circuits before dispatch.
//! Client SDKs percent-encode the token they send, so the header is compared
//! both raw and percent-decoded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::error::ApiError;
use crate::error::ApiResult;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Well-known development master key accepted by every emulator instance.
pub const EMULATOR_MASTER_KEY: &str =
    "C2y6yDjf5/R+ob0N8A7Cgv30VRDJIWEHLM+4QDU5DE2nQ9nDuVTqobD4b8mGGyPMbIZnqyMsEcaGQy67XIw/Jw==";

/// Maximum accepted `Authorization` header length.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;

// ============================================================================
// SECTION: Authentication
// ============================================================================

/// Paths served without authentication.
#[must_use]
pub fn is_public_path(path: &str) -> bool {
    path == "/"
}

/// Verifies the `Authorization` header against the accepted keys.
///
/// # Errors
///
/// Returns a 401 [`ApiError`] when the header is missing, oversized, or
/// matches neither the configured key nor the emulator key.
pub fn authenticate(account_key: Option<&str>, header: Option<&str>) -> ApiResult<()> {
    let Some(header) = header else {
        return Err(ApiError::unauthorized("missing Authorization header"));
    };
    if header.len() > MAX_AUTH_HEADER_BYTES {
        return Err(ApiError::unauthorized("Authorization header too large"));
    }
    let decoded = percent_decode(header);
    let accepted = |candidate: &str| {
        candidate == EMULATOR_MASTER_KEY
            || account_key.is_some_and(|configured| candidate == configured)
    };
    if accepted(header) || accepted(&decoded) || accepted(signature_of(&decoded)) {
        return Ok(());
    }
    Err(ApiError::unauthorized("invalid master key"))
}

/// Extracts the `sig` component of a `type=…&ver=…&sig=…` token, or the
/// whole input when the shape does not match.
fn signature_of(token: &str) -> &str {
    token
        .split('&')
        .find_map(|part| part.strip_prefix("sig="))
        .unwrap_or(token)
}

/// Minimal percent-decoder for header comparison.
///
/// Invalid escapes pass through untouched so a literal key containing `%`
/// still compares equal to itself.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' {
            if let Some(hex) = bytes.get(index + 1 .. index + 3) {
                if let Ok(byte) = u8::from_str_radix(&String::from_utf8_lossy(hex), 16) {
                    out.push(byte);
                    index += 3;
                    continue;
                }
            }
        }
        out.push(bytes[index]);
        index += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
