// cirrus-server/src/handlers/mod.rs
// ============================================================================
// Module: Route Handlers
// Description: Typed handlers behind the route table.
// Purpose: Decode the request, invoke the store or query engine, and shape
//          the response envelope; nothing else.
// Dependencies: axum, cirrus-core, serde_json, crate::{error, state}
// ============================================================================

//! ## Overview
//! Handlers share one request-decoding discipline: bodies are read as raw
//! bytes, checked against the configured size limit, then parsed as JSON.
//! Authentication has already run in the middleware by the time a handler
//! executes.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod admin;
pub mod collections;
pub mod databases;
pub mod documents;
pub mod scripts;

// ============================================================================
// SECTION: Shared Decoding
// ============================================================================

use axum::body::Bytes;
use serde_json::Value;

use crate::error::ApiError;
use crate::error::ApiResult;
use crate::state::AppState;

/// Decodes a JSON request body, enforcing the configured size limit.
pub(crate) fn parse_json_body(state: &AppState, bytes: &Bytes) -> ApiResult<Value> {
    if bytes.len() > state.config.max_body_bytes {
        return Err(ApiError::from(cirrus_core::StoreError::PayloadTooLarge {
            limit: state.config.max_body_bytes,
            actual: bytes.len(),
        }));
    }
    if bytes.is_empty() {
        return Err(ApiError::bad_request("request body must be JSON"));
    }
    serde_json::from_slice(bytes)
        .map_err(|err| ApiError::bad_request(format!("request body is not valid JSON: {err}")))
}
