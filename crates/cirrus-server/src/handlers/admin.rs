// cirrus-server/src/handlers/admin.rs
// ============================================================================
// Module: Admin Handlers
// Description: Server banner, offer feed, and snapshot export.
// Purpose: The few routes that address the emulator itself rather than the
//          catalog.
// Dependencies: axum, cirrus-core, serde_json, crate::{envelope, error,
//               state}
// ============================================================================

//! ## Overview
//! `GET /` serves the account banner SDKs probe at startup, `GET /offers`
//! serves a static empty offer feed in the standard envelope, and the export
//! route dumps the whole store as one snapshot document.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use serde_json::json;

use crate::envelope;
use crate::error::ApiResult;
use crate::state::AppState;

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `GET /` serves the account banner.
pub async fn server_info(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    let body = json!({
        "_self": "",
        "id": "cirrus",
        "_rid": "cirrus.documents.localhost",
        "_dbs": "//dbs/",
        "media": "//media/",
        "addresses": "//addresses/",
        "writableLocations": [{
            "name": "Local",
            "databaseAccountEndpoint": format!("https://127.0.0.1:{}/", state.config.port),
        }],
        "readableLocations": [{
            "name": "Local",
            "databaseAccountEndpoint": format!("https://127.0.0.1:{}/", state.config.port),
        }],
        "enableMultipleWriteLocations": false,
        "userConsistencyPolicy": {"defaultConsistencyLevel": "Session"},
    });
    Ok(envelope::json_response(StatusCode::OK, &body))
}

/// `GET /offers` serves the static empty offer feed.
pub async fn offers(State(_state): State<Arc<AppState>>) -> ApiResult<Response> {
    let body = envelope::list_body("", "Offers", Vec::new());
    Ok(envelope::json_response(StatusCode::OK, &body))
}

/// `GET /cirrus/export` dumps the whole store as a snapshot.
pub async fn export(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    let snapshot = cirrus_core::snapshot::export(&state.store)?;
    Ok(envelope::json_response(StatusCode::OK, &snapshot))
}
