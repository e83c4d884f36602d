// cirrus-server/src/handlers/scripts.rs
// ============================================================================
// Module: Script Handlers
// Description: Trigger, stored procedure, and UDF routes.
// Purpose: Store script bodies verbatim; the emulator never executes them.
// Dependencies: axum, cirrus-core, crate::{envelope, error, handlers, state}
// ============================================================================

//! ## Overview
//! The three script kinds share one handler family parameterized by
//! [`ScriptKind`]; the route table keeps one thin wrapper per kind and
//! method so each path maps to a named handler.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::Response;
use cirrus_core::ScriptKind;

use crate::envelope;
use crate::error::ApiResult;
use crate::handlers::parse_json_body;
use crate::headers::RequestHeaders;
use crate::state::AppState;

// ============================================================================
// SECTION: Shared Operations
// ============================================================================

/// Creates a script resource.
fn create_script(
    state: &AppState,
    db: &str,
    coll: &str,
    kind: ScriptKind,
    body: &Bytes,
) -> ApiResult<Response> {
    let body = parse_json_body(state, body)?;
    let created = state.store.create_script(db, coll, kind, body)?;
    Ok(envelope::json_response(StatusCode::CREATED, &created))
}

/// Lists script resources of one kind.
fn list_scripts(state: &AppState, db: &str, coll: &str, kind: ScriptKind) -> ApiResult<Response> {
    let scripts = state.store.list_scripts(db, coll, kind)?;
    let rid = state.store.collection_rid(db, coll)?;
    let body = envelope::list_body(&rid, kind.envelope_member(), scripts);
    Ok(envelope::json_response(StatusCode::OK, &body))
}

/// Reads one script resource.
fn get_script(
    state: &AppState,
    db: &str,
    coll: &str,
    kind: ScriptKind,
    id: &str,
) -> ApiResult<Response> {
    let script = state.store.get_script(db, coll, kind, id)?;
    Ok(envelope::json_response(StatusCode::OK, &script))
}

/// Replaces one script resource.
fn replace_script(
    state: &AppState,
    db: &str,
    coll: &str,
    kind: ScriptKind,
    id: &str,
    headers: &HeaderMap,
    body: &Bytes,
) -> ApiResult<Response> {
    let headers = RequestHeaders::extract(headers)?;
    let body = parse_json_body(state, body)?;
    let replaced =
        state.store.replace_script(db, coll, kind, id, body, headers.if_match.as_deref())?;
    Ok(envelope::json_response(StatusCode::OK, &replaced))
}

/// Deletes one script resource.
fn delete_script(
    state: &AppState,
    db: &str,
    coll: &str,
    kind: ScriptKind,
    id: &str,
) -> ApiResult<Response> {
    state.store.delete_script(db, coll, kind, id)?;
    Ok(envelope::empty_response(StatusCode::NO_CONTENT))
}

// ============================================================================
// SECTION: Trigger Routes
// ============================================================================

/// `POST /dbs/:db/colls/:coll/triggers`
pub async fn create_trigger(
    State(state): State<Arc<AppState>>,
    Path((db, coll)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<Response> {
    create_script(&state, &db, &coll, ScriptKind::Trigger, &body)
}

/// `GET /dbs/:db/colls/:coll/triggers`
pub async fn list_triggers(
    State(state): State<Arc<AppState>>,
    Path((db, coll)): Path<(String, String)>,
) -> ApiResult<Response> {
    list_scripts(&state, &db, &coll, ScriptKind::Trigger)
}

/// `GET /dbs/:db/colls/:coll/triggers/:id`
pub async fn get_trigger(
    State(state): State<Arc<AppState>>,
    Path((db, coll, id)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    get_script(&state, &db, &coll, ScriptKind::Trigger, &id)
}

/// `PUT /dbs/:db/colls/:coll/triggers/:id`
pub async fn replace_trigger(
    State(state): State<Arc<AppState>>,
    Path((db, coll, id)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    replace_script(&state, &db, &coll, ScriptKind::Trigger, &id, &headers, &body)
}

/// `DELETE /dbs/:db/colls/:coll/triggers/:id`
pub async fn delete_trigger(
    State(state): State<Arc<AppState>>,
    Path((db, coll, id)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    delete_script(&state, &db, &coll, ScriptKind::Trigger, &id)
}

// ============================================================================
// SECTION: Stored Procedure Routes
// ============================================================================

/// `POST /dbs/:db/colls/:coll/sprocs`
pub async fn create_sproc(
    State(state): State<Arc<AppState>>,
    Path((db, coll)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<Response> {
    create_script(&state, &db, &coll, ScriptKind::StoredProcedure, &body)
}

/// `GET /dbs/:db/colls/:coll/sprocs`
pub async fn list_sprocs(
    State(state): State<Arc<AppState>>,
    Path((db, coll)): Path<(String, String)>,
) -> ApiResult<Response> {
    list_scripts(&state, &db, &coll, ScriptKind::StoredProcedure)
}

/// `GET /dbs/:db/colls/:coll/sprocs/:id`
pub async fn get_sproc(
    State(state): State<Arc<AppState>>,
    Path((db, coll, id)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    get_script(&state, &db, &coll, ScriptKind::StoredProcedure, &id)
}

/// `PUT /dbs/:db/colls/:coll/sprocs/:id`
pub async fn replace_sproc(
    State(state): State<Arc<AppState>>,
    Path((db, coll, id)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    replace_script(&state, &db, &coll, ScriptKind::StoredProcedure, &id, &headers, &body)
}

/// `DELETE /dbs/:db/colls/:coll/sprocs/:id`
pub async fn delete_sproc(
    State(state): State<Arc<AppState>>,
    Path((db, coll, id)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    delete_script(&state, &db, &coll, ScriptKind::StoredProcedure, &id)
}

// ============================================================================
// SECTION: User-Defined Function Routes
// ============================================================================

/// `POST /dbs/:db/colls/:coll/udfs`
pub async fn create_udf(
    State(state): State<Arc<AppState>>,
    Path((db, coll)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<Response> {
    create_script(&state, &db, &coll, ScriptKind::UserDefinedFunction, &body)
}

/// `GET /dbs/:db/colls/:coll/udfs`
pub async fn list_udfs(
    State(state): State<Arc<AppState>>,
    Path((db, coll)): Path<(String, String)>,
) -> ApiResult<Response> {
    list_scripts(&state, &db, &coll, ScriptKind::UserDefinedFunction)
}

/// `GET /dbs/:db/colls/:coll/udfs/:id`
pub async fn get_udf(
    State(state): State<Arc<AppState>>,
    Path((db, coll, id)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    get_script(&state, &db, &coll, ScriptKind::UserDefinedFunction, &id)
}

/// `PUT /dbs/:db/colls/:coll/udfs/:id`
pub async fn replace_udf(
    State(state): State<Arc<AppState>>,
    Path((db, coll, id)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    replace_script(&state, &db, &coll, ScriptKind::UserDefinedFunction, &id, &headers, &body)
}

/// `DELETE /dbs/:db/colls/:coll/udfs/:id`
pub async fn delete_udf(
    State(state): State<Arc<AppState>>,
    Path((db, coll, id)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    delete_script(&state, &db, &coll, ScriptKind::UserDefinedFunction, &id)
}
