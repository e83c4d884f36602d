// cirrus-server/src/handlers/databases.rs
// ============================================================================
// Module: Database Handlers
// Description: CRUD over the `/dbs` surface.
// Purpose: Map database operations onto the store and the list envelope.
// Dependencies: axum, serde_json, crate::{envelope, error, handlers, state}
// ============================================================================

//! Database routes: create, list, read, delete. Deletes cascade inside the
//! store, so the handler surface stays a straight mapping.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;

use crate::envelope;
use crate::error::ApiResult;
use crate::handlers::parse_json_body;
use crate::state::AppState;

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `POST /dbs`
pub async fn create(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Response> {
    let body = parse_json_body(&state, &body)?;
    let created = state.store.create_database(body)?;
    Ok(envelope::json_response(StatusCode::CREATED, &created))
}

/// `GET /dbs`
pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    let databases = state.store.list_databases()?;
    let body = envelope::list_body("", "Databases", databases);
    Ok(envelope::json_response(StatusCode::OK, &body))
}

/// `GET /dbs/:db`
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(db): Path<String>,
) -> ApiResult<Response> {
    let database = state.store.get_database(&db)?;
    Ok(envelope::json_response(StatusCode::OK, &database))
}

/// `DELETE /dbs/:db`
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(db): Path<String>,
) -> ApiResult<Response> {
    state.store.delete_database(&db)?;
    Ok(envelope::empty_response(StatusCode::NO_CONTENT))
}
