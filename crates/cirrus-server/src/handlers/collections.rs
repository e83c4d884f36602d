// cirrus-server/src/handlers/collections.rs
// ============================================================================
// Module: Collection Handlers
// Description: CRUD over the `/dbs/:db/colls` surface plus pkranges.
// Purpose: Map collection operations onto the store and the list envelope.
// Dependencies: axum, serde_json, crate::{envelope, error, handlers, state}
// ============================================================================

//! Collection routes: create, list, read, delete, and the partition-key
//! range feed clients use to plan cross-partition queries.

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

/// `POST /dbs/:db/colls`
pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(db): Path<String>,
    body: Bytes,
) -> ApiResult<Response> {
    let body = parse_json_body(&state, &body)?;
    let created = state.store.create_collection(&db, body)?;
    Ok(envelope::json_response(StatusCode::CREATED, &created))
}

/// `GET /dbs/:db/colls`
pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(db): Path<String>,
) -> ApiResult<Response> {
    let collections = state.store.list_collections(&db)?;
    let database = state.store.get_database(&db)?;
    let rid = database.get("_rid").and_then(|rid| rid.as_str()).unwrap_or_default();
    let body = envelope::list_body(rid, "DocumentCollections", collections);
    Ok(envelope::json_response(StatusCode::OK, &body))
}

/// `GET /dbs/:db/colls/:coll`
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path((db, coll)): Path<(String, String)>,
) -> ApiResult<Response> {
    let collection = state.store.get_collection(&db, &coll)?;
    Ok(envelope::json_response(StatusCode::OK, &collection))
}

/// `DELETE /dbs/:db/colls/:coll`
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path((db, coll)): Path<(String, String)>,
) -> ApiResult<Response> {
    state.store.delete_collection(&db, &coll)?;
    Ok(envelope::empty_response(StatusCode::NO_CONTENT))
}

/// `GET /dbs/:db/colls/:coll/pkranges`
pub async fn partition_key_ranges(
    State(state): State<Arc<AppState>>,
    Path((db, coll)): Path<(String, String)>,
) -> ApiResult<Response> {
    let ranges = state.store.partition_key_ranges(&db, &coll)?;
    let rid = state.store.collection_rid(&db, &coll)?;
    let body = envelope::list_body(&rid, "PartitionKeyRanges", ranges);
    Ok(envelope::json_response(StatusCode::OK, &body))
}
