// cirrus-server/src/handlers/documents.rs
// ============================================================================
// Module: Document Handlers
// Description: Point operations and queries over the `/docs` surface.
// Purpose: Route POSTs between create and query on the query header, honor
//          partition-key addressing, and paginate list/query results.
// Dependencies: axum, cirrus-core, cirrus-query, serde_json,
//               crate::{envelope, error, handlers, headers, state}
// ============================================================================

//! ## Overview
//! `POST …/docs` is two operations in one route: a document create (with
//! optional upsert) or, when `x-ms-documentdb-isquery` is set, a query whose
//! body carries the text and parameters. Document listing is itself a scan
//! query, so both feeds share the pagination machinery and continuation
//! tokens.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::Response;
use cirrus_core::PatchOperation;
use serde_json::Value;

use crate::envelope;
use crate::error::ApiError;
use crate::error::ApiResult;
use crate::handlers::parse_json_body;
use crate::headers::RequestHeaders;
use crate::state::AppState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Query text backing the plain document feed (`GET …/docs`).
const LIST_FEED_QUERY: &str = "SELECT * FROM c";

// ============================================================================
// SECTION: Create and Query
// ============================================================================

/// `POST /dbs/:db/colls/:coll/docs`: create, upsert, or query.
pub async fn post(
    State(state): State<Arc<AppState>>,
    Path((db, coll)): Path<(String, String)>,
    header_map: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let headers = RequestHeaders::extract(&header_map)?;
    let body = parse_json_body(&state, &body)?;
    if headers.is_query {
        let (text, params) = decode_query_body(&body)?;
        return run_query(&state, &db, &coll, &text, &params, &headers);
    }
    let (created_body, created) =
        state.store.create_document(&db, &coll, body, headers.is_upsert, headers.if_match.as_deref())?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok(envelope::json_response(status, &created_body))
}

/// `GET /dbs/:db/colls/:coll/docs`: the paginated document feed.
pub async fn list(
    State(state): State<Arc<AppState>>,
    Path((db, coll)): Path<(String, String)>,
    header_map: HeaderMap,
) -> ApiResult<Response> {
    let headers = RequestHeaders::extract(&header_map)?;
    run_query(&state, &db, &coll, LIST_FEED_QUERY, &BTreeMap::new(), &headers)
}

/// Decodes the documented query body shape.
fn decode_query_body(body: &Value) -> ApiResult<(String, BTreeMap<String, Value>)> {
    let Some(text) = body.get("query").and_then(Value::as_str) else {
        return Err(ApiError::bad_request("query body requires a 'query' string"));
    };
    let mut params = BTreeMap::new();
    if let Some(raw) = body.get("parameters") {
        let Some(list) = raw.as_array() else {
            return Err(ApiError::bad_request("'parameters' must be an array"));
        };
        for entry in list {
            let Some(name) = entry.get("name").and_then(Value::as_str) else {
                return Err(ApiError::bad_request("each parameter requires a 'name'"));
            };
            if !name.starts_with('@') {
                return Err(ApiError::bad_request(format!(
                    "parameter name '{name}' must start with '@'"
                )));
            }
            let value = entry.get("value").cloned().unwrap_or(Value::Null);
            params.insert(name.to_string(), value);
        }
    }
    Ok((text.to_string(), params))
}

/// Runs a query or feed read and shapes the paginated envelope.
fn run_query(
    state: &AppState,
    db: &str,
    coll: &str,
    text: &str,
    params: &BTreeMap<String, Value>,
    headers: &RequestHeaders,
) -> ApiResult<Response> {
    let query = cirrus_query::parse_query(text)?;
    let partition_count = state.store.partition_count()?;
    if headers.is_query
        && headers.partition_key.is_none()
        && partition_count > 1
        && !headers.enable_cross_partition
    {
        return Err(ApiError::bad_request(
            "cross-partition query is disabled; set x-ms-documentdb-query-enablecrosspartition \
             or address a single partition key",
        ));
    }
    let partitions =
        state.store.documents_by_partition(db, coll, headers.partition_key_slice())?;
    let options = cirrus_query::QueryOptions {
        page_size: headers.max_item_count.unwrap_or(state.config.default_page_size),
        continuation: headers.continuation.clone(),
        cancel: cirrus_query::CancellationFlag::new(),
    };
    let page = cirrus_query::execute(&query, text, params, &partitions, &options)?;
    let rid = state.store.collection_rid(db, coll)?;
    let body = envelope::list_body(&rid, "Documents", page.rows);
    let mut response = envelope::json_response(StatusCode::OK, &body);
    if let Some(token) = page.continuation {
        response = envelope::with_continuation(response, &token);
    }
    Ok(response)
}

// ============================================================================
// SECTION: Point Operations
// ============================================================================

/// `GET /dbs/:db/colls/:coll/docs/:doc`
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path((db, coll, doc)): Path<(String, String, String)>,
    header_map: HeaderMap,
) -> ApiResult<Response> {
    let headers = RequestHeaders::extract(&header_map)?;
    let document =
        state.store.read_document(&db, &coll, headers.partition_key_slice(), &doc)?;
    if let Some(asserted) = headers.if_none_match.as_deref() {
        let current = document.get("_etag").and_then(Value::as_str).unwrap_or_default();
        if asserted == current {
            return Ok(envelope::empty_response(StatusCode::NOT_MODIFIED));
        }
    }
    Ok(envelope::json_response(StatusCode::OK, &document))
}

/// `PUT /dbs/:db/colls/:coll/docs/:doc`
pub async fn replace(
    State(state): State<Arc<AppState>>,
    Path((db, coll, doc)): Path<(String, String, String)>,
    header_map: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let headers = RequestHeaders::extract(&header_map)?;
    let body = parse_json_body(&state, &body)?;
    let replaced = state.store.replace_document(
        &db,
        &coll,
        headers.partition_key_slice(),
        &doc,
        body,
        headers.if_match.as_deref(),
    )?;
    Ok(envelope::json_response(StatusCode::OK, &replaced))
}

/// `PATCH /dbs/:db/colls/:coll/docs/:doc`
pub async fn patch(
    State(state): State<Arc<AppState>>,
    Path((db, coll, doc)): Path<(String, String, String)>,
    header_map: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let headers = RequestHeaders::extract(&header_map)?;
    let body = parse_json_body(&state, &body)?;
    let operations = decode_patch_body(&body)?;
    let patched = state.store.patch_document(
        &db,
        &coll,
        headers.partition_key_slice(),
        &doc,
        &operations,
        headers.if_match.as_deref(),
    )?;
    Ok(envelope::json_response(StatusCode::OK, &patched))
}

/// `DELETE /dbs/:db/colls/:coll/docs/:doc`
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path((db, coll, doc)): Path<(String, String, String)>,
    header_map: HeaderMap,
) -> ApiResult<Response> {
    let headers = RequestHeaders::extract(&header_map)?;
    state.store.delete_document(
        &db,
        &coll,
        headers.partition_key_slice(),
        &doc,
        headers.if_match.as_deref(),
    )?;
    Ok(envelope::empty_response(StatusCode::NO_CONTENT))
}

/// Decodes a patch body: `{"operations": […]}` or a bare operation array.
fn decode_patch_body(body: &Value) -> ApiResult<Vec<PatchOperation>> {
    let raw = match body {
        Value::Array(_) => body,
        Value::Object(map) => map
            .get("operations")
            .ok_or_else(|| ApiError::bad_request("patch body requires 'operations'"))?,
        _ => return Err(ApiError::bad_request("patch body must be an object or array")),
    };
    serde_json::from_value(raw.clone())
        .map_err(|err| ApiError::bad_request(format!("invalid patch operations: {err}")))
}
