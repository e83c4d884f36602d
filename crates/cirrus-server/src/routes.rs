// cirrus-server/src/routes.rs
// ============================================================================
// Module: Route Table and Middleware
// Description: Exact-path dispatch with canonicalization, auth, timeout,
//              and request-log middleware.
// Purpose: One place where the wire surface is enumerated.
// Dependencies: axum, tokio, crate::{auth, error, handlers, logging, state}
// ============================================================================

//! ## Overview
//! Dispatch is exact path-pattern matching; there is no trailing-slash
//! equivalence in the matcher. A prefix middleware rewrites trailing slashes
//! to the canonical form before dispatch (no redirects), then
//! authentication runs, then the server-wide timeout wraps the handler.
//! With debug logging enabled, a final layer emits one record per request.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::Request;
use axum::extract::State;
use axum::http::Uri;
use axum::http::header::AUTHORIZATION;
use axum::middleware;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;

use crate::auth;
use crate::envelope;
use crate::error::ApiError;
use crate::handlers::admin;
use crate::handlers::collections;
use crate::handlers::databases;
use crate::handlers::documents;
use crate::handlers::scripts;
use crate::logging::RequestLogEvent;
use crate::state::AppState;

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the full route table with middleware applied.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    let routes = Router::new()
        .route("/", get(admin::server_info))
        .route("/offers", get(admin::offers))
        .route("/cirrus/export", get(admin::export))
        .route("/dbs", post(databases::create).get(databases::list))
        .route("/dbs/:db", get(databases::get).delete(databases::delete))
        .route("/dbs/:db/colls", post(collections::create).get(collections::list))
        .route("/dbs/:db/colls/:coll", get(collections::get).delete(collections::delete))
        .route("/dbs/:db/colls/:coll/pkranges", get(collections::partition_key_ranges))
        .route("/dbs/:db/colls/:coll/docs", post(documents::post).get(documents::list))
        .route(
            "/dbs/:db/colls/:coll/docs/:doc",
            get(documents::get)
                .put(documents::replace)
                .patch(documents::patch)
                .delete(documents::delete),
        )
        .route(
            "/dbs/:db/colls/:coll/triggers",
            post(scripts::create_trigger).get(scripts::list_triggers),
        )
        .route(
            "/dbs/:db/colls/:coll/triggers/:id",
            get(scripts::get_trigger)
                .put(scripts::replace_trigger)
                .delete(scripts::delete_trigger),
        )
        .route(
            "/dbs/:db/colls/:coll/sprocs",
            post(scripts::create_sproc).get(scripts::list_sprocs),
        )
        .route(
            "/dbs/:db/colls/:coll/sprocs/:id",
            get(scripts::get_sproc).put(scripts::replace_sproc).delete(scripts::delete_sproc),
        )
        .route(
            "/dbs/:db/colls/:coll/udfs",
            post(scripts::create_udf).get(scripts::list_udfs),
        )
        .route(
            "/dbs/:db/colls/:coll/udfs/:id",
            get(scripts::get_udf).put(scripts::replace_udf).delete(scripts::delete_udf),
        );

    // Layer order (innermost first): auth, timeout, slash rewrite, logging.
    routes
        .layer(middleware::from_fn_with_state(Arc::clone(&state), authentication))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), request_timeout))
        .layer(middleware::from_fn(strip_trailing_slashes))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), request_logger))
        .with_state(state)
}

// ============================================================================
// SECTION: Middleware
// ============================================================================

/// Rewrites trailing slashes to the canonical path before dispatch.
async fn strip_trailing_slashes(mut request: Request, next: Next) -> Response {
    let uri = request.uri();
    let path = uri.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed };
        let rewritten = match uri.query() {
            Some(query) => format!("{trimmed}?{query}"),
            None => trimmed.to_string(),
        };
        if let Ok(rewritten) = rewritten.parse::<Uri>() {
            *request.uri_mut() = rewritten;
        }
    }
    next.run(request).await
}

/// Verifies the master key before any handler runs.
async fn authentication(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if auth::is_public_path(request.uri().path()) {
        return next.run(request).await;
    }
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    match auth::authenticate(state.config.account_key.as_deref(), header) {
        Ok(()) => next.run(request).await,
        Err(error) => error.into_response(),
    }
}

/// Bounds handler duration with the server-wide timeout.
async fn request_timeout(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    match tokio::time::timeout(state.config.request_timeout, next.run(request)).await {
        Ok(response) => response,
        Err(_) => ApiError::timeout().into_response(),
    }
}

/// Emits one log record per request through the configured sink.
async fn request_logger(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    let activity_id = response
        .headers()
        .get(envelope::HEADER_ACTIVITY_ID)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string);
    state.log.log(&RequestLogEvent {
        method,
        path,
        status: response.status().as_u16(),
        duration_ms: started.elapsed().as_millis(),
        activity_id,
    });
    response
}
