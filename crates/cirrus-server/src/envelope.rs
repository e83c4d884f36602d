// cirrus-server/src/envelope.rs
// ============================================================================
// Module: Response Envelopes
// Description: Wire-shaped list and entity responses with the service's
//              standard headers.
// Purpose: Keep the bit-exact envelope logic in one place.
// Dependencies: axum, serde_json, uuid
// ============================================================================

//! ## Overview
//! Every list response is `{"_rid": …, "<kind>": […], "_count": N}` and
//! every response carries `x-ms-request-charge` (a synthetic constant) and a
//! fresh `x-ms-activity-id`. Truncated result sets additionally carry the
//! continuation token header.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use serde_json::Map;
use serde_json::Value;
use uuid::Uuid;

// ============================================================================
// SECTION: Header Names
// ============================================================================

/// Synthetic request charge attached to every response.
pub const REQUEST_CHARGE: &str = "1";
/// Request charge header.
pub const HEADER_REQUEST_CHARGE: &str = "x-ms-request-charge";
/// Activity id header.
pub const HEADER_ACTIVITY_ID: &str = "x-ms-activity-id";
/// Continuation token header.
pub const HEADER_CONTINUATION: &str = "x-ms-continuation";

// ============================================================================
// SECTION: Body Builders
// ============================================================================

/// Builds the standard list envelope.
///
/// Member order is part of the wire shape: `_rid`, then the kind list, then
/// `_count`.
#[must_use]
pub fn list_body(rid: &str, member: &str, items: Vec<Value>) -> Value {
    let mut body = Map::new();
    body.insert("_rid".to_string(), Value::String(rid.to_string()));
    let count = items.len();
    body.insert(member.to_string(), Value::Array(items));
    body.insert("_count".to_string(), Value::from(count));
    Value::Object(body)
}

// ============================================================================
// SECTION: Response Builders
// ============================================================================

/// Builds a JSON response with the standard headers.
#[must_use]
pub fn json_response(status: StatusCode, body: &Value) -> Response {
    let payload = serde_json::to_vec(body).unwrap_or_default();
    let mut response = (status, payload).into_response();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    apply_common_headers(&mut response);
    response
}

/// Builds an empty response with the standard headers.
#[must_use]
pub fn empty_response(status: StatusCode) -> Response {
    let mut response = status.into_response();
    apply_common_headers(&mut response);
    response
}

/// Attaches a continuation token header to a response.
#[must_use]
pub fn with_continuation(mut response: Response, token: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(token) {
        response.headers_mut().insert(HEADER_CONTINUATION, value);
    }
    response
}

/// Stamps the charge and activity-id headers every response carries.
fn apply_common_headers(response: &mut Response) {
    let headers = response.headers_mut();
    headers.insert(HEADER_REQUEST_CHARGE, HeaderValue::from_static(REQUEST_CHARGE));
    let activity = Uuid::new_v4().to_string();
    if let Ok(value) = HeaderValue::from_str(&activity) {
        headers.insert(HEADER_ACTIVITY_ID, value);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn list_envelope_carries_rid_count_and_member() {
        let body = list_body("rid-1", "Documents", vec![json!({"id": "a"}), json!({"id": "b"})]);
        assert_eq!(body["_rid"], json!("rid-1"));
        assert_eq!(body["_count"], json!(2));
        assert_eq!(body["Documents"], json!([{"id": "a"}, {"id": "b"}]));
    }

    #[test]
    fn responses_carry_charge_and_activity_headers() {
        let response = json_response(StatusCode::OK, &json!({}));
        assert_eq!(response.headers().get(HEADER_REQUEST_CHARGE).unwrap(), "1");
        assert!(response.headers().contains_key(HEADER_ACTIVITY_ID));
    }
}
