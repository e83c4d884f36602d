// cirrus-server/src/headers.rs
// ============================================================================
// Module: Request Headers
// Description: Typed extraction of the protocol's `x-ms-*` request headers.
// Purpose: Parse once per request; handlers consume a plain struct.
// Dependencies: axum, serde_json, crate::error
// ============================================================================

//! ## Overview
//! The emulated protocol routes most behavior through request headers:
//! query marking, cross-partition enablement, partition-key addressing,
//! paging, upsert, and etag assertions. Extraction is strict where the
//! protocol is (a malformed partition-key header is a bad request) and
//! lenient where clients vary (boolean headers accept any case).

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::http::HeaderMap;
use serde_json::Value;

use crate::error::ApiError;
use crate::error::ApiResult;

// ============================================================================
// SECTION: Header Names
// ============================================================================

/// Marks a POST to `/docs` as a query.
pub const HEADER_IS_QUERY: &str = "x-ms-documentdb-isquery";
/// Enables cross-partition query execution.
pub const HEADER_ENABLE_CROSS_PARTITION: &str = "x-ms-documentdb-query-enablecrosspartition";
/// JSON array of partition-key values.
pub const HEADER_PARTITION_KEY: &str = "x-ms-documentdb-partitionkey";
/// Page cap for list and query responses.
pub const HEADER_MAX_ITEM_COUNT: &str = "x-ms-max-item-count";
/// Continuation token resuming a prior page.
pub const HEADER_CONTINUATION: &str = "x-ms-continuation";
/// Upsert semantics on document create.
pub const HEADER_IS_UPSERT: &str = "x-ms-documentdb-is-upsert";

// ============================================================================
// SECTION: Typed Headers
// ============================================================================

/// Parsed request headers.
#[derive(Debug, Clone, Default)]
pub struct RequestHeaders {
    /// POST body is a query.
    pub is_query: bool,
    /// Cross-partition execution enabled.
    pub enable_cross_partition: bool,
    /// Partition-key tuple the request addresses.
    pub partition_key: Option<Vec<Value>>,
    /// Page cap requested by the client.
    pub max_item_count: Option<usize>,
    /// Continuation token from a prior page.
    pub continuation: Option<String>,
    /// `If-Match` etag assertion.
    pub if_match: Option<String>,
    /// `If-None-Match` etag assertion.
    pub if_none_match: Option<String>,
    /// Upsert semantics requested.
    pub is_upsert: bool,
}

impl RequestHeaders {
    /// Extracts the typed headers from a request.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the partition-key header is not a JSON
    /// array or the page cap is not an integer.
    pub fn extract(headers: &HeaderMap) -> ApiResult<Self> {
        let partition_key = match header_str(headers, HEADER_PARTITION_KEY) {
            None => None,
            Some(raw) => {
                let parsed: Value = serde_json::from_str(raw).map_err(|_| {
                    ApiError::bad_request(format!(
                        "{HEADER_PARTITION_KEY} must be a JSON array of key values"
                    ))
                })?;
                match parsed {
                    Value::Array(values) => Some(values),
                    other => Some(vec![other]),
                }
            }
        };
        let max_item_count = match header_str(headers, HEADER_MAX_ITEM_COUNT) {
            None => None,
            Some(raw) => {
                let count: i64 = raw.trim().parse().map_err(|_| {
                    ApiError::bad_request(format!("{HEADER_MAX_ITEM_COUNT} must be an integer"))
                })?;
                // The protocol uses -1 for "no explicit cap".
                if count <= 0 {
                    None
                } else {
                    usize::try_from(count).ok()
                }
            }
        };
        Ok(Self {
            is_query: header_bool(headers, HEADER_IS_QUERY),
            enable_cross_partition: header_bool(headers, HEADER_ENABLE_CROSS_PARTITION),
            partition_key,
            max_item_count,
            continuation: header_str(headers, HEADER_CONTINUATION).map(ToString::to_string),
            if_match: header_str(headers, "if-match").map(ToString::to_string),
            if_none_match: header_str(headers, "if-none-match").map(ToString::to_string),
            is_upsert: header_bool(headers, HEADER_IS_UPSERT),
        })
    }

    /// Partition-key tuple as a slice, when present.
    #[must_use]
    pub fn partition_key_slice(&self) -> Option<&[Value]> {
        self.partition_key.as_deref()
    }
}

/// Reads a header as UTF-8, ignoring undecodable values.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Reads a case-insensitive boolean header.
fn header_bool(headers: &HeaderMap, name: &str) -> bool {
    header_str(headers, name).is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
}
