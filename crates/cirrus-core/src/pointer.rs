// cirrus-core/src/pointer.rs
// ============================================================================
// Module: JSON Pointer Paths
// Description: Slash-path parsing and resolution over JSON documents.
// Purpose: Shared path machinery for partition-key definitions and patch
//          operation targets.
// Dependencies: serde_json, crate::error
// ============================================================================

//! ## Overview
//! Partition-key definitions and patch operations both address document
//! members with `/a/b/0` style paths. Parsing is strict: a path must begin
//! with a slash and contain no empty segments. Resolution never fails; a
//! missing member resolves to `None`, which callers treat as the protocol's
//! undefined marker.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::error::StoreError;
use crate::error::StoreResult;

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Splits a slash path into unescaped segments.
///
/// Follows JSON-pointer escaping: `~1` is a literal slash, `~0` a literal
/// tilde. The root path `/` alone is rejected because the protocol never
/// addresses the whole document.
///
/// # Errors
///
/// Returns [`StoreError::BadRequest`] when the path is empty, does not start
/// with a slash, or contains an empty segment.
pub fn split_path(path: &str) -> StoreResult<Vec<String>> {
    let Some(rest) = path.strip_prefix('/') else {
        return Err(StoreError::bad_request(format!(
            "path '{path}' must start with '/'"
        )));
    };
    if rest.is_empty() {
        return Err(StoreError::bad_request("path must address a document member"));
    }
    let mut segments = Vec::new();
    for raw in rest.split('/') {
        if raw.is_empty() {
            return Err(StoreError::bad_request(format!(
                "path '{path}' contains an empty segment"
            )));
        }
        segments.push(raw.replace("~1", "/").replace("~0", "~"));
    }
    Ok(segments)
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Resolves parsed segments against a document.
///
/// Objects are addressed by key, arrays by decimal index. Any miss (absent
/// key, out-of-range index, non-container step) resolves to `None`.
#[must_use]
pub fn resolve<'a>(document: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let mut current = document;
    for segment in segments {
        match current {
            Value::Object(map) => current = map.get(segment)?,
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                current = items.get(index)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

/// Resolves a slash path against a document, parsing it first.
///
/// # Errors
///
/// Returns [`StoreError::BadRequest`] when the path itself is malformed.
pub fn resolve_path<'a>(document: &'a Value, path: &str) -> StoreResult<Option<&'a Value>> {
    let segments = split_path(path)?;
    Ok(resolve(document, &segments))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn splits_and_unescapes_segments() {
        let segments = split_path("/a/b~1c/d~0e").expect("path parses");
        assert_eq!(segments, vec!["a", "b/c", "d~e"]);
    }

    #[test]
    fn rejects_malformed_paths() {
        assert!(split_path("a/b").is_err());
        assert!(split_path("/").is_err());
        assert!(split_path("/a//b").is_err());
        assert!(split_path("").is_err());
    }

    #[test]
    fn resolves_nested_members_and_array_indexes() {
        let doc = json!({"a": {"b": [10, {"c": true}]}});
        assert_eq!(resolve_path(&doc, "/a/b/0").unwrap(), Some(&json!(10)));
        assert_eq!(resolve_path(&doc, "/a/b/1/c").unwrap(), Some(&json!(true)));
        assert_eq!(resolve_path(&doc, "/a/x").unwrap(), None);
        assert_eq!(resolve_path(&doc, "/a/b/9").unwrap(), None);
    }
}
