// cirrus-core/src/catalog.rs
// ============================================================================
// Module: Catalog Types
// Description: Entity stamps, partition-key definitions, and script kinds.
// Purpose: Describe the hierarchical catalog (database → collection →
//          documents/scripts) independent of storage layout.
// Dependencies: serde, serde_json, uuid, crate::{error, pointer}
// ============================================================================

//! ## Overview
//! Catalog entities are stored as their wire JSON bodies. On every write the
//! store stamps the server-owned members: `_rid` (stable resource id),
//! `_self` (stable self-link), `_etag` (quoted monotonic counter), and `_ts`
//! (seconds since epoch). Parent/child relations are by id, never by
//! cross-pointer, so traversal always goes through the store and snapshot
//! serialization stays trivial.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::StoreError;
use crate::error::StoreResult;
use crate::pointer;

// ============================================================================
// SECTION: Server Stamps
// ============================================================================

/// Document members owned by the server and rejected in client payloads
/// where the protocol forbids writing them.
pub const SYSTEM_MEMBERS: [&str; 5] = ["_rid", "_self", "_etag", "_ts", "_attachments"];

/// Mints a fresh resource id.
#[must_use]
pub fn new_resource_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Returns the current time as whole seconds since the Unix epoch.
#[must_use]
pub fn unix_timestamp() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_secs())
}

/// Formats an etag counter value as the protocol's quoted string.
///
/// The quotes are part of the value: clients send `If-Match` headers that
/// include them and the comparison is over raw strings.
#[must_use]
pub fn format_etag(counter: u64) -> String {
    format!("\"{counter}\"")
}

/// Stamps the server-owned members onto an entity body.
///
/// `_rid` and `_self` are written only when absent so they stay stable for
/// the entity's lifetime; `_etag` and `_ts` are overwritten on every call.
pub fn stamp_entity(body: &mut Value, rid: &str, self_link: &str, etag: &str, ts: u64) {
    if let Value::Object(map) = body {
        map.entry("_rid".to_string()).or_insert_with(|| Value::String(rid.to_string()));
        map.entry("_self".to_string()).or_insert_with(|| Value::String(self_link.to_string()));
        map.insert("_etag".to_string(), Value::String(etag.to_string()));
        map.insert("_ts".to_string(), Value::from(ts));
    }
}

/// Reads the `id` member of an entity body as a string.
///
/// # Errors
///
/// Returns [`StoreError::BadRequest`] when `id` is present but not a string
/// or is empty.
pub fn entity_id(body: &Value) -> StoreResult<Option<String>> {
    match body.get("id") {
        None => Ok(None),
        Some(Value::String(id)) if !id.is_empty() => Ok(Some(id.clone())),
        Some(_) => Err(StoreError::bad_request("entity 'id' must be a non-empty string")),
    }
}

/// Reads a stamped member of an entity body as a string.
#[must_use]
pub fn stamped_string(body: &Value, member: &str) -> String {
    body.get(member).and_then(Value::as_str).unwrap_or_default().to_string()
}

// ============================================================================
// SECTION: Partition Key Definition
// ============================================================================

/// Partition-key definition carried by a collection.
///
/// Paths are slash paths into a document; the list must be non-empty. The
/// `kind` and `version` members are round-tripped for clients but only the
/// paths participate in partition derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionKeyDefinition {
    /// Slash paths resolved against each document.
    pub paths: Vec<String>,
    /// Partitioning scheme label, round-tripped verbatim.
    #[serde(default = "default_partition_kind")]
    pub kind: String,
    /// Definition version, round-tripped verbatim.
    #[serde(default = "default_partition_version")]
    pub version: u64,
}

fn default_partition_kind() -> String {
    "Hash".to_string()
}

const fn default_partition_version() -> u64 {
    1
}

impl PartitionKeyDefinition {
    /// Parses the definition out of a collection body.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BadRequest`] when the member is missing, fails
    /// to deserialize, lists no paths, or lists a malformed path.
    pub fn from_collection_body(body: &Value) -> StoreResult<Self> {
        let Some(raw) = body.get("partitionKey") else {
            return Err(StoreError::bad_request(
                "collection body requires a 'partitionKey' definition",
            ));
        };
        let definition: Self = serde_json::from_value(raw.clone())
            .map_err(|err| StoreError::bad_request(format!("invalid partitionKey: {err}")))?;
        if definition.paths.is_empty() {
            return Err(StoreError::bad_request("partitionKey requires at least one path"));
        }
        for path in &definition.paths {
            pointer::split_path(path)?;
        }
        Ok(definition)
    }
}

// ============================================================================
// SECTION: Script Kinds
// ============================================================================

/// The three server-side script resources owned by a collection.
///
/// Scripts are stored verbatim and never executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScriptKind {
    /// Pre/post operation trigger.
    Trigger,
    /// Stored procedure.
    StoredProcedure,
    /// User-defined function.
    UserDefinedFunction,
}

impl ScriptKind {
    /// All script kinds in route order.
    pub const ALL: [Self; 3] = [Self::Trigger, Self::StoredProcedure, Self::UserDefinedFunction];

    /// URL path segment for the kind.
    #[must_use]
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::Trigger => "triggers",
            Self::StoredProcedure => "sprocs",
            Self::UserDefinedFunction => "udfs",
        }
    }

    /// List-envelope member name for the kind.
    #[must_use]
    pub const fn envelope_member(self) -> &'static str {
        match self {
            Self::Trigger => "Triggers",
            Self::StoredProcedure => "StoredProcedures",
            Self::UserDefinedFunction => "UserDefinedFunctions",
        }
    }

    /// Human-readable label used in error messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::StoredProcedure => "stored procedure",
            Self::UserDefinedFunction => "user-defined function",
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn stamping_preserves_identity_members() {
        let mut body = json!({"id": "db1"});
        stamp_entity(&mut body, "rid-1", "dbs/rid-1/", "\"1\"", 100);
        stamp_entity(&mut body, "rid-2", "dbs/rid-2/", "\"2\"", 200);
        assert_eq!(body["_rid"], json!("rid-1"));
        assert_eq!(body["_self"], json!("dbs/rid-1/"));
        assert_eq!(body["_etag"], json!("\"2\""));
        assert_eq!(body["_ts"], json!(200));
    }

    #[test]
    fn partition_key_requires_paths() {
        let missing = json!({"id": "c"});
        assert!(PartitionKeyDefinition::from_collection_body(&missing).is_err());

        let empty = json!({"id": "c", "partitionKey": {"paths": []}});
        assert!(PartitionKeyDefinition::from_collection_body(&empty).is_err());

        let good = json!({"id": "c", "partitionKey": {"paths": ["/pk"]}});
        let definition = PartitionKeyDefinition::from_collection_body(&good).expect("parses");
        assert_eq!(definition.paths, vec!["/pk"]);
        assert_eq!(definition.kind, "Hash");
        assert_eq!(definition.version, 1);
    }

    #[test]
    fn entity_id_validates_shape() {
        assert_eq!(entity_id(&json!({"id": "a"})).unwrap(), Some("a".to_string()));
        assert_eq!(entity_id(&json!({})).unwrap(), None);
        assert!(entity_id(&json!({"id": 7})).is_err());
        assert!(entity_id(&json!({"id": ""})).is_err());
    }
}
