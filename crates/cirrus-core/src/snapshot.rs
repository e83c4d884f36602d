// cirrus-core/src/snapshot.rs
// ============================================================================
// Module: Snapshot Codec
// Description: Whole-store export and import as a single JSON document.
// Purpose: Fixture reuse across runs; import is all-or-nothing.
// Dependencies: serde_json, crate::{catalog, error, partition, store}
// ============================================================================

//! ## Overview
//! The snapshot is one JSON object with flat entity lists:
//! `{"Databases": […], "Collections": […], "Documents": […], "Triggers": […],
//! "Sprocs": […], "UDFs": […]}`. Every entry is the entity's full
//! server-stamped form; hierarchy is recovered on import from the stable
//! self-links, which embed the parent resource ids. Import builds a complete
//! candidate state before swapping it in, so a failed import leaves the
//! prior state untouched.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Map;
use serde_json::Value;

use crate::catalog;
use crate::catalog::PartitionKeyDefinition;
use crate::catalog::ScriptKind;
use crate::error::StoreError;
use crate::error::StoreResult;
use crate::partition;
use crate::store::CollectionEntry;
use crate::store::DataStore;
use crate::store::DatabaseEntry;
use crate::store::DocumentEntry;
use crate::store::Partition;
use crate::store::StoreInner;

// ============================================================================
// SECTION: Export
// ============================================================================

/// Exports the whole store as a single JSON document.
///
/// Databases and collections appear in id order, documents in partition
/// order then insertion order, so repeated exports of an unchanged store are
/// byte-identical.
///
/// # Errors
///
/// Returns [`StoreError::Internal`] when the store mutex is poisoned.
pub fn export(store: &DataStore) -> StoreResult<Value> {
    let guard = store.lock()?;
    let mut databases = Vec::new();
    let mut collections = Vec::new();
    let mut documents = Vec::new();
    let mut triggers = Vec::new();
    let mut sprocs = Vec::new();
    let mut udfs = Vec::new();
    for database in guard.databases.values() {
        databases.push(database.body.clone());
        for entry in database.collections.values() {
            collections.push(entry.body.clone());
            for partition in &entry.partitions {
                for document in &partition.documents {
                    documents.push(document.body.clone());
                }
            }
            triggers.extend(entry.triggers.values().cloned());
            sprocs.extend(entry.sprocs.values().cloned());
            udfs.extend(entry.udfs.values().cloned());
        }
    }
    let mut snapshot = Map::new();
    snapshot.insert("Databases".to_string(), Value::Array(databases));
    snapshot.insert("Collections".to_string(), Value::Array(collections));
    snapshot.insert("Documents".to_string(), Value::Array(documents));
    snapshot.insert("Triggers".to_string(), Value::Array(triggers));
    snapshot.insert("Sprocs".to_string(), Value::Array(sprocs));
    snapshot.insert("UDFs".to_string(), Value::Array(udfs));
    Ok(Value::Object(snapshot))
}

/// Exports the whole store as UTF-8 JSON bytes.
///
/// # Errors
///
/// Returns [`StoreError::Internal`] when serialization fails.
pub fn export_bytes(store: &DataStore) -> StoreResult<Vec<u8>> {
    let snapshot = export(store)?;
    serde_json::to_vec_pretty(&snapshot)
        .map_err(|err| StoreError::internal(format!("snapshot serialization failed: {err}")))
}

// ============================================================================
// SECTION: Import
// ============================================================================

/// Replaces the store state from snapshot bytes.
///
/// # Errors
///
/// Returns [`StoreError::BadRequest`] when the bytes are not valid UTF-8
/// JSON or fail validation; the prior state is retained on any failure.
pub fn import_bytes(store: &DataStore, bytes: &[u8]) -> StoreResult<()> {
    let snapshot: Value = serde_json::from_slice(bytes)
        .map_err(|err| StoreError::bad_request(format!("snapshot is not valid JSON: {err}")))?;
    import(store, &snapshot)
}

/// Replaces the store state from a parsed snapshot document.
///
/// # Errors
///
/// Returns [`StoreError::BadRequest`] on any validation failure; the prior
/// state is retained.
pub fn import(store: &DataStore, snapshot: &Value) -> StoreResult<()> {
    let partition_count = store.partition_count()?;
    let state = build_state(snapshot, partition_count)?;
    store.replace_state(state)
}

/// Builds a complete candidate state from the snapshot document.
fn build_state(snapshot: &Value, partition_count: usize) -> StoreResult<StoreInner> {
    let Value::Object(root) = snapshot else {
        return Err(StoreError::bad_request("snapshot must be a JSON object"));
    };
    let mut etag_counter = 0_u64;
    let mut databases: BTreeMap<String, DatabaseEntry> = BTreeMap::new();
    // Resource-id lookups recovered from self-links.
    let mut database_ids: BTreeMap<String, String> = BTreeMap::new();
    let mut collection_ids: BTreeMap<String, (String, String)> = BTreeMap::new();

    for body in entity_list(root, "Databases")? {
        let id = required_id(body, "database")?;
        let rid = required_stamp(body, "database", "_rid")?;
        track_etag(&mut etag_counter, body);
        if databases.contains_key(&id) {
            return Err(StoreError::bad_request(format!(
                "snapshot lists database '{id}' twice"
            )));
        }
        database_ids.insert(rid, id.clone());
        databases.insert(
            id,
            DatabaseEntry {
                body: body.clone(),
                collections: BTreeMap::new(),
            },
        );
    }

    for body in entity_list(root, "Collections")? {
        let id = required_id(body, "collection")?;
        let rid = required_stamp(body, "collection", "_rid")?;
        let self_link = required_stamp(body, "collection", "_self")?;
        let partition_key = PartitionKeyDefinition::from_collection_body(body)?;
        track_etag(&mut etag_counter, body);
        let parent_rid = link_segment(&self_link, "dbs").ok_or_else(|| {
            StoreError::bad_request(format!("collection '{id}' has a malformed self-link"))
        })?;
        let db_id = database_ids.get(&parent_rid).ok_or_else(|| {
            StoreError::bad_request(format!("collection '{id}' references an unknown database"))
        })?;
        let database = databases.get_mut(db_id).ok_or_else(|| {
            StoreError::internal(format!("database '{db_id}' vanished during import"))
        })?;
        if database.collections.contains_key(&id) {
            return Err(StoreError::bad_request(format!(
                "snapshot lists collection '{id}' twice"
            )));
        }
        collection_ids.insert(rid, (db_id.clone(), id.clone()));
        database.collections.insert(
            id,
            CollectionEntry {
                body: body.clone(),
                partition_key,
                partitions: vec![Partition::default(); partition_count],
                triggers: BTreeMap::new(),
                sprocs: BTreeMap::new(),
                udfs: BTreeMap::new(),
            },
        );
    }

    for body in entity_list(root, "Documents")? {
        let id = required_id(body, "document")?;
        let self_link = required_stamp(body, "document", "_self")?;
        track_etag(&mut etag_counter, body);
        let entry = resolve_collection(
            &mut databases,
            &collection_ids,
            &self_link,
            &format!("document '{id}'"),
        )?;
        let tuple = partition::resolve_tuple(body, &entry.partition_key);
        let index = partition::partition_index(&tuple, entry.partitions.len().max(1));
        entry.partitions[index].documents.push(DocumentEntry {
            id,
            key_tuple: tuple,
            body: body.clone(),
        });
    }

    for (member, kind) in [
        ("Triggers", ScriptKind::Trigger),
        ("Sprocs", ScriptKind::StoredProcedure),
        ("UDFs", ScriptKind::UserDefinedFunction),
    ] {
        for body in entity_list(root, member)? {
            let id = required_id(body, kind.label())?;
            let self_link = required_stamp(body, kind.label(), "_self")?;
            track_etag(&mut etag_counter, body);
            let entry = resolve_collection(
                &mut databases,
                &collection_ids,
                &self_link,
                &format!("{} '{id}'", kind.label()),
            )?;
            let scripts = match kind {
                ScriptKind::Trigger => &mut entry.triggers,
                ScriptKind::StoredProcedure => &mut entry.sprocs,
                ScriptKind::UserDefinedFunction => &mut entry.udfs,
            };
            scripts.insert(id, body.clone());
        }
    }

    Ok(StoreInner {
        databases,
        etag_counter,
        partition_count,
    })
}

// ============================================================================
// SECTION: Import Helpers
// ============================================================================

/// Reads one of the snapshot's entity lists; a missing member is empty.
fn entity_list<'a>(root: &'a Map<String, Value>, member: &str) -> StoreResult<Vec<&'a Value>> {
    match root.get(member) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.iter().collect()),
        Some(_) => Err(StoreError::bad_request(format!(
            "snapshot member '{member}' must be an array"
        ))),
    }
}

/// Reads a required `id` member from an imported entity.
fn required_id(body: &Value, label: &str) -> StoreResult<String> {
    catalog::entity_id(body)?
        .ok_or_else(|| StoreError::bad_request(format!("snapshot {label} is missing 'id'")))
}

/// Reads a required stamped string member from an imported entity.
fn required_stamp(body: &Value, label: &str, member: &str) -> StoreResult<String> {
    let value = catalog::stamped_string(body, member);
    if value.is_empty() {
        return Err(StoreError::bad_request(format!(
            "snapshot {label} is missing '{member}'"
        )));
    }
    Ok(value)
}

/// Advances the candidate etag counter past an imported entity's etag.
fn track_etag(counter: &mut u64, body: &Value) {
    let etag = catalog::stamped_string(body, "_etag");
    if let Some(numeric) = etag.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) {
        if let Ok(value) = numeric.parse::<u64>() {
            *counter = (*counter).max(value);
        }
    }
}

/// Extracts the resource id following a segment label in a self-link.
fn link_segment(self_link: &str, label: &str) -> Option<String> {
    let mut parts = self_link.split('/');
    while let Some(part) = parts.next() {
        if part == label {
            let rid = parts.next()?;
            if rid.is_empty() {
                return None;
            }
            return Some(rid.to_string());
        }
    }
    None
}

/// Resolves the collection entry a self-link points into.
fn resolve_collection<'a>(
    databases: &'a mut BTreeMap<String, DatabaseEntry>,
    collection_ids: &BTreeMap<String, (String, String)>,
    self_link: &str,
    label: &str,
) -> StoreResult<&'a mut CollectionEntry> {
    let coll_rid = link_segment(self_link, "colls")
        .ok_or_else(|| StoreError::bad_request(format!("{label} has a malformed self-link")))?;
    let (db_id, coll_id) = collection_ids.get(&coll_rid).ok_or_else(|| {
        StoreError::bad_request(format!("{label} references an unknown collection"))
    })?;
    databases
        .get_mut(db_id)
        .and_then(|database| database.collections.get_mut(coll_id))
        .ok_or_else(|| StoreError::internal(format!("{label} parent vanished during import")))
}
