// cirrus-core/src/store.rs
// ============================================================================
// Module: Data Store
// Description: Partitioned, hierarchical in-memory catalog with optimistic
//              concurrency.
// Purpose: Serve every point operation of the emulator under one lock with
//          deterministic iteration order.
// Dependencies: serde_json, crate::{catalog, error, partition, patch, value}
// ============================================================================

//! ## Overview
//! The store maps `(database, collection, partition, document id)` to a
//! stamped document body, layered under maps for the parent entities and the
//! script resources. All operations serialize on a single mutex; each public
//! method is one critical section, which makes operations against a
//! collection linearizable and keeps the etag advance atomic with the write
//! it stamps.
//!
//! Iteration order is insertion order within a partition. Deletions cascade
//! synchronously: removing a database removes its collections and all of
//! their dependents before the lock is released.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use serde_json::Value;
use serde_json::json;

use crate::catalog;
use crate::catalog::PartitionKeyDefinition;
use crate::catalog::ScriptKind;
use crate::error::StoreError;
use crate::error::StoreResult;
use crate::partition;
use crate::patch;
use crate::patch::PatchOperation;

// ============================================================================
// SECTION: Entries
// ============================================================================

/// One logical partition of a collection.
#[derive(Debug, Default, Clone)]
pub(crate) struct Partition {
    /// Documents in insertion order.
    pub(crate) documents: Vec<DocumentEntry>,
}

/// A stored document with its resolved partition-key tuple.
#[derive(Debug, Clone)]
pub(crate) struct DocumentEntry {
    /// Document `id`.
    pub(crate) id: String,
    /// Resolved partition-key tuple (one entry per definition path).
    pub(crate) key_tuple: Vec<Value>,
    /// Full stamped body.
    pub(crate) body: Value,
}

/// A collection with its documents and script resources.
#[derive(Debug, Clone)]
pub(crate) struct CollectionEntry {
    /// Stamped collection body (indexing policy is round-tripped verbatim).
    pub(crate) body: Value,
    /// Parsed partition-key definition.
    pub(crate) partition_key: PartitionKeyDefinition,
    /// Logical partitions in index order.
    pub(crate) partitions: Vec<Partition>,
    /// Triggers by id.
    pub(crate) triggers: BTreeMap<String, Value>,
    /// Stored procedures by id.
    pub(crate) sprocs: BTreeMap<String, Value>,
    /// User-defined functions by id.
    pub(crate) udfs: BTreeMap<String, Value>,
}

impl CollectionEntry {
    /// Returns the script map for a kind.
    fn scripts(&self, kind: ScriptKind) -> &BTreeMap<String, Value> {
        match kind {
            ScriptKind::Trigger => &self.triggers,
            ScriptKind::StoredProcedure => &self.sprocs,
            ScriptKind::UserDefinedFunction => &self.udfs,
        }
    }

    /// Returns the mutable script map for a kind.
    fn scripts_mut(&mut self, kind: ScriptKind) -> &mut BTreeMap<String, Value> {
        match kind {
            ScriptKind::Trigger => &mut self.triggers,
            ScriptKind::StoredProcedure => &mut self.sprocs,
            ScriptKind::UserDefinedFunction => &mut self.udfs,
        }
    }

    /// Resource id stamped on the collection body.
    fn rid(&self) -> String {
        catalog::stamped_string(&self.body, "_rid")
    }

    /// Self-link stamped on the collection body.
    fn self_link(&self) -> String {
        catalog::stamped_string(&self.body, "_self")
    }
}

/// A database with its collections.
#[derive(Debug, Clone)]
pub(crate) struct DatabaseEntry {
    /// Stamped database body.
    pub(crate) body: Value,
    /// Collections by id.
    pub(crate) collections: BTreeMap<String, CollectionEntry>,
}

impl DatabaseEntry {
    /// Self-link stamped on the database body.
    fn self_link(&self) -> String {
        catalog::stamped_string(&self.body, "_self")
    }
}

/// Whole-store state guarded by the store mutex.
#[derive(Debug)]
pub(crate) struct StoreInner {
    /// Databases by id.
    pub(crate) databases: BTreeMap<String, DatabaseEntry>,
    /// Monotonic etag counter shared by every entity.
    pub(crate) etag_counter: u64,
    /// Logical partitions per collection.
    pub(crate) partition_count: usize,
}

impl StoreInner {
    /// Mints the next etag as the protocol's quoted string.
    fn next_etag(&mut self) -> String {
        self.etag_counter += 1;
        catalog::format_etag(self.etag_counter)
    }
}

// ============================================================================
// SECTION: Store Handle
// ============================================================================

/// Shared handle to the in-memory store.
///
/// Cloning is cheap; all clones observe the same state. Tests construct
/// isolated stores per scenario, and the server threads one handle
/// explicitly through every handler.
#[derive(Debug, Clone)]
pub struct DataStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DataStore {
    /// Creates an empty store with the default partition count.
    #[must_use]
    pub fn new() -> Self {
        Self::with_partition_count(partition::DEFAULT_PARTITION_COUNT)
    }

    /// Creates an empty store with an explicit partition count.
    ///
    /// The count applies to every collection; zero is coerced to one.
    #[must_use]
    pub fn with_partition_count(partition_count: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                databases: BTreeMap::new(),
                etag_counter: 0,
                partition_count: partition_count.max(1),
            })),
        }
    }

    /// Locks the store state.
    pub(crate) fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, StoreInner>> {
        self.inner.lock().map_err(|_| StoreError::internal("store mutex poisoned"))
    }

    /// Replaces the whole state; used by snapshot import.
    pub(crate) fn replace_state(&self, state: StoreInner) -> StoreResult<()> {
        let mut guard = self.lock()?;
        *guard = state;
        Ok(())
    }

    /// Returns the configured partition count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Internal`] when the store mutex is poisoned.
    pub fn partition_count(&self) -> StoreResult<usize> {
        Ok(self.lock()?.partition_count)
    }

    // ------------------------------------------------------------------
    // Databases
    // ------------------------------------------------------------------

    /// Creates a database from its wire body.
    ///
    /// # Errors
    ///
    /// `BadRequest` when `id` is missing or malformed; `AlreadyExists` when
    /// a database with the same id exists.
    pub fn create_database(&self, mut body: Value) -> StoreResult<Value> {
        let id = catalog::entity_id(&body)?
            .ok_or_else(|| StoreError::bad_request("database body requires 'id'"))?;
        let mut guard = self.lock()?;
        if guard.databases.contains_key(&id) {
            return Err(StoreError::already_exists(format!("database '{id}'")));
        }
        let rid = catalog::new_resource_id();
        let self_link = format!("dbs/{rid}/");
        let etag = guard.next_etag();
        catalog::stamp_entity(&mut body, &rid, &self_link, &etag, catalog::unix_timestamp());
        if let Value::Object(map) = &mut body {
            map.entry("_colls".to_string()).or_insert_with(|| json!("colls/"));
            map.entry("_users".to_string()).or_insert_with(|| json!("users/"));
        }
        guard.databases.insert(
            id,
            DatabaseEntry {
                body: body.clone(),
                collections: BTreeMap::new(),
            },
        );
        Ok(body)
    }

    /// Reads a database body.
    ///
    /// # Errors
    ///
    /// `NotFound` when the database does not exist.
    pub fn get_database(&self, id: &str) -> StoreResult<Value> {
        let guard = self.lock()?;
        guard
            .databases
            .get(id)
            .map(|entry| entry.body.clone())
            .ok_or_else(|| StoreError::not_found(format!("database '{id}'")))
    }

    /// Deletes a database and everything under it.
    ///
    /// # Errors
    ///
    /// `NotFound` when the database does not exist.
    pub fn delete_database(&self, id: &str) -> StoreResult<()> {
        let mut guard = self.lock()?;
        guard
            .databases
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(format!("database '{id}'")))
    }

    /// Lists database bodies in id order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Internal`] when the store mutex is poisoned.
    pub fn list_databases(&self) -> StoreResult<Vec<Value>> {
        let guard = self.lock()?;
        Ok(guard.databases.values().map(|entry| entry.body.clone()).collect())
    }

    // ------------------------------------------------------------------
    // Collections
    // ------------------------------------------------------------------

    /// Creates a collection under a database.
    ///
    /// The body must carry `id` and a `partitionKey` definition; a default
    /// indexing policy is filled in when the client omits one and is
    /// otherwise round-tripped untouched.
    ///
    /// # Errors
    ///
    /// `NotFound` for a missing database, `BadRequest` for a malformed body,
    /// `AlreadyExists` for a duplicate collection id.
    pub fn create_collection(&self, db: &str, mut body: Value) -> StoreResult<Value> {
        let id = catalog::entity_id(&body)?
            .ok_or_else(|| StoreError::bad_request("collection body requires 'id'"))?;
        let partition_key = PartitionKeyDefinition::from_collection_body(&body)?;
        let mut guard = self.lock()?;
        let partition_count = guard.partition_count;
        let etag = guard.next_etag();
        let database = guard
            .databases
            .get_mut(db)
            .ok_or_else(|| StoreError::not_found(format!("database '{db}'")))?;
        if database.collections.contains_key(&id) {
            return Err(StoreError::already_exists(format!("collection '{id}'")));
        }
        let rid = catalog::new_resource_id();
        let self_link = format!("{}colls/{rid}/", database.self_link());
        catalog::stamp_entity(&mut body, &rid, &self_link, &etag, catalog::unix_timestamp());
        if let Value::Object(map) = &mut body {
            map.entry("indexingPolicy".to_string()).or_insert_with(default_indexing_policy);
            map.entry("_docs".to_string()).or_insert_with(|| json!("docs/"));
            map.entry("_sprocs".to_string()).or_insert_with(|| json!("sprocs/"));
            map.entry("_triggers".to_string()).or_insert_with(|| json!("triggers/"));
            map.entry("_udfs".to_string()).or_insert_with(|| json!("udfs/"));
            map.entry("_conflicts".to_string()).or_insert_with(|| json!("conflicts/"));
        }
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
        Ok(body)
    }

    /// Reads a collection body.
    ///
    /// # Errors
    ///
    /// `NotFound` when the database or collection does not exist.
    pub fn get_collection(&self, db: &str, coll: &str) -> StoreResult<Value> {
        let guard = self.lock()?;
        Ok(collection(&guard, db, coll)?.body.clone())
    }

    /// Deletes a collection and all of its dependents.
    ///
    /// # Errors
    ///
    /// `NotFound` when the database or collection does not exist.
    pub fn delete_collection(&self, db: &str, coll: &str) -> StoreResult<()> {
        let mut guard = self.lock()?;
        let database = guard
            .databases
            .get_mut(db)
            .ok_or_else(|| StoreError::not_found(format!("database '{db}'")))?;
        database
            .collections
            .remove(coll)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(format!("collection '{coll}'")))
    }

    /// Lists collection bodies of a database in id order.
    ///
    /// # Errors
    ///
    /// `NotFound` when the database does not exist.
    pub fn list_collections(&self, db: &str) -> StoreResult<Vec<Value>> {
        let guard = self.lock()?;
        let database = guard
            .databases
            .get(db)
            .ok_or_else(|| StoreError::not_found(format!("database '{db}'")))?;
        Ok(database.collections.values().map(|entry| entry.body.clone()).collect())
    }

    /// Returns the collection's stamped resource id.
    ///
    /// # Errors
    ///
    /// `NotFound` when the database or collection does not exist.
    pub fn collection_rid(&self, db: &str, coll: &str) -> StoreResult<String> {
        let guard = self.lock()?;
        Ok(collection(&guard, db, coll)?.rid())
    }

    /// Builds the partition-key-range list for a collection.
    ///
    /// One range is emitted per logical partition, with the byte range split
    /// evenly across the hex key space.
    ///
    /// # Errors
    ///
    /// `NotFound` when the database or collection does not exist.
    pub fn partition_key_ranges(&self, db: &str, coll: &str) -> StoreResult<Vec<Value>> {
        let guard = self.lock()?;
        let entry = collection(&guard, db, coll)?;
        let count = entry.partitions.len().max(1);
        let rid = entry.rid();
        let self_link = entry.self_link();
        let ts = catalog::unix_timestamp();
        let mut ranges = Vec::with_capacity(count);
        for index in 0 .. count {
            let min = if index == 0 {
                String::new()
            } else {
                format!("{:02X}", index * 0x100 / count)
            };
            let max = if index + 1 == count {
                "FF".to_string()
            } else {
                format!("{:02X}", (index + 1) * 0x100 / count)
            };
            ranges.push(json!({
                "_rid": format!("{rid}{index}"),
                "id": index.to_string(),
                "_etag": catalog::format_etag(0),
                "minInclusive": min,
                "maxExclusive": max,
                "ridPrefix": index,
                "throughputFraction": 1.0 / count as f64,
                "status": "online",
                "parents": [],
                "_self": format!("{self_link}pkranges/{index}/"),
                "_ts": ts,
            }));
        }
        Ok(ranges)
    }

    // ------------------------------------------------------------------
    // Scripts
    // ------------------------------------------------------------------

    /// Creates a script resource (trigger, sproc, or UDF) under a collection.
    ///
    /// Script bodies are stored verbatim and never executed.
    ///
    /// # Errors
    ///
    /// `NotFound` for a missing parent, `BadRequest` for a body without an
    /// id, `AlreadyExists` for a duplicate id.
    pub fn create_script(
        &self,
        db: &str,
        coll: &str,
        kind: ScriptKind,
        mut body: Value,
    ) -> StoreResult<Value> {
        let id = catalog::entity_id(&body)?.ok_or_else(|| {
            StoreError::bad_request(format!("{} body requires 'id'", kind.label()))
        })?;
        let mut guard = self.lock()?;
        let etag = guard.next_etag();
        let entry = collection_mut(&mut guard, db, coll)?;
        let parent_link = entry.self_link();
        if entry.scripts(kind).contains_key(&id) {
            return Err(StoreError::already_exists(format!("{} '{id}'", kind.label())));
        }
        let rid = catalog::new_resource_id();
        let self_link = format!("{parent_link}{}/{rid}/", kind.path_segment());
        catalog::stamp_entity(&mut body, &rid, &self_link, &etag, catalog::unix_timestamp());
        entry.scripts_mut(kind).insert(id, body.clone());
        Ok(body)
    }

    /// Reads a script body.
    ///
    /// # Errors
    ///
    /// `NotFound` when the parent or the script does not exist.
    pub fn get_script(
        &self,
        db: &str,
        coll: &str,
        kind: ScriptKind,
        id: &str,
    ) -> StoreResult<Value> {
        let guard = self.lock()?;
        collection(&guard, db, coll)?
            .scripts(kind)
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("{} '{id}'", kind.label())))
    }

    /// Replaces a script body, honoring an optional `If-Match` etag.
    ///
    /// # Errors
    ///
    /// `NotFound` when the script does not exist, `BadRequest` when the body
    /// id disagrees with the path, `PreconditionFailed` on a stale etag.
    pub fn replace_script(
        &self,
        db: &str,
        coll: &str,
        kind: ScriptKind,
        id: &str,
        mut body: Value,
        if_match: Option<&str>,
    ) -> StoreResult<Value> {
        let body_id = catalog::entity_id(&body)?.ok_or_else(|| {
            StoreError::bad_request(format!("{} body requires 'id'", kind.label()))
        })?;
        if body_id != id {
            return Err(StoreError::bad_request(format!(
                "{} body id '{body_id}' does not match the addressed id '{id}'",
                kind.label()
            )));
        }
        let mut guard = self.lock()?;
        let etag = guard.next_etag();
        let entry = collection_mut(&mut guard, db, coll)?;
        let stored = entry
            .scripts_mut(kind)
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(format!("{} '{id}'", kind.label())))?;
        check_if_match(stored, if_match)?;
        let rid = catalog::stamped_string(stored, "_rid");
        let self_link = catalog::stamped_string(stored, "_self");
        catalog::stamp_entity(&mut body, &rid, &self_link, &etag, catalog::unix_timestamp());
        *stored = body.clone();
        Ok(body)
    }

    /// Deletes a script.
    ///
    /// # Errors
    ///
    /// `NotFound` when the parent or the script does not exist.
    pub fn delete_script(
        &self,
        db: &str,
        coll: &str,
        kind: ScriptKind,
        id: &str,
    ) -> StoreResult<()> {
        let mut guard = self.lock()?;
        collection_mut(&mut guard, db, coll)?
            .scripts_mut(kind)
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(format!("{} '{id}'", kind.label())))
    }

    /// Lists script bodies of a kind in id order.
    ///
    /// # Errors
    ///
    /// `NotFound` when the parent does not exist.
    pub fn list_scripts(&self, db: &str, coll: &str, kind: ScriptKind) -> StoreResult<Vec<Value>> {
        let guard = self.lock()?;
        Ok(collection(&guard, db, coll)?.scripts(kind).values().cloned().collect())
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Creates a document, optionally with upsert semantics.
    ///
    /// A missing `id` is assigned server-side. Returns the stamped body and
    /// whether the document was freshly created (`false` means an upsert
    /// replaced an existing document).
    ///
    /// # Errors
    ///
    /// `NotFound` for a missing parent, `BadRequest` for a non-object body,
    /// `AlreadyExists` for a duplicate `(partition key, id)` without upsert,
    /// `PreconditionFailed` for a stale `If-Match` on the upsert path.
    pub fn create_document(
        &self,
        db: &str,
        coll: &str,
        mut body: Value,
        upsert: bool,
        if_match: Option<&str>,
    ) -> StoreResult<(Value, bool)> {
        if !body.is_object() {
            return Err(StoreError::bad_request("document body must be a JSON object"));
        }
        let id = match catalog::entity_id(&body)? {
            Some(id) => id,
            None => {
                let id = catalog::new_resource_id();
                if let Value::Object(map) = &mut body {
                    map.insert("id".to_string(), Value::String(id.clone()));
                }
                id
            }
        };
        let mut guard = self.lock()?;
        let etag = guard.next_etag();
        let entry = collection_mut(&mut guard, db, coll)?;
        let parent_link = entry.self_link();
        let tuple = partition::resolve_tuple(&body, &entry.partition_key);
        let index = partition::partition_index(&tuple, entry.partitions.len().max(1));
        let slot = entry.partitions[index]
            .documents
            .iter_mut()
            .find(|doc| doc.id == id && partition::tuples_equal(&doc.key_tuple, &tuple));
        match slot {
            Some(existing) => {
                if !upsert {
                    return Err(StoreError::already_exists(format!("document '{id}'")));
                }
                check_if_match(&existing.body, if_match)?;
                let rid = catalog::stamped_string(&existing.body, "_rid");
                let self_link = catalog::stamped_string(&existing.body, "_self");
                catalog::stamp_entity(
                    &mut body,
                    &rid,
                    &self_link,
                    &etag,
                    catalog::unix_timestamp(),
                );
                existing.body = body.clone();
                Ok((body, false))
            }
            None => {
                let rid = catalog::new_resource_id();
                let self_link = format!("{parent_link}docs/{rid}/");
                catalog::stamp_entity(
                    &mut body,
                    &rid,
                    &self_link,
                    &etag,
                    catalog::unix_timestamp(),
                );
                if let Value::Object(map) = &mut body {
                    map.entry("_attachments".to_string()).or_insert_with(|| json!("attachments/"));
                }
                entry.partitions[index].documents.push(DocumentEntry {
                    id,
                    key_tuple: tuple,
                    body: body.clone(),
                });
                Ok((body, true))
            }
        }
    }

    /// Reads a document by partition key and id.
    ///
    /// Without a partition key the partitions are scanned in index order and
    /// the first id match wins; this supports tooling that addresses
    /// documents by id alone.
    ///
    /// # Errors
    ///
    /// `NotFound` when the parent or the document does not exist.
    pub fn read_document(
        &self,
        db: &str,
        coll: &str,
        pk: Option<&[Value]>,
        id: &str,
    ) -> StoreResult<Value> {
        let guard = self.lock()?;
        let entry = collection(&guard, db, coll)?;
        find_document(entry, pk, id)
            .map(|doc| doc.body.clone())
            .ok_or_else(|| StoreError::not_found(format!("document '{id}'")))
    }

    /// Replaces a document body, honoring an optional `If-Match` etag.
    ///
    /// The body id must match the addressed id, and the replacement must
    /// resolve to the same partition-key tuple as the stored document.
    ///
    /// # Errors
    ///
    /// `NotFound`, `BadRequest`, or `PreconditionFailed` as described above;
    /// on failure the stored document is untouched.
    pub fn replace_document(
        &self,
        db: &str,
        coll: &str,
        pk: Option<&[Value]>,
        id: &str,
        mut body: Value,
        if_match: Option<&str>,
    ) -> StoreResult<Value> {
        let body_id = catalog::entity_id(&body)?
            .ok_or_else(|| StoreError::bad_request("document body requires 'id'"))?;
        if body_id != id {
            return Err(StoreError::bad_request(format!(
                "document body id '{body_id}' does not match the addressed id '{id}'"
            )));
        }
        let mut guard = self.lock()?;
        let etag = guard.next_etag();
        let entry = collection_mut(&mut guard, db, coll)?;
        let definition = entry.partition_key.clone();
        let new_tuple = partition::resolve_tuple(&body, &definition);
        let Some(stored) = find_document_mut(entry, pk, id) else {
            return Err(StoreError::not_found(format!("document '{id}'")));
        };
        check_if_match(&stored.body, if_match)?;
        if !partition::tuples_equal(&stored.key_tuple, &new_tuple) {
            return Err(StoreError::bad_request(
                "replacing a document cannot change its partition key",
            ));
        }
        let rid = catalog::stamped_string(&stored.body, "_rid");
        let self_link = catalog::stamped_string(&stored.body, "_self");
        catalog::stamp_entity(&mut body, &rid, &self_link, &etag, catalog::unix_timestamp());
        stored.body = body.clone();
        Ok(body)
    }

    /// Applies a patch to a document, honoring an optional `If-Match` etag.
    ///
    /// The operation list applies to a working copy; any failure rejects the
    /// whole patch with `BadRequest` and leaves the stored document
    /// bit-identical. A successful patch bumps `_etag` once.
    ///
    /// # Errors
    ///
    /// `NotFound`, `BadRequest`, or `PreconditionFailed`.
    pub fn patch_document(
        &self,
        db: &str,
        coll: &str,
        pk: Option<&[Value]>,
        id: &str,
        operations: &[PatchOperation],
        if_match: Option<&str>,
    ) -> StoreResult<Value> {
        let mut guard = self.lock()?;
        let etag = guard.next_etag();
        let entry = collection_mut(&mut guard, db, coll)?;
        let definition = entry.partition_key.clone();
        let Some(stored) = find_document_mut(entry, pk, id) else {
            return Err(StoreError::not_found(format!("document '{id}'")));
        };
        check_if_match(&stored.body, if_match)?;
        let mut patched = patch::apply_patch(&stored.body, operations)?;
        let new_tuple = partition::resolve_tuple(&patched, &definition);
        if !partition::tuples_equal(&stored.key_tuple, &new_tuple) {
            return Err(StoreError::bad_request(
                "patching a document cannot change its partition key",
            ));
        }
        let rid = catalog::stamped_string(&stored.body, "_rid");
        let self_link = catalog::stamped_string(&stored.body, "_self");
        catalog::stamp_entity(&mut patched, &rid, &self_link, &etag, catalog::unix_timestamp());
        stored.body = patched.clone();
        Ok(patched)
    }

    /// Deletes a document.
    ///
    /// # Errors
    ///
    /// `NotFound` when the parent or the document does not exist,
    /// `PreconditionFailed` on a stale `If-Match`.
    pub fn delete_document(
        &self,
        db: &str,
        coll: &str,
        pk: Option<&[Value]>,
        id: &str,
        if_match: Option<&str>,
    ) -> StoreResult<()> {
        let mut guard = self.lock()?;
        let entry = collection_mut(&mut guard, db, coll)?;
        for partition in &mut entry.partitions {
            let position = partition.documents.iter().position(|doc| {
                doc.id == id && pk.map_or(true, |pk| partition::tuples_equal(&doc.key_tuple, pk))
            });
            if let Some(position) = position {
                check_if_match(&partition.documents[position].body, if_match)?;
                partition.documents.remove(position);
                return Ok(());
            }
        }
        Err(StoreError::not_found(format!("document '{id}'")))
    }

    /// Returns document bodies grouped by partition, in insertion order.
    ///
    /// With a partition-key filter only the matching partition is populated
    /// and only documents whose tuple equals the filter are returned; the
    /// outer vector still has one slot per partition so cursor positions
    /// stay aligned across calls.
    ///
    /// # Errors
    ///
    /// `NotFound` when the parent does not exist.
    pub fn documents_by_partition(
        &self,
        db: &str,
        coll: &str,
        pk: Option<&[Value]>,
    ) -> StoreResult<Vec<Vec<Value>>> {
        let guard = self.lock()?;
        let entry = collection(&guard, db, coll)?;
        let mut partitions = Vec::with_capacity(entry.partitions.len());
        match pk {
            None => {
                for partition in &entry.partitions {
                    partitions
                        .push(partition.documents.iter().map(|doc| doc.body.clone()).collect());
                }
            }
            Some(pk) => {
                let count = entry.partitions.len().max(1);
                let target = partition::partition_index(pk, count);
                for (index, partition) in entry.partitions.iter().enumerate() {
                    if index == target {
                        partitions.push(
                            partition
                                .documents
                                .iter()
                                .filter(|doc| partition::tuples_equal(&doc.key_tuple, pk))
                                .map(|doc| doc.body.clone())
                                .collect(),
                        );
                    } else {
                        partitions.push(Vec::new());
                    }
                }
            }
        }
        Ok(partitions)
    }
}

// ============================================================================
// SECTION: Lookup Helpers
// ============================================================================

/// Resolves a collection entry for reading.
fn collection<'a>(
    guard: &'a std::sync::MutexGuard<'_, StoreInner>,
    db: &str,
    coll: &str,
) -> StoreResult<&'a CollectionEntry> {
    let database = guard
        .databases
        .get(db)
        .ok_or_else(|| StoreError::not_found(format!("database '{db}'")))?;
    database
        .collections
        .get(coll)
        .ok_or_else(|| StoreError::not_found(format!("collection '{coll}'")))
}

/// Resolves a collection entry for writing.
fn collection_mut<'a>(
    guard: &'a mut std::sync::MutexGuard<'_, StoreInner>,
    db: &str,
    coll: &str,
) -> StoreResult<&'a mut CollectionEntry> {
    let database = guard
        .databases
        .get_mut(db)
        .ok_or_else(|| StoreError::not_found(format!("database '{db}'")))?;
    database
        .collections
        .get_mut(coll)
        .ok_or_else(|| StoreError::not_found(format!("collection '{coll}'")))
}

/// Finds a document by optional partition key and id.
fn find_document<'a>(
    entry: &'a CollectionEntry,
    pk: Option<&[Value]>,
    id: &str,
) -> Option<&'a DocumentEntry> {
    match pk {
        Some(pk) => {
            let count = entry.partitions.len().max(1);
            let index = partition::partition_index(pk, count);
            entry.partitions.get(index)?.documents.iter().find(|doc| {
                doc.id == id && partition::tuples_equal(&doc.key_tuple, pk)
            })
        }
        None => entry
            .partitions
            .iter()
            .flat_map(|partition| partition.documents.iter())
            .find(|doc| doc.id == id),
    }
}

/// Finds a document by optional partition key and id, mutably.
fn find_document_mut<'a>(
    entry: &'a mut CollectionEntry,
    pk: Option<&[Value]>,
    id: &str,
) -> Option<&'a mut DocumentEntry> {
    match pk {
        Some(pk) => {
            let count = entry.partitions.len().max(1);
            let index = partition::partition_index(pk, count);
            entry.partitions.get_mut(index)?.documents.iter_mut().find(|doc| {
                doc.id == id && partition::tuples_equal(&doc.key_tuple, pk)
            })
        }
        None => entry
            .partitions
            .iter_mut()
            .flat_map(|partition| partition.documents.iter_mut())
            .find(|doc| doc.id == id),
    }
}

/// Verifies an `If-Match` assertion against the stored etag.
fn check_if_match(stored: &Value, if_match: Option<&str>) -> StoreResult<()> {
    let Some(asserted) = if_match else {
        return Ok(());
    };
    let current = catalog::stamped_string(stored, "_etag");
    if asserted == current {
        Ok(())
    } else {
        Err(StoreError::precondition(format!(
            "etag mismatch: asserted {asserted}, current {current}"
        )))
    }
}

/// Default indexing policy stamped onto collections that omit one.
fn default_indexing_policy() -> Value {
    json!({
        "indexingMode": "consistent",
        "automatic": true,
        "includedPaths": [{"path": "/*"}],
        "excludedPaths": [{"path": "/\"_etag\"/?"}],
    })
}
