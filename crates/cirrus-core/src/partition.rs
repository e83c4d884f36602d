// cirrus-core/src/partition.rs
// ============================================================================
// Module: Partition Derivation
// Description: Partition-key tuple resolution and stable hashing.
// Purpose: Place documents into logical partitions deterministically across
//          runs and across snapshot round-trips.
// Dependencies: serde_json, sha2, crate::{catalog, pointer}
// ============================================================================

//! ## Overview
//! A document's partition is derived from its partition-key tuple: each path
//! in the collection's definition is resolved against the document, the
//! resolved values are serialized and joined with a separator, and the join
//! is hashed with SHA-256 folded modulo the partition count. Missing paths
//! resolve to the protocol's undefined marker (an empty object on the wire)
//! so the tuple always has one entry per path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;

use crate::catalog::PartitionKeyDefinition;
use crate::pointer;
use crate::value::value_equals;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default number of logical partitions per collection.
///
/// The emulator exposes a small constant; all derivation and iteration code
/// treats the count as arbitrary.
pub const DEFAULT_PARTITION_COUNT: usize = 1;

/// Separator byte placed between serialized tuple components before hashing.
const TUPLE_SEPARATOR: u8 = 0x1f;

// ============================================================================
// SECTION: Tuple Resolution
// ============================================================================

/// Returns the wire marker for an undefined partition-key component.
///
/// Clients send an empty object for a missing component, so the same shape
/// is used internally to keep tuple comparison symmetric.
#[must_use]
pub fn undefined_component() -> Value {
    Value::Object(Map::new())
}

/// Returns true when the value is the undefined component marker.
#[must_use]
pub fn is_undefined_component(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.is_empty())
}

/// Resolves a document's partition-key tuple under the given definition.
///
/// Paths that do not resolve yield the undefined marker; the tuple length
/// always equals the number of definition paths.
#[must_use]
pub fn resolve_tuple(document: &Value, definition: &PartitionKeyDefinition) -> Vec<Value> {
    definition
        .paths
        .iter()
        .map(|path| match pointer::resolve_path(document, path) {
            Ok(Some(value)) => value.clone(),
            _ => undefined_component(),
        })
        .collect()
}

/// Compares two partition-key tuples for equality under protocol semantics.
#[must_use]
pub fn tuples_equal(left: &[Value], right: &[Value]) -> bool {
    left.len() == right.len()
        && left.iter().zip(right.iter()).all(|(a, b)| value_equals(a, b))
}

// ============================================================================
// SECTION: Hashing
// ============================================================================

/// Derives the partition index for a tuple.
///
/// The hash input is the JSON serialization of each component joined with a
/// separator byte; the first eight digest bytes are folded modulo the count.
/// SHA-256 keeps the placement stable across runs and across export/import.
#[must_use]
pub fn partition_index(tuple: &[Value], partition_count: usize) -> usize {
    if partition_count <= 1 {
        return 0;
    }
    let mut hasher = Sha256::new();
    for (position, component) in tuple.iter().enumerate() {
        if position > 0 {
            hasher.update([TUPLE_SEPARATOR]);
        }
        let serialized = serde_json::to_vec(component).unwrap_or_default();
        hasher.update(&serialized);
    }
    let digest = hasher.finalize();
    let mut prefix = [0_u8; 8];
    prefix.copy_from_slice(&digest[.. 8]);
    let folded = u64::from_be_bytes(prefix);
    usize::try_from(folded % partition_count as u64).unwrap_or(0)
}
