// cirrus-core/src/patch.rs
// ============================================================================
// Module: Patch Engine
// Description: Ordered partial-document operations applied atomically.
// Purpose: Implement add/set/replace/remove/incr/move over slash paths with
//          all-or-nothing semantics.
// Dependencies: serde, serde_json, crate::{error, pointer}
// ============================================================================

//! ## Overview
//! A patch request carries an ordered operation list. All operations apply to
//! a working copy of the document; the first failure (missing parent, type
//! mismatch, system member target) rejects the whole patch and the stored
//! document is returned to the caller unchanged. The store bumps `_etag`
//! exactly once per successful patch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

use crate::catalog::SYSTEM_MEMBERS;
use crate::error::StoreError;
use crate::error::StoreResult;
use crate::pointer;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum operations accepted in a single patch request.
pub const MAX_PATCH_OPERATIONS: usize = 10;

// ============================================================================
// SECTION: Operation Types
// ============================================================================

/// One patch operation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PatchOperation {
    /// Operation kind.
    pub op: PatchOpKind,
    /// Slash path addressed by the operation.
    pub path: String,
    /// Source path for `move`.
    #[serde(default)]
    pub from: Option<String>,
    /// Operand for mutating operations.
    #[serde(default)]
    pub value: Option<Value>,
}

/// Patch operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOpKind {
    /// Insert a member; parents must exist.
    Add,
    /// Insert or overwrite a member; parents must exist.
    Set,
    /// Overwrite an existing member.
    Replace,
    /// Remove an existing member.
    Remove,
    /// Add a number to an existing numeric member.
    Incr,
    /// Move an existing member to a new path.
    Move,
}

// ============================================================================
// SECTION: Application
// ============================================================================

/// Applies an ordered operation list to a working copy of `document`.
///
/// # Errors
///
/// Returns [`StoreError::BadRequest`] when the list is empty or oversized,
/// or when any single operation fails; the input document is never mutated.
pub fn apply_patch(document: &Value, operations: &[PatchOperation]) -> StoreResult<Value> {
    if operations.is_empty() {
        return Err(StoreError::bad_request("patch requires at least one operation"));
    }
    if operations.len() > MAX_PATCH_OPERATIONS {
        return Err(StoreError::bad_request(format!(
            "patch exceeds the limit of {MAX_PATCH_OPERATIONS} operations"
        )));
    }
    let mut working = document.clone();
    for operation in operations {
        apply_one(&mut working, operation)?;
    }
    Ok(working)
}

/// Applies a single operation to the working copy.
fn apply_one(working: &mut Value, operation: &PatchOperation) -> StoreResult<()> {
    let segments = pointer::split_path(&operation.path)?;
    guard_system_target(&segments, &operation.path)?;
    match operation.op {
        PatchOpKind::Add => {
            let value = required_value(operation)?;
            insert_member(working, &segments, value, InsertMode::Add)
        }
        PatchOpKind::Set => {
            let value = required_value(operation)?;
            insert_member(working, &segments, value, InsertMode::Set)
        }
        PatchOpKind::Replace => {
            let value = required_value(operation)?;
            let target = resolve_mut(working, &segments)?;
            *target = value;
            Ok(())
        }
        PatchOpKind::Remove => remove_member(working, &segments).map(|_| ()),
        PatchOpKind::Incr => {
            let operand = required_value(operation)?;
            let Some(delta) = operand.as_f64() else {
                return Err(StoreError::bad_request(format!(
                    "incr operand for '{}' must be a number",
                    operation.path
                )));
            };
            let target = resolve_mut(working, &segments)?;
            let Some(current) = target.as_f64() else {
                return Err(StoreError::bad_request(format!(
                    "incr target '{}' is not a number",
                    operation.path
                )));
            };
            let Some(sum) = crate::value::number_from_f64(current + delta) else {
                return Err(StoreError::bad_request(format!(
                    "incr on '{}' overflows the numeric range",
                    operation.path
                )));
            };
            *target = sum;
            Ok(())
        }
        PatchOpKind::Move => {
            let Some(from) = operation.from.as_deref() else {
                return Err(StoreError::bad_request("move operation requires 'from'"));
            };
            let from_segments = pointer::split_path(from)?;
            guard_system_target(&from_segments, from)?;
            let moved = remove_member(working, &from_segments)?;
            insert_member(working, &segments, moved, InsertMode::Set)
        }
    }
}

/// Rejects operations that target server-owned members at the root.
fn guard_system_target(segments: &[String], path: &str) -> StoreResult<()> {
    let root = segments.first().map(String::as_str).unwrap_or_default();
    if root == "id" || SYSTEM_MEMBERS.contains(&root) {
        return Err(StoreError::bad_request(format!(
            "path '{path}' addresses a system member"
        )));
    }
    Ok(())
}

/// Extracts the required operand of a mutating operation.
fn required_value(operation: &PatchOperation) -> StoreResult<Value> {
    operation.value.clone().ok_or_else(|| {
        StoreError::bad_request(format!("operation on '{}' requires 'value'", operation.path))
    })
}

/// How [`insert_member`] treats an existing target.
#[derive(Clone, Copy, PartialEq, Eq)]
enum InsertMode {
    /// `add`: array inserts shift elements; `-` appends.
    Add,
    /// `set`: object members are added or overwritten; array indexes must
    /// already exist.
    Set,
}

/// Mutably resolves a path that must already exist.
fn resolve_mut<'a>(working: &'a mut Value, segments: &[String]) -> StoreResult<&'a mut Value> {
    let mut current = working;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get_mut(segment).ok_or_else(|| {
                StoreError::bad_request(format!("member '{segment}' does not exist"))
            })?,
            Value::Array(items) => {
                let index = parse_index(segment, items.len())?;
                items.get_mut(index).ok_or_else(|| {
                    StoreError::bad_request(format!("array index {index} is out of range"))
                })?
            }
            _ => {
                return Err(StoreError::bad_request(format!(
                    "member '{segment}' addresses into a scalar"
                )))
            }
        };
    }
    Ok(current)
}

/// Inserts a value at the path; parent containers must already exist.
fn insert_member(
    working: &mut Value,
    segments: &[String],
    value: Value,
    mode: InsertMode,
) -> StoreResult<()> {
    let (last, parents) = segments.split_last().ok_or_else(|| {
        StoreError::bad_request("operation path must address a document member")
    })?;
    let parent = resolve_mut(working, parents)?;
    match parent {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(items) => match mode {
            InsertMode::Add => {
                if last == "-" {
                    items.push(value);
                    return Ok(());
                }
                let index = parse_index(last, items.len())?;
                if index > items.len() {
                    return Err(StoreError::bad_request(format!(
                        "array index {index} is out of range for insert"
                    )));
                }
                items.insert(index, value);
                Ok(())
            }
            InsertMode::Set => {
                let index = parse_index(last, items.len())?;
                let slot = items.get_mut(index).ok_or_else(|| {
                    StoreError::bad_request(format!("array index {index} is out of range"))
                })?;
                *slot = value;
                Ok(())
            }
        },
        _ => Err(StoreError::bad_request(format!(
            "member '{last}' cannot be inserted into a scalar"
        ))),
    }
}

/// Removes and returns the member at the path.
fn remove_member(working: &mut Value, segments: &[String]) -> StoreResult<Value> {
    let (last, parents) = segments.split_last().ok_or_else(|| {
        StoreError::bad_request("operation path must address a document member")
    })?;
    let parent = resolve_mut(working, parents)?;
    match parent {
        Value::Object(map) => map.shift_remove(last).ok_or_else(|| {
            StoreError::bad_request(format!("member '{last}' does not exist"))
        }),
        Value::Array(items) => {
            let index = parse_index(last, items.len())?;
            if index >= items.len() {
                return Err(StoreError::bad_request(format!(
                    "array index {index} is out of range"
                )));
            }
            Ok(items.remove(index))
        }
        _ => Err(StoreError::bad_request(format!(
            "member '{last}' addresses into a scalar"
        ))),
    }
}

/// Parses an array index segment.
fn parse_index(segment: &str, len: usize) -> StoreResult<usize> {
    segment.parse::<usize>().map_err(|_| {
        StoreError::bad_request(format!(
            "'{segment}' is not a valid index into an array of {len} elements"
        ))
    })
}
