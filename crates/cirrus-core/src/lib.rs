// cirrus-core/src/lib.rs
// ============================================================================
// Module: Cirrus Core Library
// Description: Public API surface for the Cirrus document store.
// Purpose: Expose the catalog, store, patch engine, and snapshot codec.
// Dependencies: crate::{catalog, error, partition, patch, pointer, snapshot,
//               store, value}
// ============================================================================

//! ## Overview
//! Cirrus core holds the emulator's state: a partitioned, hierarchical,
//! in-memory catalog of databases, collections, documents, and script
//! resources, with optimistic concurrency and a single-file snapshot codec.
//! It performs no I/O and has no HTTP awareness; the server crate maps its
//! tagged errors onto status codes.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod catalog;
pub mod error;
pub mod partition;
pub mod patch;
pub mod pointer;
pub mod snapshot;
pub mod store;
pub mod value;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use catalog::PartitionKeyDefinition;
pub use catalog::ScriptKind;
pub use error::StoreError;
pub use error::StoreResult;
pub use patch::PatchOperation;
pub use store::DataStore;
