// cirrus-core/src/error.rs
// ============================================================================
// Module: Store Error Taxonomy
// Description: Tagged error values shared by the store, codec, and handlers.
// Purpose: Keep failures symbolic inside the core; status codes exist only at
//          the HTTP boundary.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Every fallible core operation returns a [`StoreError`] tag. Tags are never
//! derived from numeric status codes; the HTTP surface owns that mapping and
//! nothing below it inspects a status.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Error Type
// ============================================================================

/// Tagged failure raised by the data store and snapshot codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The addressed entity does not exist.
    #[error("{0} not found")]
    NotFound(String),
    /// An entity with the same identity already exists.
    #[error("{0} already exists")]
    AlreadyExists(String),
    /// An `If-Match` assertion did not hold; nothing was mutated.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    /// The request payload or arguments are malformed.
    #[error("{0}")]
    BadRequest(String),
    /// The caller failed the master-key check.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The request body exceeds the configured limit.
    #[error("payload of {actual} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge {
        /// Maximum accepted body size in bytes.
        limit: usize,
        /// Observed body size in bytes.
        actual: usize,
    },
    /// An invariant was violated; this indicates a bug, not caller error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Builds a `NotFound` error for the named resource.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// Builds an `AlreadyExists` error for the named resource.
    #[must_use]
    pub fn already_exists(resource: impl Into<String>) -> Self {
        Self::AlreadyExists(resource.into())
    }

    /// Builds a `PreconditionFailed` error with the given detail.
    #[must_use]
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::PreconditionFailed(message.into())
    }

    /// Builds a `BadRequest` error with the given detail.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Builds an `Internal` error with the given detail.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// Result alias for core operations.
pub type StoreResult<T> = Result<T, StoreError>;
