// cirrus-query/src/error.rs
// ============================================================================
// Module: Query Error Taxonomy
// Description: Structured failures for lexing, parsing, and execution.
// Purpose: Give the HTTP boundary enough detail to build a human-readable
//          message without leaking engine internals.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Parse failures carry a byte offset into the original query text so error
//! messages can point at the offending token. Execution failures are tagged
//! like store errors; the HTTP surface maps everything here to a 400 apart
//! from [`QueryError::Cancelled`] and [`QueryError::Internal`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Error Type
// ============================================================================

/// Failure raised while lexing, parsing, planning, or executing a query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Query text was empty or whitespace.
    #[error("query text is empty")]
    EmptyQuery,
    /// Query text exceeded the configured size limit.
    #[error("query of {actual} bytes exceeds limit of {max} bytes")]
    QueryTooLarge {
        /// Maximum allowed bytes.
        max: usize,
        /// Observed size in bytes.
        actual: usize,
    },
    /// Expression nesting exceeded the configured depth.
    #[error("expression nesting exceeds depth {max} at offset {position}")]
    NestingTooDeep {
        /// Maximum allowed nesting depth.
        max: usize,
        /// Byte offset where the limit was hit.
        position: usize,
    },
    /// An unexpected token was encountered.
    #[error("unexpected token `{found}` at offset {position}, expected {expected}")]
    UnexpectedToken {
        /// Human-friendly expectation summary.
        expected: &'static str,
        /// The token actually seen.
        found: String,
        /// Byte offset into the query text.
        position: usize,
    },
    /// A numeric literal failed to parse.
    #[error("invalid number `{raw}` at offset {position}")]
    InvalidNumber {
        /// Raw numeric text.
        raw: String,
        /// Byte offset into the query text.
        position: usize,
    },
    /// A string literal was malformed or unterminated.
    #[error("invalid string literal at offset {position}: {detail}")]
    InvalidString {
        /// What went wrong inside the literal.
        detail: String,
        /// Byte offset into the query text.
        position: usize,
    },
    /// Input continued after a complete query.
    #[error("unexpected trailing input at offset {position}")]
    TrailingInput {
        /// Byte offset where trailing input begins.
        position: usize,
    },
    /// The query is structurally invalid (aggregate misuse, alias clashes,
    /// TOP combined with OFFSET/LIMIT, and similar).
    #[error("{0}")]
    InvalidQuery(String),
    /// A scalar function was called that the engine does not know.
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    /// A scalar function was called with the wrong number of arguments.
    #[error("function `{function}` expects {expected} arguments, got {actual}")]
    WrongArity {
        /// Function name.
        function: String,
        /// Human-friendly expected-count description.
        expected: &'static str,
        /// Supplied argument count.
        actual: usize,
    },
    /// The query referenced a parameter that was not supplied.
    #[error("parameter `{0}` was not supplied")]
    UnknownParameter(String),
    /// A continuation token failed validation.
    #[error("continuation token rejected: {0}")]
    BadContinuation(String),
    /// Execution was cancelled by the caller.
    #[error("query execution was cancelled")]
    Cancelled,
    /// An engine invariant was violated.
    #[error("internal query error: {0}")]
    Internal(String),
}

/// Result alias for query operations.
pub type QueryResult<T> = Result<T, QueryError>;
