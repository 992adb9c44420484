//! Error types for `tally`.
//!
//! This module provides the unified error type returned by all index
//! operations. Error codes follow the pattern `TALLY-XXX` for easy
//! debugging.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for `tally` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or querying an index.
///
/// Each variant carries a descriptive message suitable for end-users.
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown column in an expression or group-by list (TALLY-001).
    #[error("[TALLY-001] column '{0}' not found in schema")]
    Schema(String),

    /// Query text failed to parse (TALLY-002).
    #[error("[TALLY-002] parse error: {0}")]
    Parse(#[from] crate::query::ParseError),

    /// Missing or invalid placeholder binding (TALLY-003).
    #[error("[TALLY-003] argument error: {0}")]
    Argument(String),

    /// Underlying key/value store failure (TALLY-004).
    #[error("[TALLY-004] storage error: {0}")]
    Storage(String),

    /// Malformed persisted record (TALLY-005).
    ///
    /// Indicates a corrupted index or scratch file.
    #[error("[TALLY-005] integrity error: {0}")]
    Integrity(String),

    /// Operation on a closed index (TALLY-006).
    #[error("[TALLY-006] index is closed")]
    Closed,

    /// Index file does not exist (TALLY-007).
    #[error("[TALLY-007] index file not found: {0}")]
    NotFound(PathBuf),

    /// Index file already exists on exclusive create (TALLY-008).
    #[error("[TALLY-008] file already exists: {0}")]
    AlreadyExists(PathBuf),

    /// IO error (TALLY-009).
    #[error("[TALLY-009] io error: {0}")]
    Io(#[from] std::io::Error),

    /// Schema or bitmap (de)serialization failure (TALLY-010).
    #[error("[TALLY-010] serialization error: {0}")]
    Serialization(String),

    /// Structurally invalid expression, e.g. an empty conjunction
    /// (TALLY-011).
    #[error("[TALLY-011] invalid expression: {0}")]
    InvalidExpression(String),

    /// Configuration error (TALLY-012).
    #[error("[TALLY-012] configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns the error code (e.g. "TALLY-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Schema(_) => "TALLY-001",
            Self::Parse(_) => "TALLY-002",
            Self::Argument(_) => "TALLY-003",
            Self::Storage(_) => "TALLY-004",
            Self::Integrity(_) => "TALLY-005",
            Self::Closed => "TALLY-006",
            Self::NotFound(_) => "TALLY-007",
            Self::AlreadyExists(_) => "TALLY-008",
            Self::Io(_) => "TALLY-009",
            Self::Serialization(_) => "TALLY-010",
            Self::InvalidExpression(_) => "TALLY-011",
            Self::Config(_) => "TALLY-012",
        }
    }

    /// Wraps a store-level failure.
    pub(crate) fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }
}
