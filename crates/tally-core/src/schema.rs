//! Column/value schema and the 64-bit value coder.
//!
//! Every `(column, value)` pair observed during a build is assigned a
//! stable 64-bit code. The code doubles as the posting bitmap's key in
//! the store and as the `Eq` leaf fingerprint, so it must be identical
//! across processes and platforms.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh64::xxh64;

use crate::error::{Error, Result};

/// Computes the stable value code for a `(column, value)` pair.
///
/// The code is `xxh64(column ‖ 0x00 ‖ value)`. The NUL separator keeps
/// `("ab", "c")` and `("a", "bc")` distinct.
#[must_use]
pub fn value_code(column: &str, value: &str) -> u64 {
    let mut buf = Vec::with_capacity(column.len() + 1 + value.len());
    buf.extend_from_slice(column.as_bytes());
    buf.push(0);
    buf.extend_from_slice(value.as_bytes());
    xxh64(&buf, 0)
}

/// Values of a single column, keyed by value string.
///
/// `BTreeMap` keeps both iteration order and the serialized form
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ColumnValues {
    pub(crate) values: BTreeMap<String, u64>,
}

/// The frozen column → value → code mapping persisted with an index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct SchemaMap {
    pub(crate) columns: BTreeMap<String, ColumnValues>,
}

impl SchemaMap {
    /// Interns a `(column, value)` pair, returning its code.
    pub(crate) fn add(&mut self, column: &str, value: &str) -> u64 {
        let col = self.columns.entry(column.to_string()).or_default();

        if let Some(&code) = col.values.get(value) {
            return code;
        }

        let code = value_code(column, value);
        col.values.insert(value.to_string(), code);
        code
    }

    /// Returns true if the column was observed during build.
    pub(crate) fn contains_column(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// Returns the value → code mapping of a column, in ascending value
    /// order.
    pub(crate) fn column_values(&self, column: &str) -> Option<&BTreeMap<String, u64>> {
        self.columns.get(column).map(|col| &col.values)
    }

    /// Serializes the schema for the store header.
    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserializes a schema read from the store header.
    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Integrity(format!("schema blob: {e}")))
    }

    /// Exports the sorted, read-only view handed to callers.
    pub(crate) fn export(&self) -> Schema {
        Schema {
            columns: self
                .columns
                .iter()
                .map(|(name, col)| SchemaColumn {
                    name: name.clone(),
                    values: col.values.keys().cloned().collect(),
                })
                .collect(),
        }
    }
}

/// Read-only schema view: columns and their distinct values, both in
/// ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Columns in ascending name order.
    pub columns: Vec<SchemaColumn>,
}

/// One column of the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaColumn {
    /// Column name.
    pub name: String,
    /// Distinct values in ascending order.
    pub values: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_prevents_boundary_collisions() {
        assert_ne!(value_code("ab", "c"), value_code("a", "bc"));
    }

    #[test]
    fn code_is_stable() {
        assert_eq!(value_code("country", "DE"), value_code("country", "DE"));
    }

    #[test]
    fn intern_is_idempotent() {
        let mut schema = SchemaMap::default();
        let first = schema.add("a", "1");
        let second = schema.add("a", "1");
        assert_eq!(first, second);
        assert_eq!(first, value_code("a", "1"));
    }

    #[test]
    fn export_is_sorted() {
        let mut schema = SchemaMap::default();
        schema.add("b", "z");
        schema.add("b", "a");
        schema.add("a", "1");

        let exported = schema.export();
        assert_eq!(exported.columns[0].name, "a");
        assert_eq!(exported.columns[1].name, "b");
        assert_eq!(exported.columns[1].values, vec!["a", "z"]);
    }

    #[test]
    fn serialization_round_trips() {
        let mut schema = SchemaMap::default();
        schema.add("country", "DE");
        schema.add("country", "FR");
        schema.add("active", "true");

        let bytes = schema.to_bytes().unwrap();
        let decoded = SchemaMap::from_bytes(&bytes).unwrap();
        assert_eq!(schema, decoded);
    }
}
