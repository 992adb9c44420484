//! # tally
//!
//! A static columnar index answering predicate-filtered count queries,
//! the equivalent of `SELECT COUNT(*) … WHERE expr [GROUP BY …]` over
//! rows of string key/value fields. An index is built once, then
//! queried read-only; query throughput and latency are the design
//! priorities.
//!
//! ## How it works
//!
//! - Every `(column, value)` pair is coded to a stable 64-bit hash; the
//!   rows where the pair holds are kept as one compressed bitmap per
//!   code in a single-file embedded store.
//! - Queries are boolean expressions over equalities, evaluated as
//!   bitmap algebra; grouped sub-counts come from intersecting the
//!   result with each group value's posting.
//! - An optional byte-bounded LRU cache memoizes intermediate bitmaps
//!   across sub-expressions and across queries, keyed by a structural
//!   expression fingerprint.
//!
//! ## Quick start
//!
//! ```
//! use tally_core::{Index, IndexWriter, Parser};
//!
//! # let dir = tempfile::tempdir().unwrap();
//! # let path = dir.path().join("example.tally");
//! let mut writer = IndexWriter::new();
//! writer.add_row([("country", "DE"), ("active", "true")]);
//! writer.add_row([("country", "FR"), ("active", "true")]);
//! writer.flush(&path).unwrap();
//!
//! let index = Index::open(&path).unwrap();
//! let query = Parser::parse(r#"active = "true" ; country"#).unwrap();
//! let result = index.execute(&query).unwrap();
//! assert_eq!(result.count, 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod cache;
pub mod config;
pub mod error;
pub mod index;
pub mod metrics;
mod postings;
pub mod query;
pub mod schema;
mod store;
pub mod writer;

pub use cache::{BitmapCache, LruBitmapCache, NullCache};
pub use config::IndexConfig;
pub use error::{Error, Result};
pub use index::{Index, IndexOptions, QueryResult, ResultField, ResultGroup};
pub use metrics::{AtomicCounter, CacheMetrics, CounterMetric, HistogramMetric, IndexMetrics};
pub use query::{Expression, Parser, Query};
pub use schema::{value_code, Schema, SchemaColumn};
pub use writer::{ExternalWriter, IndexWriter};
