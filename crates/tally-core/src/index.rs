//! Index reader and query evaluator.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use roaring::{MultiOps, RoaringBitmap};
use serde::{Deserialize, Serialize};

use crate::cache::{BitmapCache, LruBitmapCache, NullCache};
use crate::error::{Error, Result};
use crate::metrics::IndexMetrics;
use crate::postings::ColGetter;
use crate::query::{EqValue, Expression, Query};
use crate::schema::{value_code, Schema, SchemaMap};
use crate::store::{Store, KEY_NEXT_ROW_ID, KEY_SCHEMA};

/// Options for [`Index::open_with`].
///
/// # Example
///
/// ```ignore
/// let index = Index::open_with(
///     "out.tally",
///     IndexOptions::new().preload(true).lru_cache(100 << 20),
/// )?;
/// ```
#[derive(Default)]
pub struct IndexOptions {
    preload: bool,
    cache: Option<Box<dyn BitmapCache>>,
    metrics: Option<IndexMetrics>,
}

impl IndexOptions {
    /// Creates the default options: on-demand postings, no cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode all postings into memory at open time. Only use this if
    /// the whole index fits into available memory.
    #[must_use]
    pub fn preload(mut self, preload: bool) -> Self {
        self.preload = preload;
        self
    }

    /// Memoize intermediate bitmaps in the given cache.
    #[must_use]
    pub fn cache(mut self, cache: Box<dyn BitmapCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Memoize intermediate bitmaps in an LRU cache bounded to
    /// `max_size_bytes`.
    #[must_use]
    pub fn lru_cache(self, max_size_bytes: u64) -> Self {
        self.cache(Box::new(LruBitmapCache::new(max_size_bytes)))
    }

    /// Attaches metric hooks.
    #[must_use]
    pub fn metrics(mut self, metrics: IndexMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

struct Inner {
    store: Store,
    getter: ColGetter,
}

/// A read-only index answering count queries.
///
/// Open with [`Index::open`] (defaults) or [`Index::open_with`]. The
/// schema and row count are loaded eagerly; postings are read on demand
/// or preloaded per the options. Queries may run concurrently from
/// multiple threads.
pub struct Index {
    inner: RwLock<Option<Inner>>,
    schema: SchemaMap,
    row_count: u32,
    cache: Box<dyn BitmapCache>,
    metrics: IndexMetrics,
}

impl Index {
    /// Opens an index file with default options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the file does not exist, or
    /// [`Error::Integrity`] if it does not contain an index.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, IndexOptions::new())
    }

    /// Opens an index file.
    ///
    /// # Errors
    ///
    /// See [`Index::open`].
    pub fn open_with(path: impl AsRef<Path>, options: IndexOptions) -> Result<Self> {
        let store = Store::open(path.as_ref())?;

        let schema_bytes = store
            .get(KEY_SCHEMA)?
            .ok_or_else(|| Error::Integrity("missing schema record".to_string()))?;
        let schema = SchemaMap::from_bytes(&schema_bytes)?;

        let row_bytes = store
            .get(KEY_NEXT_ROW_ID)?
            .ok_or_else(|| Error::Integrity("missing row count record".to_string()))?;
        let row_count = u32::from_be_bytes(
            row_bytes
                .as_slice()
                .try_into()
                .map_err(|_| Error::Integrity("row count record is not 4 bytes".to_string()))?,
        );

        let getter = if options.preload {
            ColGetter::preload(&store)?
        } else {
            ColGetter::OnDemand
        };

        tracing::info!(
            path = %store.path().display(),
            rows = row_count,
            columns = schema.columns.len(),
            preloaded = options.preload,
            "opened index"
        );

        Ok(Self {
            inner: RwLock::new(Some(Inner { store, getter })),
            schema,
            row_count,
            cache: options.cache.unwrap_or_else(|| Box::new(NullCache)),
            metrics: options.metrics.unwrap_or_default(),
        })
    }

    /// Total number of rows in the index.
    #[must_use]
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Exports the schema, columns and values sorted ascending.
    #[must_use]
    pub fn schema(&self) -> Schema {
        self.schema.export()
    }

    /// Evaluates a query and returns its total count plus any grouped
    /// sub-counts.
    ///
    /// # Errors
    ///
    /// - [`Error::Schema`] for an unknown column in the expression or
    ///   the group-by list.
    /// - [`Error::Argument`] if the expression still contains unbound
    ///   placeholders.
    /// - [`Error::Closed`] after [`Index::close`].
    /// - [`Error::Storage`] / [`Error::Integrity`] on store failures.
    pub fn execute(&self, query: &Query) -> Result<QueryResult> {
        let started = Instant::now();

        let guard = self.inner.read();
        let inner = guard.as_ref().ok_or(Error::Closed)?;

        let ctx = EvalCtx {
            store: &inner.store,
            getter: &inner.getter,
            schema: &self.schema,
            row_count: self.row_count,
            cache: self.cache.as_ref(),
        };

        let matched = ctx.eval(&query.expr)?;
        let groups = ctx.group_by(&matched, &query.group_by)?;

        let result = QueryResult {
            count: matched.len(),
            groups,
        };

        self.metrics.observe_execute(started.elapsed().as_secs_f64());

        Ok(result)
    }

    /// Closes the index, releasing the store handle. Closing an
    /// already-closed index is a no-op; queries issued after close fail
    /// with [`Error::Closed`].
    pub fn close(&self) {
        if self.inner.write().take().is_some() {
            tracing::debug!("closed index");
        }
    }
}

struct EvalCtx<'a> {
    store: &'a Store,
    getter: &'a ColGetter,
    schema: &'a SchemaMap,
    row_count: u32,
    cache: &'a dyn BitmapCache,
}

impl EvalCtx<'_> {
    fn eval(&self, expr: &Expression) -> Result<Arc<RoaringBitmap>> {
        let fp = expr.fingerprint()?;

        if let Some(bitmap) = self.cache.get(fp) {
            return Ok(bitmap);
        }

        let bitmap = match expr {
            Expression::Eq { column, value } => {
                if !self.schema.contains_column(column) {
                    return Err(Error::Schema(column.clone()));
                }
                let literal = match value {
                    EqValue::Literal(v) => v,
                    EqValue::Placeholder(n) => {
                        return Err(Error::Argument(format!("unbound placeholder ${n}")))
                    }
                };
                self.getter.get(self.store, value_code(column, literal))?
            }
            Expression::Not(child) => {
                let child = self.eval(child)?;
                let mut full = RoaringBitmap::new();
                if self.row_count > 0 {
                    full.insert_range(0..self.row_count);
                }
                full -= child.as_ref();
                Arc::new(full)
            }
            Expression::And(children) => {
                if children.is_empty() {
                    return Err(Error::InvalidExpression(
                        "conjunction of zero expressions".to_string(),
                    ));
                }
                let operands = self.eval_children(children)?;
                Arc::new(operands.iter().map(|bitmap| bitmap.as_ref()).intersection())
            }
            Expression::Or(children) => {
                if children.is_empty() {
                    return Err(Error::InvalidExpression(
                        "disjunction of zero expressions".to_string(),
                    ));
                }
                let operands = self.eval_children(children)?;
                Arc::new(operands.iter().map(|bitmap| bitmap.as_ref()).union())
            }
        };

        self.cache.put(fp, Arc::clone(&bitmap));

        Ok(bitmap)
    }

    fn eval_children(&self, children: &[Expression]) -> Result<Vec<Arc<RoaringBitmap>>> {
        children.iter().map(|child| self.eval(child)).collect()
    }

    /// Expands the matched rows into per-group counts by intersecting
    /// with each group-by column's postings, values in ascending order.
    /// Groups that become empty are dropped.
    fn group_by(
        &self,
        matched: &Arc<RoaringBitmap>,
        columns: &[String],
    ) -> Result<Vec<ResultGroup>> {
        if columns.is_empty() {
            return Ok(Vec::new());
        }

        struct Frontier {
            fields: Vec<ResultField>,
            rows: Arc<RoaringBitmap>,
        }

        let mut frontier = vec![Frontier {
            fields: Vec::new(),
            rows: Arc::clone(matched),
        }];

        for column in columns {
            let values = self
                .schema
                .column_values(column)
                .ok_or_else(|| Error::Schema(column.clone()))?;

            let mut next = Vec::new();
            for entry in &frontier {
                for (value, &code) in values {
                    let posting = self.getter.get(self.store, code)?;
                    let rows = entry.rows.as_ref() & posting.as_ref();
                    if rows.is_empty() {
                        continue;
                    }

                    let mut fields = entry.fields.clone();
                    fields.push(ResultField {
                        column: column.clone(),
                        value: value.clone(),
                    });
                    next.push(Frontier {
                        fields,
                        rows: Arc::new(rows),
                    });
                }
            }
            frontier = next;
        }

        Ok(frontier
            .into_iter()
            .map(|entry| ResultGroup {
                count: entry.rows.len(),
                fields: entry.fields,
            })
            .collect())
    }
}

/// Result of a query: total count plus per-group counts.
///
/// Group counts need not sum to `count`: a row without a value in some
/// group-by column is absent from every group of that column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Number of rows matching the expression.
    pub count: u64,
    /// Sub-counts per group-by combination, in ascending value order.
    pub groups: Vec<ResultGroup>,
}

/// One group of the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultGroup {
    /// The `(column, value)` pairs identifying this group.
    pub fields: Vec<ResultField>,
    /// Number of matched rows in this group.
    pub count: u64,
}

/// A single group-by field of a result group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultField {
    /// Column name.
    pub column: String,
    /// Column value.
    pub value: String,
}
