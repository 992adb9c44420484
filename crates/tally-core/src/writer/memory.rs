//! In-memory index builder.

use std::path::Path;

use rayon::prelude::*;
use roaring::RoaringBitmap;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::schema::SchemaMap;
use crate::store::{posting_key, Store, COMMIT_BATCH, KEY_NEXT_ROW_ID, KEY_SCHEMA};

/// Builds an index by accumulating per-value posting bitmaps in memory.
///
/// Row ids are assigned densely starting at 0. `&mut self` makes
/// concurrent `add_row` calls serialize at compile time; wrap the
/// writer in a mutex to share it across threads.
///
/// # Example
///
/// ```ignore
/// let mut writer = IndexWriter::new();
/// writer.add_row([("country", "DE"), ("active", "true")]);
/// writer.flush("out.tally")?;
/// ```
#[derive(Debug, Default)]
pub struct IndexWriter {
    schema: SchemaMap,
    postings: FxHashMap<u64, RoaringBitmap>,
    next_row_id: u32,
}

impl IndexWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one row and returns its row id.
    ///
    /// Each `(column, value)` pair is interned into the schema and the
    /// row's bit is set in the pair's posting.
    pub fn add_row<'a>(&mut self, fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> u32 {
        let row_id = self.next_row_id;
        self.next_row_id += 1;

        for (column, value) in fields {
            let code = self.schema.add(column, value);
            self.postings.entry(code).or_default().insert(row_id);
        }

        row_id
    }

    /// Number of rows added so far.
    #[must_use]
    pub fn row_count(&self) -> u32 {
        self.next_row_id
    }

    /// Serializes the index to a new file, consuming the writer.
    ///
    /// Postings are run-optimized in parallel, then written in
    /// sub-commits of [`COMMIT_BATCH`] entries after the schema and row
    /// count headers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] if the file exists, or a
    /// storage error from the underlying store.
    pub fn flush(self, path: impl AsRef<Path>) -> Result<()> {
        let store = Store::create(path.as_ref())?;
        self.flush_to_store(&store)
    }

    fn flush_to_store(self, store: &Store) -> Result<()> {
        let mut postings: Vec<(u64, RoaringBitmap)> = self.postings.into_iter().collect();
        postings.par_iter_mut().for_each(|(_, bitmap)| {
            bitmap.optimize();
        });
        // Deterministic write order; irrelevant to the reader but keeps
        // flushes reproducible.
        postings.sort_unstable_by_key(|(code, _)| *code);

        let mut entries = vec![
            (KEY_SCHEMA.to_vec(), self.schema.to_bytes()?),
            (
                KEY_NEXT_ROW_ID.to_vec(),
                self.next_row_id.to_be_bytes().to_vec(),
            ),
        ];

        let posting_count = postings.len();
        for (code, bitmap) in postings {
            let mut buf = Vec::with_capacity(bitmap.serialized_size());
            bitmap
                .serialize_into(&mut buf)
                .map_err(|e| Error::Serialization(e.to_string()))?;
            entries.push((posting_key(code).to_vec(), buf));

            if entries.len() >= COMMIT_BATCH {
                store.put_batch(&entries)?;
                entries.clear();
            }
        }

        if !entries.is_empty() {
            store.put_batch(&entries)?;
        }

        tracing::info!(
            rows = self.next_row_id,
            postings = posting_count,
            "flushed index"
        );

        Ok(())
    }
}
