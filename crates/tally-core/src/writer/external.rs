//! External (larger-than-memory) index builder.

use std::path::Path;

use roaring::RoaringBitmap;

use crate::error::{Error, Result};
use crate::schema::SchemaMap;
use crate::store::{
    posting_key, Scratch, Store, COMMIT_BATCH, KEY_NEXT_ROW_ID, KEY_SCHEMA,
};

/// Builds an index through a disk-resident scratch store.
///
/// Each `(column, value)` occurrence is written to the scratch store as
/// the 12-byte key `BE64(code) ‖ BE32(row)` with an empty value; the
/// ordered key space of the B+tree is a free on-disk sort by
/// `(code, row)`. [`ExternalWriter::flush`] then scans the scratch in
/// key order, so all rows of one code arrive contiguously and in
/// ascending order, which is the bitmap append fast path.
///
/// Only the schema is held in memory; its size is bounded by the number
/// of distinct `(column, value)` pairs, not by the number of rows.
pub struct ExternalWriter {
    schema: SchemaMap,
    store: Store,
    scratch: Scratch,
    pending: Vec<[u8; 12]>,
    rows_since_commit: usize,
    next_row_id: u32,
}

impl ExternalWriter {
    /// Creates the target index file and the scratch file. Both must
    /// not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] if either file exists.
    pub fn create(index_path: impl AsRef<Path>, scratch_path: impl AsRef<Path>) -> Result<Self> {
        let store = Store::create(index_path.as_ref())?;
        let scratch = Scratch::create(scratch_path.as_ref())?;
        Ok(Self {
            schema: SchemaMap::default(),
            store,
            scratch,
            pending: Vec::new(),
            rows_since_commit: 0,
            next_row_id: 0,
        })
    }

    /// Adds one row and returns its row id.
    ///
    /// Scratch writes are committed every [`COMMIT_BATCH`] rows to
    /// bound transaction size.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a scratch commit fails.
    pub fn add_row<'a>(
        &mut self,
        fields: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<u32> {
        let row_id = self.next_row_id;
        self.next_row_id += 1;

        for (column, value) in fields {
            let code = self.schema.add(column, value);

            let mut key = [0u8; 12];
            key[..8].copy_from_slice(&code.to_be_bytes());
            key[8..].copy_from_slice(&row_id.to_be_bytes());
            self.pending.push(key);
        }

        self.rows_since_commit += 1;
        if self.rows_since_commit >= COMMIT_BATCH {
            self.commit_scratch()?;
        }

        Ok(row_id)
    }

    /// Number of rows added so far.
    #[must_use]
    pub fn row_count(&self) -> u32 {
        self.next_row_id
    }

    fn commit_scratch(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            self.scratch.append(&self.pending)?;
            self.pending.clear();
        }
        self.rows_since_commit = 0;
        Ok(())
    }

    /// Merges the sorted scratch into per-code postings, writes the
    /// index headers, and deletes the scratch file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Integrity`] on a malformed scratch key, or a
    /// storage error from either store.
    pub fn flush(mut self) -> Result<()> {
        self.commit_scratch()?;

        let store = &self.store;
        let mut entries: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
        let mut current: Option<(u64, RoaringBitmap)> = None;
        let mut posting_count = 0usize;

        self.scratch.scan(|key| {
            if key.len() != 12 {
                return Err(Error::Integrity(format!(
                    "scratch key of unexpected length {}",
                    key.len()
                )));
            }

            let mut code_bytes = [0u8; 8];
            code_bytes.copy_from_slice(&key[..8]);
            let code = u64::from_be_bytes(code_bytes);
            let mut row_bytes = [0u8; 4];
            row_bytes.copy_from_slice(&key[8..]);
            let row_id = u32::from_be_bytes(row_bytes);

            match &mut current {
                Some((current_code, bitmap)) if *current_code == code => {
                    bitmap.insert(row_id);
                }
                _ => {
                    if let Some((done_code, bitmap)) = current.take() {
                        push_posting(&mut entries, done_code, bitmap)?;
                        posting_count += 1;
                        if entries.len() >= COMMIT_BATCH {
                            store.put_batch(&entries)?;
                            entries.clear();
                        }
                    }

                    let mut bitmap = RoaringBitmap::new();
                    bitmap.insert(row_id);
                    current = Some((code, bitmap));
                }
            }

            Ok(())
        })?;

        if let Some((code, bitmap)) = current.take() {
            push_posting(&mut entries, code, bitmap)?;
            posting_count += 1;
        }

        entries.push((KEY_SCHEMA.to_vec(), self.schema.to_bytes()?));
        entries.push((
            KEY_NEXT_ROW_ID.to_vec(),
            self.next_row_id.to_be_bytes().to_vec(),
        ));
        store.put_batch(&entries)?;

        self.scratch.remove()?;

        tracing::info!(
            rows = self.next_row_id,
            postings = posting_count,
            "flushed externally built index"
        );

        Ok(())
    }
}

fn push_posting(
    entries: &mut Vec<(Vec<u8>, Vec<u8>)>,
    code: u64,
    mut bitmap: RoaringBitmap,
) -> Result<()> {
    bitmap.optimize();
    let mut buf = Vec::with_capacity(bitmap.serialized_size());
    bitmap
        .serialize_into(&mut buf)
        .map_err(|e| Error::Serialization(e.to_string()))?;
    entries.push((posting_key(code).to_vec(), buf));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_refuses_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("idx.tally");
        let scratch = dir.path().join("scratch.tally");
        std::fs::write(&index, b"occupied").unwrap();

        assert!(matches!(
            ExternalWriter::create(&index, &scratch),
            Err(Error::AlreadyExists(_))
        ));
    }

    #[test]
    fn flush_removes_the_scratch_file() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("idx.tally");
        let scratch = dir.path().join("scratch.tally");

        let mut writer = ExternalWriter::create(&index, &scratch).unwrap();
        writer.add_row([("a", "1")]).unwrap();
        writer.flush().unwrap();

        assert!(index.exists());
        assert!(!scratch.exists());
    }
}
