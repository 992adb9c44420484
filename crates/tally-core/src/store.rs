//! Persistent column store.
//!
//! A single-file embedded B+tree engine (redb) holds one logical table
//! `"data"` with three key classes:
//!
//! | Key                  | Value                              |
//! |----------------------|------------------------------------|
//! | `S`                  | serialized schema blob             |
//! | `I`                  | next row id, big-endian u32        |
//! | `V` ‖ BE64(code)     | portable roaring posting bitmap    |
//!
//! During an external build a second, disposable file holds the table
//! `"temp"` whose keys are `BE64(code) ‖ BE32(row)` with empty values;
//! the ordered key space doubles as an on-disk sort by `(code, row)`.
//!
//! Commits are crash-atomic. Bulk loads are split into sub-commits of
//! [`COMMIT_BATCH`] entries to bound transaction size.

use std::path::{Path, PathBuf};

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::{Error, Result};

/// Key of the schema blob.
pub(crate) const KEY_SCHEMA: &[u8] = b"S";
/// Key of the next-row-id header.
pub(crate) const KEY_NEXT_ROW_ID: &[u8] = b"I";
/// First byte of every posting key.
pub(crate) const VALUE_KEY_PREFIX: u8 = b'V';

/// Entries per write sub-commit during bulk loads.
pub(crate) const COMMIT_BATCH: usize = 1000;

const DATA_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("data");
const TEMP_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("temp");

/// Builds the store key of a posting bitmap.
pub(crate) fn posting_key(code: u64) -> [u8; 9] {
    let mut key = [0u8; 9];
    key[0] = VALUE_KEY_PREFIX;
    key[1..].copy_from_slice(&code.to_be_bytes());
    key
}

/// Handle on an index file.
///
/// Writers fill it during build; readers treat it as immutable. The
/// underlying file handle is released on drop.
pub(crate) struct Store {
    db: Database,
    path: PathBuf,
}

impl Store {
    /// Creates a new index file, failing if one already exists.
    pub(crate) fn create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Err(Error::AlreadyExists(path.to_path_buf()));
        }
        let db = Database::create(path).map_err(Error::storage)?;
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    /// Opens an existing index file, failing if it is absent.
    pub(crate) fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        let db = Database::open(path).map_err(Error::storage)?;
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    /// Path this store was opened at.
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Reads a single key. `None` means the key is absent.
    pub(crate) fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(Error::storage)?;
        let table = match txn.open_table(DATA_TABLE) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(Error::storage(e)),
        };
        let value = table
            .get(key)
            .map_err(Error::storage)?
            .map(|guard| guard.value().to_vec());
        Ok(value)
    }

    /// Writes a batch of entries in one crash-atomic commit.
    pub(crate) fn put_batch(&self, entries: &[(Vec<u8>, Vec<u8>)]) -> Result<()> {
        let txn = self.db.begin_write().map_err(Error::storage)?;
        {
            let mut table = txn.open_table(DATA_TABLE).map_err(Error::storage)?;
            for (key, value) in entries {
                table
                    .insert(key.as_slice(), value.as_slice())
                    .map_err(Error::storage)?;
            }
        }
        txn.commit().map_err(Error::storage)?;
        Ok(())
    }

    /// Ordered scan over all posting keys, ascending by value code.
    pub(crate) fn scan_postings(
        &self,
        mut f: impl FnMut(u64, &[u8]) -> Result<()>,
    ) -> Result<()> {
        let txn = self.db.begin_read().map_err(Error::storage)?;
        let table = match txn.open_table(DATA_TABLE) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(()),
            Err(e) => return Err(Error::storage(e)),
        };

        let lower: &[u8] = &[VALUE_KEY_PREFIX];
        let upper: &[u8] = &[VALUE_KEY_PREFIX + 1];
        for item in table.range::<&[u8]>(lower..upper).map_err(Error::storage)? {
            let (key, value) = item.map_err(Error::storage)?;
            let key = key.value();
            if key.len() != 9 {
                return Err(Error::Integrity(format!(
                    "posting key of unexpected length {}",
                    key.len()
                )));
            }
            let mut code = [0u8; 8];
            code.copy_from_slice(&key[1..]);
            f(u64::from_be_bytes(code), value.value())?;
        }
        Ok(())
    }
}

/// Disposable scratch store used by the external builder as an on-disk
/// sorter.
pub(crate) struct Scratch {
    db: Database,
    path: PathBuf,
}

impl Scratch {
    /// Creates a new scratch file, failing if one already exists.
    pub(crate) fn create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Err(Error::AlreadyExists(path.to_path_buf()));
        }
        let db = Database::create(path).map_err(Error::storage)?;
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    /// Appends a batch of 12-byte sort keys in one commit.
    pub(crate) fn append(&self, keys: &[[u8; 12]]) -> Result<()> {
        let txn = self.db.begin_write().map_err(Error::storage)?;
        {
            const EMPTY: &[u8] = &[];
            let mut table = txn.open_table(TEMP_TABLE).map_err(Error::storage)?;
            for key in keys {
                table
                    .insert(key.as_slice(), EMPTY)
                    .map_err(Error::storage)?;
            }
        }
        txn.commit().map_err(Error::storage)?;
        Ok(())
    }

    /// Ordered scan over all sort keys.
    pub(crate) fn scan(&self, mut f: impl FnMut(&[u8]) -> Result<()>) -> Result<()> {
        let txn = self.db.begin_read().map_err(Error::storage)?;
        let table = match txn.open_table(TEMP_TABLE) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(()),
            Err(e) => return Err(Error::storage(e)),
        };
        for item in table.iter().map_err(Error::storage)? {
            let (key, _) = item.map_err(Error::storage)?;
            f(key.value())?;
        }
        Ok(())
    }

    /// Drops the scratch store and deletes its file.
    pub(crate) fn remove(self) -> Result<()> {
        let path = self.path.clone();
        drop(self.db);
        std::fs::remove_file(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idx.tally");
        let store = Store::create(&path).unwrap();
        drop(store);
        assert!(matches!(
            Store::create(&path),
            Err(Error::AlreadyExists(_))
        ));
    }

    #[test]
    fn open_refuses_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Store::open(&dir.path().join("missing.tally")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn put_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::create(&dir.path().join("idx.tally")).unwrap();

        store
            .put_batch(&[(KEY_SCHEMA.to_vec(), b"blob".to_vec())])
            .unwrap();
        assert_eq!(store.get(KEY_SCHEMA).unwrap(), Some(b"blob".to_vec()));
        assert_eq!(store.get(KEY_NEXT_ROW_ID).unwrap(), None);
    }

    #[test]
    fn posting_scan_is_ordered_by_code() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::create(&dir.path().join("idx.tally")).unwrap();

        let entries = vec![
            (posting_key(9).to_vec(), vec![2u8]),
            (posting_key(3).to_vec(), vec![1u8]),
            (KEY_SCHEMA.to_vec(), vec![0u8]),
        ];
        store.put_batch(&entries).unwrap();

        let mut seen = Vec::new();
        store
            .scan_postings(|code, _| {
                seen.push(code);
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec![3, 9]);
    }

    #[test]
    fn scratch_scan_is_ordered_across_batches() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = Scratch::create(&dir.path().join("scratch.tally")).unwrap();

        let mut key_a = [0u8; 12];
        key_a[..8].copy_from_slice(&7u64.to_be_bytes());
        key_a[8..].copy_from_slice(&1u32.to_be_bytes());
        let mut key_b = [0u8; 12];
        key_b[..8].copy_from_slice(&7u64.to_be_bytes());
        key_b[8..].copy_from_slice(&0u32.to_be_bytes());
        let mut key_c = [0u8; 12];
        key_c[..8].copy_from_slice(&2u64.to_be_bytes());
        key_c[8..].copy_from_slice(&5u32.to_be_bytes());

        scratch.append(&[key_a]).unwrap();
        scratch.append(&[key_b, key_c]).unwrap();

        let mut seen = Vec::new();
        scratch
            .scan(|key| {
                seen.push(key.to_vec());
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec![key_c.to_vec(), key_b.to_vec(), key_a.to_vec()]);
    }

    #[test]
    fn scratch_remove_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scratch.tally");
        let scratch = Scratch::create(&path).unwrap();
        scratch.append(&[[0u8; 12]]).unwrap();
        scratch.remove().unwrap();
        assert!(!path.exists());
    }
}
