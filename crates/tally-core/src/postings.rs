//! Posting bitmap access strategies.
//!
//! Both variants satisfy the same contract: fetch the posting for a
//! value code, where an absent code means the empty set, never an
//! error. The evaluator relies on that to keep expressions total over
//! values the build never saw.

use std::sync::Arc;

use roaring::RoaringBitmap;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::store::{posting_key, Store};

/// Decodes a posting from its portable serialized form.
pub(crate) fn decode_bitmap(bytes: &[u8]) -> Result<RoaringBitmap> {
    RoaringBitmap::deserialize_from(bytes)
        .map_err(|e| Error::Integrity(format!("posting bitmap: {e}")))
}

/// Column getter variant, fixed when the index is opened.
pub(crate) enum ColGetter {
    /// Read and decode one posting per call.
    OnDemand,
    /// All postings decoded at open time; lookups never touch the
    /// store.
    Preloaded(FxHashMap<u64, Arc<RoaringBitmap>>),
}

impl ColGetter {
    /// Decodes every posting in the store into memory.
    pub(crate) fn preload(store: &Store) -> Result<Self> {
        let mut values = FxHashMap::default();
        store.scan_postings(|code, bytes| {
            values.insert(code, Arc::new(decode_bitmap(bytes)?));
            Ok(())
        })?;
        tracing::debug!(postings = values.len(), "preloaded posting bitmaps");
        Ok(Self::Preloaded(values))
    }

    /// Fetches the posting for a value code.
    pub(crate) fn get(&self, store: &Store, code: u64) -> Result<Arc<RoaringBitmap>> {
        match self {
            Self::OnDemand => match store.get(&posting_key(code))? {
                Some(bytes) => Ok(Arc::new(decode_bitmap(&bytes)?)),
                None => Ok(Arc::new(RoaringBitmap::new())),
            },
            Self::Preloaded(values) => Ok(values
                .get(&code)
                .cloned()
                .unwrap_or_else(|| Arc::new(RoaringBitmap::new()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_posting(dir: &std::path::Path, code: u64, rows: &[u32]) -> Store {
        let store = Store::create(&dir.join("idx.tally")).unwrap();
        let bitmap: RoaringBitmap = rows.iter().copied().collect();
        let mut buf = Vec::with_capacity(bitmap.serialized_size());
        bitmap.serialize_into(&mut buf).unwrap();
        store
            .put_batch(&[(posting_key(code).to_vec(), buf)])
            .unwrap();
        store
    }

    #[test]
    fn on_demand_reads_postings() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_posting(dir.path(), 7, &[1, 5, 9]);

        let getter = ColGetter::OnDemand;
        let bm = getter.get(&store, 7).unwrap();
        assert_eq!(bm.iter().collect::<Vec<_>>(), vec![1, 5, 9]);
    }

    #[test]
    fn missing_posting_is_empty_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_posting(dir.path(), 7, &[1]);

        for getter in [ColGetter::OnDemand, ColGetter::preload(&store).unwrap()] {
            let bm = getter.get(&store, 12345).unwrap();
            assert!(bm.is_empty());
        }
    }

    #[test]
    fn preloaded_matches_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_posting(dir.path(), 7, &[2, 4, 6]);

        let preloaded = ColGetter::preload(&store).unwrap();
        let on_demand = ColGetter::OnDemand;
        assert_eq!(
            *preloaded.get(&store, 7).unwrap(),
            *on_demand.get(&store, 7).unwrap()
        );
    }
}
