//! Size-bounded LRU bitmap cache.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use roaring::RoaringBitmap;

use super::BitmapCache;
use crate::metrics::CacheMetrics;

struct Entry {
    bitmap: Arc<RoaringBitmap>,
    size: u64,
}

/// Fixed bookkeeping cost charged per entry on top of the bitmap's
/// serialized size.
const ENTRY_OVERHEAD: u64 =
    (std::mem::size_of::<Entry>() + std::mem::size_of::<u64>() * 2) as u64;

struct Inner {
    /// Insertion order is recency order: front = LRU, back = MRU.
    entries: IndexMap<u64, Entry>,
    cur_size: u64,
}

/// LRU cache bounded by bytes-on-heap.
///
/// Each entry contributes its bitmap's serialized size plus a fixed
/// per-entry overhead. Eviction runs from the LRU end until the bound
/// holds again, but always leaves the entry just inserted: a single
/// entry larger than `max_size` is retained rather than thrashed.
///
/// A single mutex covers order and map; contention is negligible next
/// to the bitmap work the cache saves.
pub struct LruBitmapCache {
    inner: Mutex<Inner>,
    max_size: u64,
    metrics: CacheMetrics,
}

impl LruBitmapCache {
    /// Creates a cache bounded to `max_size_bytes`.
    #[must_use]
    pub fn new(max_size_bytes: u64) -> Self {
        Self::with_metrics(max_size_bytes, CacheMetrics::default())
    }

    /// Creates a cache with counter hooks attached.
    #[must_use]
    pub fn with_metrics(max_size_bytes: u64, metrics: CacheMetrics) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: IndexMap::new(),
                cur_size: 0,
            }),
            max_size: max_size_bytes,
            metrics,
        }
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Current accounted size in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.inner.lock().cur_size
    }
}

impl BitmapCache for LruBitmapCache {
    fn get(&self, key: u64) -> Option<Arc<RoaringBitmap>> {
        self.metrics.get_call();

        let mut inner = self.inner.lock();
        match inner.entries.shift_remove(&key) {
            Some(entry) => {
                let bitmap = Arc::clone(&entry.bitmap);
                inner.entries.insert(key, entry);
                self.metrics.hit();
                Some(bitmap)
            }
            None => {
                self.metrics.miss();
                None
            }
        }
    }

    fn put(&self, key: u64, bitmap: Arc<RoaringBitmap>) {
        self.metrics.put_call();

        let size = bitmap.serialized_size() as u64;
        let mut inner = self.inner.lock();

        if let Some(old) = inner.entries.shift_remove(&key) {
            inner.cur_size -= old.size + ENTRY_OVERHEAD;
        }

        inner.entries.insert(key, Entry { bitmap, size });
        inner.cur_size += size + ENTRY_OVERHEAD;

        while inner.cur_size > self.max_size && inner.entries.len() > 1 {
            if let Some((_, evicted)) = inner.entries.shift_remove_index(0) {
                inner.cur_size -= evicted.size + ENTRY_OVERHEAD;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::metrics::AtomicCounter;

    fn bitmap(rows: impl IntoIterator<Item = u32>) -> Arc<RoaringBitmap> {
        Arc::new(rows.into_iter().collect())
    }

    #[test]
    fn get_returns_what_put_stored() {
        let cache = LruBitmapCache::new(1 << 20);
        let bm = bitmap([1, 2, 3]);
        cache.put(42, Arc::clone(&bm));

        let hit = cache.get(42).unwrap();
        assert_eq!(*hit, *bm);
        assert!(cache.get(7).is_none());
    }

    #[test]
    fn evicts_least_recently_used_first() {
        let one = bitmap(0..100);
        let entry_cost = one.serialized_size() as u64 + ENTRY_OVERHEAD;
        // Room for exactly two entries.
        let cache = LruBitmapCache::new(entry_cost * 2);

        cache.put(1, bitmap(0..100));
        cache.put(2, bitmap(0..100));
        // Touch 1 so that 2 becomes the LRU entry.
        assert!(cache.get(1).is_some());

        cache.put(3, bitmap(0..100));
        assert!(cache.get(2).is_none());
        assert!(cache.get(1).is_some());
        assert!(cache.get(3).is_some());
    }

    #[test]
    fn size_stays_bounded() {
        let one = bitmap(0..100);
        let entry_cost = one.serialized_size() as u64 + ENTRY_OVERHEAD;
        let max = entry_cost * 3;
        let cache = LruBitmapCache::new(max);

        for key in 0..50u64 {
            cache.put(key, bitmap(0..100));
        }
        assert!(cache.size_bytes() <= max);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn single_oversized_entry_is_retained() {
        let cache = LruBitmapCache::new(8);
        cache.put(1, bitmap(0..10_000));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(1).is_some());

        // The next insert displaces it.
        cache.put(2, bitmap(0..10_000));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(1).is_none());
        assert!(cache.get(2).is_some());
    }

    #[test]
    fn overwrite_refreshes_recency_and_size() {
        let one = bitmap(0..100);
        let entry_cost = one.serialized_size() as u64 + ENTRY_OVERHEAD;
        let cache = LruBitmapCache::new(entry_cost * 2);

        cache.put(1, bitmap(0..100));
        cache.put(2, bitmap(0..100));
        cache.put(1, bitmap(0..100));

        cache.put(3, bitmap(0..100));
        assert!(cache.get(2).is_none(), "2 was the LRU entry");
        assert!(cache.get(1).is_some());
    }

    #[test]
    fn counters_fire() {
        let hits = Arc::new(AtomicCounter::default());
        let misses = Arc::new(AtomicCounter::default());
        let metrics = CacheMetrics {
            cache_hit: Some(hits.clone()),
            cache_miss: Some(misses.clone()),
            ..CacheMetrics::default()
        };
        let cache = LruBitmapCache::with_metrics(1 << 20, metrics);

        assert!(cache.get(1).is_none());
        cache.put(1, bitmap([1]));
        assert!(cache.get(1).is_some());

        assert_eq!(hits.value(), 1);
        assert_eq!(misses.value(), 1);
    }
}
