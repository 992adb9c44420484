//! Bitmap memoization caches.
//!
//! The evaluator consults a [`BitmapCache`] keyed by expression
//! fingerprint before computing any sub-expression, so one cache serves
//! both whole-query and sub-expression reuse. [`NullCache`] (the
//! default) disables memoization; [`LruBitmapCache`] bounds the cached
//! bytes with least-recently-used eviction.

mod lru;

use std::sync::Arc;

use roaring::RoaringBitmap;

pub use lru::LruBitmapCache;

/// Cache contract used by the query evaluator.
///
/// Bitmaps handed out are shared immutably; an eviction never
/// invalidates a handle still held by a caller.
pub trait BitmapCache: Send + Sync {
    /// Returns the cached bitmap for a fingerprint, refreshing its
    /// recency on a hit.
    fn get(&self, key: u64) -> Option<Arc<RoaringBitmap>>;

    /// Stores a bitmap under a fingerprint.
    fn put(&self, key: u64, bitmap: Arc<RoaringBitmap>);
}

/// Always-miss cache used when memoization is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCache;

impl BitmapCache for NullCache {
    fn get(&self, _key: u64) -> Option<Arc<RoaringBitmap>> {
        None
    }

    fn put(&self, _key: u64, _bitmap: Arc<RoaringBitmap>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_cache_never_hits() {
        let cache = NullCache;
        cache.put(1, Arc::new(RoaringBitmap::from_iter([1u32, 2, 3])));
        assert!(cache.get(1).is_none());
    }
}
