//! Metric hooks for cache and query instrumentation.
//!
//! The core does not depend on any metrics registry. Callers wire their
//! own counters/histograms in through the hook structs; every increment
//! is a no-op while a hook is unset.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A monotonically increasing counter.
pub trait CounterMetric: Send + Sync {
    /// Increments the counter by one.
    fn inc(&self);
}

/// A distribution observer (e.g. a latency histogram).
pub trait HistogramMetric: Send + Sync {
    /// Records one observation.
    fn observe(&self, value: f64);
}

/// Counter hooks for a bitmap cache.
#[derive(Clone, Default)]
pub struct CacheMetrics {
    /// Incremented on every cache hit.
    pub cache_hit: Option<Arc<dyn CounterMetric>>,
    /// Incremented on every cache miss.
    pub cache_miss: Option<Arc<dyn CounterMetric>>,
    /// Incremented on every `get` call.
    pub get_call: Option<Arc<dyn CounterMetric>>,
    /// Incremented on every `put` call.
    pub put_call: Option<Arc<dyn CounterMetric>>,
}

impl CacheMetrics {
    pub(crate) fn hit(&self) {
        if let Some(counter) = &self.cache_hit {
            counter.inc();
        }
    }

    pub(crate) fn miss(&self) {
        if let Some(counter) = &self.cache_miss {
            counter.inc();
        }
    }

    pub(crate) fn get_call(&self) {
        if let Some(counter) = &self.get_call {
            counter.inc();
        }
    }

    pub(crate) fn put_call(&self) {
        if let Some(counter) = &self.put_call {
            counter.inc();
        }
    }
}

impl std::fmt::Debug for CacheMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheMetrics")
            .field("cache_hit", &self.cache_hit.is_some())
            .field("cache_miss", &self.cache_miss.is_some())
            .field("get_call", &self.get_call.is_some())
            .field("put_call", &self.put_call.is_some())
            .finish()
    }
}

/// Hooks for index-level instrumentation.
#[derive(Clone, Default)]
pub struct IndexMetrics {
    /// Observed with each query's wall-clock duration in seconds.
    pub execute_duration: Option<Arc<dyn HistogramMetric>>,
}

impl IndexMetrics {
    pub(crate) fn observe_execute(&self, seconds: f64) {
        if let Some(histogram) = &self.execute_duration {
            histogram.observe(seconds);
        }
    }
}

impl std::fmt::Debug for IndexMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexMetrics")
            .field("execute_duration", &self.execute_duration.is_some())
            .finish()
    }
}

/// Lock-free counter backed by an `AtomicU64`.
///
/// Handy for tests and for hosts without a metrics library.
#[derive(Debug, Default)]
pub struct AtomicCounter(AtomicU64);

impl AtomicCounter {
    /// Returns the current counter value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl CounterMetric for AtomicCounter {
    fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_hooks_are_noops() {
        let metrics = CacheMetrics::default();
        metrics.hit();
        metrics.miss();
        metrics.get_call();
        metrics.put_call();
    }

    #[test]
    fn atomic_counter_counts() {
        let counter = Arc::new(AtomicCounter::default());
        let metrics = CacheMetrics {
            cache_hit: Some(counter.clone()),
            ..CacheMetrics::default()
        };
        metrics.hit();
        metrics.hit();
        assert_eq!(counter.value(), 2);
    }
}
