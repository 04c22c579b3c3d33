//! Memoization for curve samplings and aggregates.
//!
//! Sampling a curve at full resolution and aggregating a submission set are the
//! two expensive operations of the engine. A host UI that re-renders on every
//! state change would otherwise recompute them each time; this cache lets it
//! recompute only when the inputs actually change.
//!
//! Keys are content hashes computed by the caller (see
//! `CurveModel::content_hash` and `submission_set_hash`), so two equal inputs
//! hit the same entry regardless of where they came from.
//!
//! Both maps are bounded; when one is full its oldest entry is evicted.
//!
//! # Example
//! ```ignore
//! let mut cache = CurveCache::default();
//! let points = cache.get_or_insert_samples(curve.content_hash(), 10_000, || {
//!     sample(&curve, 10_000)
//! });
//! let stats = cache.stats();
//! println!("entries: {}, hits: {}", stats.total_entries(), stats.total_hits());
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde::Serialize;

use super::core::CurvePoint;

/// Cache key for a single curve sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SampleKey {
    curve_hash: u64,
    resolution: usize,
}

/// Shared buffer for cached point data (avoids cloning on every access).
pub type SharedPoints = Arc<Vec<CurvePoint>>;

/// Samplings kept by default: the editor curve at both resolutions plus a few
/// recent ones.
pub const DEFAULT_SAMPLE_CAPACITY: usize = 8;

/// Aggregates kept by default.
pub const DEFAULT_AGGREGATE_CAPACITY: usize = 32;

#[derive(Debug)]
pub struct CurveCache {
    samples: HashMap<SampleKey, SharedPoints>,
    sample_order: VecDeque<SampleKey>,
    sample_capacity: usize,
    aggregates: HashMap<u64, SharedPoints>,
    aggregate_order: VecDeque<u64>,
    aggregate_capacity: usize,

    evictions: usize,
    sample_hits: usize,
    sample_misses: usize,
    aggregate_hits: usize,
    aggregate_misses: usize,
}

/// Cache statistics for diagnostics and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurveCacheStats {
    pub sample_entries: usize,
    pub aggregate_entries: usize,
    pub sample_hits: usize,
    pub sample_misses: usize,
    pub aggregate_hits: usize,
    pub aggregate_misses: usize,
    /// Entries dropped to stay within capacity.
    pub evictions: usize,
    /// Estimated memory usage in bytes.
    pub estimated_memory_bytes: usize,
}

impl CurveCacheStats {
    #[must_use]
    pub const fn total_entries(&self) -> usize {
        self.sample_entries + self.aggregate_entries
    }

    #[must_use]
    pub const fn total_hits(&self) -> usize {
        self.sample_hits + self.aggregate_hits
    }

    #[must_use]
    pub const fn total_misses(&self) -> usize {
        self.sample_misses + self.aggregate_misses
    }

    /// Returns the cache hit rate as a value between 0.0 and 1.0.
    /// Returns 0.0 if no cache accesses have been made.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_hits() + self.total_misses();
        if total == 0 {
            0.0
        } else {
            self.total_hits() as f64 / total as f64
        }
    }
}

impl Default for CurveCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_SAMPLE_CAPACITY, DEFAULT_AGGREGATE_CAPACITY)
    }
}

impl CurveCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache holding at most `samples` samplings and `aggregates`
    /// aggregates. Each capacity is at least 1.
    #[must_use]
    pub fn with_capacity(samples: usize, aggregates: usize) -> Self {
        Self {
            samples: HashMap::new(),
            sample_order: VecDeque::new(),
            sample_capacity: samples.max(1),
            aggregates: HashMap::new(),
            aggregate_order: VecDeque::new(),
            aggregate_capacity: aggregates.max(1),
            evictions: 0,
            sample_hits: 0,
            sample_misses: 0,
            aggregate_hits: 0,
            aggregate_misses: 0,
        }
    }

    #[must_use]
    pub fn stats(&self) -> CurveCacheStats {
        CurveCacheStats {
            sample_entries: self.samples.len(),
            aggregate_entries: self.aggregates.len(),
            sample_hits: self.sample_hits,
            sample_misses: self.sample_misses,
            aggregate_hits: self.aggregate_hits,
            aggregate_misses: self.aggregate_misses,
            evictions: self.evictions,
            estimated_memory_bytes: self.estimate_memory_usage(),
        }
    }

    /// Clears all cached data and resets hit/miss counters.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.sample_order.clear();
        self.aggregates.clear();
        self.aggregate_order.clear();
        self.evictions = 0;
        self.sample_hits = 0;
        self.sample_misses = 0;
        self.aggregate_hits = 0;
        self.aggregate_misses = 0;
    }

    /// Drops cached aggregates only. Call when a project's submission set is
    /// replaced; samplings of individual curves stay valid.
    pub fn clear_aggregates(&mut self) {
        self.aggregates.clear();
        self.aggregate_order.clear();
        self.aggregate_hits = 0;
        self.aggregate_misses = 0;
    }

    #[must_use]
    pub fn estimate_memory_usage(&self) -> usize {
        let point_size = std::mem::size_of::<CurvePoint>();
        let mut total = 0usize;
        for points in self.samples.values() {
            total += points.len() * point_size;
        }
        for points in self.aggregates.values() {
            total += points.len() * point_size;
        }

        // Approximate HashMap entry overhead
        total += self.samples.len() * std::mem::size_of::<(SampleKey, SharedPoints)>();
        total += self.aggregates.len() * std::mem::size_of::<(u64, SharedPoints)>();
        total
    }

    /// Gets or computes and caches the sampling of one curve.
    pub fn get_or_insert_samples(
        &mut self,
        curve_hash: u64,
        resolution: usize,
        make: impl FnOnce() -> Vec<CurvePoint>,
    ) -> SharedPoints {
        let key = SampleKey {
            curve_hash,
            resolution,
        };
        if let Some(cached) = self.samples.get(&key) {
            self.sample_hits += 1;
            return Arc::clone(cached);
        }
        self.sample_misses += 1;
        while self.samples.len() >= self.sample_capacity {
            let Some(oldest) = self.sample_order.pop_front() else {
                break;
            };
            self.samples.remove(&oldest);
            self.evictions += 1;
        }
        let points = Arc::new(make());
        self.samples.insert(key, Arc::clone(&points));
        self.sample_order.push_back(key);
        points
    }

    /// Gets or computes and caches an aggregate curve.
    ///
    /// `set_hash` must identify the submission set and the aggregation options.
    pub fn get_or_insert_aggregate(
        &mut self,
        set_hash: u64,
        make: impl FnOnce() -> Vec<CurvePoint>,
    ) -> SharedPoints {
        if let Some(cached) = self.aggregates.get(&set_hash) {
            self.aggregate_hits += 1;
            return Arc::clone(cached);
        }
        self.aggregate_misses += 1;
        while self.aggregates.len() >= self.aggregate_capacity {
            let Some(oldest) = self.aggregate_order.pop_front() else {
                break;
            };
            self.aggregates.remove(&oldest);
            self.evictions += 1;
        }
        let points = Arc::new(make());
        self.aggregates.insert(set_hash, Arc::clone(&points));
        self.aggregate_order.push_back(set_hash);
        points
    }

    #[must_use]
    pub fn has_samples(&self, curve_hash: u64, resolution: usize) -> bool {
        self.samples.contains_key(&SampleKey {
            curve_hash,
            resolution,
        })
    }

    #[must_use]
    pub fn has_aggregate(&self, set_hash: u64) -> bool {
        self.aggregates.contains_key(&set_hash)
    }
}
