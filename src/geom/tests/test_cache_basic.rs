use std::sync::Arc;

use crate::geom::{CurveCache, CurvePoint, DEFAULT_SAMPLE_CAPACITY};

fn line(n: usize) -> Vec<CurvePoint> {
    (0..=n).map(|i| CurvePoint::new(i as f64, 0.0)).collect()
}

#[test]
fn samples_are_computed_once_per_key() {
    let mut cache = CurveCache::new();
    let mut calls = 0;
    let first = cache.get_or_insert_samples(7, 10, || {
        calls += 1;
        line(10)
    });
    let second = cache.get_or_insert_samples(7, 10, || {
        calls += 1;
        line(10)
    });
    assert_eq!(calls, 1);
    assert!(Arc::ptr_eq(&first, &second));

    let stats = cache.stats();
    assert_eq!(stats.sample_entries, 1);
    assert_eq!(stats.sample_hits, 1);
    assert_eq!(stats.sample_misses, 1);
    assert!((stats.hit_rate() - 0.5).abs() < 1e-12);
}

#[test]
fn resolution_is_part_of_the_sample_key() {
    let mut cache = CurveCache::new();
    let _ = cache.get_or_insert_samples(7, 10, || line(10));
    assert!(cache.has_samples(7, 10));
    assert!(!cache.has_samples(7, 20));
    let coarse = cache.get_or_insert_samples(7, 20, || line(20));
    assert_eq!(coarse.len(), 21);
    assert_eq!(cache.stats().sample_entries, 2);
}

#[test]
fn clearing_aggregates_keeps_samples() {
    let mut cache = CurveCache::new();
    let _ = cache.get_or_insert_samples(1, 4, || line(4));
    let _ = cache.get_or_insert_aggregate(99, || line(3));
    assert!(cache.has_aggregate(99));
    assert!(cache.stats().estimated_memory_bytes > 0);

    cache.clear_aggregates();
    assert!(!cache.has_aggregate(99));
    assert!(cache.has_samples(1, 4));

    cache.clear();
    assert_eq!(cache.stats().total_entries(), 0);
    assert_eq!(cache.stats().hit_rate(), 0.0);
}

#[test]
fn oldest_sampling_is_evicted_when_full() {
    let mut cache = CurveCache::with_capacity(2, 1);
    let _ = cache.get_or_insert_samples(1, 4, || line(4));
    let _ = cache.get_or_insert_samples(2, 4, || line(4));
    let _ = cache.get_or_insert_samples(3, 4, || line(4));
    assert!(!cache.has_samples(1, 4));
    assert!(cache.has_samples(2, 4));
    assert!(cache.has_samples(3, 4));

    let _ = cache.get_or_insert_aggregate(10, || line(3));
    let _ = cache.get_or_insert_aggregate(11, || line(3));
    assert!(!cache.has_aggregate(10));

    let stats = cache.stats();
    assert_eq!(stats.sample_entries, 2);
    assert_eq!(stats.aggregate_entries, 1);
    assert_eq!(stats.evictions, 2);
}

#[test]
fn many_distinct_curves_stay_within_capacity() {
    let mut cache = CurveCache::new();
    for hash in 0..2_000_u64 {
        let _ = cache.get_or_insert_samples(hash, 1_000, || line(1_000));
    }
    let stats = cache.stats();
    assert_eq!(stats.sample_entries, DEFAULT_SAMPLE_CAPACITY);
    assert_eq!(stats.evictions, 2_000 - DEFAULT_SAMPLE_CAPACITY);
    assert!(cache.has_samples(1_999, 1_000));
}
