//! Merges many members' curves into one consensus curve.
//!
//! Every submission has its own funding range. The aggregate walks a shared
//! funding grid from 0 to the largest x-intercept, asks each submission that
//! covers a grid position for its interpolated impact, and keeps the position
//! only when enough submissions agree to cover it. The result is smoothed with
//! a trailing moving average and clamped to the impact axis.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::geom::{CurveCache, CurvePoint, SharedPoints, bracket_at, clamp, is_sorted_by_x, sort_by_x};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::model::{CurveModel, MAX_IMPACT, submission_set_hash};
use super::sampler::{DEFAULT_RESOLUTION, sample};

/// Grid step used when the funding range is wide.
pub const DEFAULT_STEP: f64 = 500.0;

/// Number of grid positions aimed for on narrow funding ranges.
pub const SAMPLE_TARGET: f64 = 400.0;

/// Fraction of submissions that must cover a grid position for it to be kept.
pub const MIN_CONTRIBUTION_RATIO: f64 = 1.0 / 3.0;

/// Grid positions allowed per call, as a multiple of the sample target. A
/// finer step is widened to fit.
pub const GRID_LIMIT_FACTOR: f64 = 250.0;

// ─────────────────────────────────────────────────────────────────────────────
// Options & diagnostics
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AggregateOptions {
    pub default_step: f64,
    pub sample_target: f64,
    /// Resolution each submission is sampled at.
    pub resolution: usize,
    pub min_contribution_ratio: f64,
    pub smoothing: bool,
    /// Explicit grid step. Ignored unless finite and positive.
    pub step_size: Option<f64>,
}

impl AggregateOptions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            default_step: DEFAULT_STEP,
            sample_target: SAMPLE_TARGET,
            resolution: DEFAULT_RESOLUTION,
            min_contribution_ratio: MIN_CONTRIBUTION_RATIO,
            smoothing: true,
            step_size: None,
        }
    }

    #[must_use]
    pub const fn with_step_size(mut self, step_size: f64) -> Self {
        self.step_size = Some(step_size);
        self
    }

    #[must_use]
    pub const fn with_resolution(mut self, resolution: usize) -> Self {
        self.resolution = resolution;
        self
    }

    #[must_use]
    pub const fn with_min_contribution_ratio(mut self, ratio: f64) -> Self {
        self.min_contribution_ratio = ratio;
        self
    }

    #[must_use]
    pub const fn with_smoothing(mut self, smoothing: bool) -> Self {
        self.smoothing = smoothing;
        self
    }

    fn target(&self) -> f64 {
        if self.sample_target.is_finite() && self.sample_target > 0.0 {
            self.sample_target
        } else {
            SAMPLE_TARGET
        }
    }

    /// Grid step for a funding range ending at `max_domain`, before the
    /// grid limit is applied.
    #[must_use]
    pub fn step_for(&self, max_domain: f64) -> f64 {
        match self.step_size {
            Some(step) if step.is_finite() && step > 0.0 => step,
            _ => self.default_step.min(max_domain / self.target()),
        }
    }

    /// Most grid positions one call visits.
    #[must_use]
    pub fn grid_limit(&self) -> f64 {
        (self.target() * GRID_LIMIT_FACTOR).ceil()
    }

    /// Hash of every option that changes the output, for cache keys.
    #[must_use]
    pub fn cache_salt(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.default_step.to_bits().hash(&mut hasher);
        self.sample_target.to_bits().hash(&mut hasher);
        self.resolution.hash(&mut hasher);
        self.min_contribution_ratio.to_bits().hash(&mut hasher);
        self.smoothing.hash(&mut hasher);
        self.step_size.map(f64::to_bits).hash(&mut hasher);
        hasher.finish()
    }
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// What happened during one aggregation call.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateDiagnostics {
    pub input_count: usize,
    pub valid_count: usize,
    pub skipped_malformed: usize,
    pub max_domain: f64,
    pub step_size: f64,
    /// Grid positions visited.
    pub evaluated: usize,
    pub emitted: usize,
    /// Grid positions dropped for too few contributors.
    pub skipped_low_consensus: usize,
    /// Whether the step was widened to stay within the grid limit.
    pub step_widened: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregation
// ─────────────────────────────────────────────────────────────────────────────

/// Aggregates `submissions` with the default options. `step_size` overrides
/// the grid step when it is finite and positive.
#[must_use]
pub fn aggregate(submissions: &[CurveModel], step_size: Option<f64>) -> Vec<CurvePoint> {
    let mut options = AggregateOptions::default();
    options.step_size = step_size;
    aggregate_with_options(submissions, &options)
}

#[must_use]
pub fn aggregate_with_options(submissions: &[CurveModel], options: &AggregateOptions) -> Vec<CurvePoint> {
    aggregate_with_diagnostics(submissions, options).0
}

/// [`aggregate_with_options`] memoized on the submission set and options.
pub fn aggregate_cached(
    cache: &mut CurveCache,
    submissions: &[CurveModel],
    options: &AggregateOptions,
) -> SharedPoints {
    let key = submission_set_hash(submissions, options.cache_salt());
    cache.get_or_insert_aggregate(key, || aggregate_with_options(submissions, options))
}

pub fn aggregate_with_diagnostics(
    submissions: &[CurveModel],
    options: &AggregateOptions,
) -> (Vec<CurvePoint>, AggregateDiagnostics) {
    let mut diagnostics = AggregateDiagnostics {
        input_count: submissions.len(),
        ..AggregateDiagnostics::default()
    };

    let mut valid: Vec<&CurveModel> = submissions
        .iter()
        .filter(|curve| match curve.validate() {
            Ok(()) => true,
            Err(err) => {
                log::warn!("skipping submission from {:?}: {err}", curve.owner);
                false
            }
        })
        .collect();
    diagnostics.valid_count = valid.len();
    diagnostics.skipped_malformed = submissions.len() - valid.len();

    if valid.is_empty() {
        return (Vec::new(), diagnostics);
    }

    let max_domain = valid
        .iter()
        .map(|curve| curve.funding_at_zero_impact)
        .fold(0.0_f64, f64::max);
    diagnostics.max_domain = max_domain;
    if max_domain <= 0.0 {
        log::debug!("aggregate: all submissions have an empty funding range");
        return (Vec::new(), diagnostics);
    }

    let mut step = options.step_for(max_domain);
    let limit = options.grid_limit();
    if max_domain / step > limit {
        let widened = max_domain / limit;
        log::warn!("aggregate: step {step} over funding range {max_domain} widened to {widened}");
        step = widened;
        diagnostics.step_widened = true;
    }
    diagnostics.step_size = step;
    if !(step.is_finite() && step > 0.0) {
        log::warn!("aggregate: unusable grid step {step}");
        return (Vec::new(), diagnostics);
    }

    // Summation order follows geometry, not input order.
    valid.sort_by_key(|curve| curve.content_hash());
    let sampled = sample_submissions(&valid, options.resolution);
    let required = options.min_contribution_ratio * sampled.len() as f64;

    let mut emitted: Vec<CurvePoint> = Vec::new();
    let mut i = 0_usize;
    loop {
        let x = i as f64 * step;
        if x > max_domain {
            break;
        }
        i += 1;
        diagnostics.evaluated += 1;

        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        let mut contributors = 0_usize;
        for submission in &sampled {
            if let Some((value, weight)) = submission.contribution_at(x) {
                weighted_sum += value * weight;
                weight_total += weight;
                contributors += 1;
            }
        }

        if contributors == 0 || (contributors as f64) < required {
            diagnostics.skipped_low_consensus += 1;
            continue;
        }

        let mut y = weighted_sum / weight_total;
        if options.smoothing {
            if let [.., prev2, prev1] = emitted.as_slice() {
                y = (prev2.y + prev1.y + y) / 3.0;
            }
        }
        emitted.push(CurvePoint::new(x, clamp(y, 0.0, MAX_IMPACT)));
    }

    diagnostics.emitted = emitted.len();
    log::debug!("aggregate: {diagnostics:?}");
    (emitted, diagnostics)
}

/// One submission sampled once for the whole grid walk, ordered by funding.
struct SampledSubmission {
    points: Vec<CurvePoint>,
}

impl SampledSubmission {
    fn new(curve: &CurveModel, resolution: usize) -> Self {
        let mut points = sample(curve, resolution);
        // an inflection point past the x-intercept folds the curve back
        if !is_sorted_by_x(&points) {
            sort_by_x(&mut points);
        }
        Self { points }
    }

    /// Interpolated impact at `x` and its weight, or `None` when the
    /// submission does not bracket `x`.
    fn contribution_at(&self, x: f64) -> Option<(f64, f64)> {
        let (lower, upper) = bracket_at(&self.points, x)?;
        let value = lower.interpolate_y(upper, x)?;
        let weight = 1.0 / (upper.x - lower.x);
        (value.is_finite() && weight.is_finite()).then_some((value, weight))
    }
}

#[cfg(feature = "parallel")]
fn sample_submissions(curves: &[&CurveModel], resolution: usize) -> Vec<SampledSubmission> {
    curves
        .par_iter()
        .map(|curve| SampledSubmission::new(curve, resolution))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn sample_submissions(curves: &[&CurveModel], resolution: usize) -> Vec<SampledSubmission> {
    curves
        .iter()
        .map(|curve| SampledSubmission::new(curve, resolution))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impact::model::InflectionPoint;
    use crate::impact::sampler::impact_at;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn curve_a() -> CurveModel {
        CurveModel::new(100.0, 80.0, InflectionPoint::new(60.0, 60.0))
    }

    fn curve_b() -> CurveModel {
        CurveModel::new(200.0, 40.0, InflectionPoint::new(100.0, 20.0))
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(aggregate(&[], None).is_empty());
        let (points, diagnostics) = aggregate_with_diagnostics(&[], &AggregateOptions::default());
        assert!(points.is_empty());
        assert_eq!(diagnostics.input_count, 0);
    }

    #[test]
    fn zero_funding_ranges_give_empty_output() {
        let flat = CurveModel::new(0.0, 50.0, InflectionPoint::new(0.0, 10.0));
        assert!(aggregate(&[flat.clone(), flat], None).is_empty());
    }

    #[test]
    fn malformed_submissions_are_skipped() {
        let broken = CurveModel::new(f64::NAN, 50.0, InflectionPoint::new(1.0, 1.0));
        let negative = CurveModel::new(-10.0, 50.0, InflectionPoint::new(1.0, 1.0));
        let (points, diagnostics) =
            aggregate_with_diagnostics(&[broken, curve_a(), negative], &AggregateOptions::default());
        assert_eq!(diagnostics.skipped_malformed, 2);
        assert_eq!(diagnostics.valid_count, 1);
        assert_eq!(points, aggregate(&[curve_a()], None));
    }

    #[test]
    fn single_submission_tracks_its_own_curve() {
        let curve = curve_a();
        let reference = sample(&curve, DEFAULT_RESOLUTION);
        let points = aggregate(&[curve], None);
        assert!(!points.is_empty());
        assert_eq!(points[0], CurvePoint::new(0.0, 80.0));
        for point in &points {
            let expected = impact_at(&reference, point.x);
            assert!(
                (point.y - expected).abs() < 2.0,
                "x = {}: aggregate {} vs sample {expected}",
                point.x,
                point.y
            );
        }
    }

    #[test]
    fn step_shrinks_for_narrow_ranges() {
        let (_, diagnostics) = aggregate_with_diagnostics(&[curve_b()], &AggregateOptions::default());
        assert_eq!(diagnostics.step_size, 0.5);
        assert_eq!(diagnostics.evaluated, 401);

        let wide = CurveModel::new(1_000_000.0, 50.0, InflectionPoint::new(1.0, 1.0));
        let (_, diagnostics) = aggregate_with_diagnostics(&[wide], &AggregateOptions::default());
        assert_eq!(diagnostics.step_size, DEFAULT_STEP);
    }

    #[test]
    fn explicit_step_overrides_and_bad_steps_are_ignored() {
        let coarse = aggregate(&[curve_a()], Some(10.0));
        assert!(coarse.iter().all(|p| (p.x / 10.0).fract() == 0.0));
        assert_eq!(aggregate(&[curve_a()], Some(-1.0)), aggregate(&[curve_a()], None));
        assert_eq!(aggregate(&[curve_a()], Some(f64::NAN)), aggregate(&[curve_a()], None));
    }

    #[test]
    fn tiny_explicit_step_is_widened_to_grid_limit() {
        let options = AggregateOptions::default().with_step_size(1e-9);
        let (points, diagnostics) = aggregate_with_diagnostics(&[curve_a()], &options);
        assert!(diagnostics.step_widened);
        assert_eq!(diagnostics.step_size, 100.0 / options.grid_limit());
        assert!(diagnostics.evaluated as f64 <= options.grid_limit() + 1.0);
        assert!(points.last().is_some_and(|p| p.x > 99.0));
    }

    #[test]
    fn folded_curve_over_huge_range_reaches_its_end() {
        let folded = CurveModel::new(1e12, 50.0, InflectionPoint::new(2e12, 10.0));
        let options = AggregateOptions::default();
        let (points, diagnostics) = aggregate_with_diagnostics(&[folded], &options);

        assert!(diagnostics.step_widened);
        assert!(diagnostics.evaluated as f64 <= options.grid_limit() + 1.0);
        assert_eq!(points.first().map(|p| p.x), Some(0.0));
        assert!(points.last().is_some_and(|p| p.x >= 0.999e12));
        assert!(points.iter().all(|p| (0.0..=MAX_IMPACT).contains(&p.y)));
    }

    #[test]
    fn covers_union_of_ranges_and_tail_comes_from_wider_curve() {
        let both = aggregate(&[curve_a(), curve_b()], None);
        let only_b = aggregate(&[curve_b()], None);

        assert_eq!(both.first().map(|p| p.x), Some(0.0));
        assert!(both.last().is_some_and(|p| p.x > 199.0));

        // Past A's range only B contributes; the smoothing memory of A's
        // stretch has decayed after a few dozen grid steps.
        let tail: Vec<_> = both.iter().filter(|p| p.x >= 130.0).collect();
        assert!(!tail.is_empty());
        for point in tail {
            let reference = only_b
                .iter()
                .find(|q| q.x == point.x)
                .expect("same grid for both runs");
            assert!((point.y - reference.y).abs() < 1e-3, "x = {}", point.x);
        }
    }

    #[test]
    fn positions_covered_by_too_few_submissions_are_skipped() {
        let short = [
            curve_a(),
            CurveModel::new(100.0, 60.0, InflectionPoint::new(30.0, 30.0)),
            CurveModel::new(100.0, 90.0, InflectionPoint::new(80.0, 20.0)),
        ];
        let mut all = short.to_vec();
        all.push(curve_b());

        let (points, diagnostics) = aggregate_with_diagnostics(&all, &AggregateOptions::default());
        assert!(!points.is_empty());
        assert!(points.iter().all(|p| p.x < 100.0));
        assert!(diagnostics.skipped_low_consensus > 0);
    }

    #[test]
    fn result_does_not_depend_on_input_order() {
        let c = CurveModel::new(150.0, 70.0, InflectionPoint::new(20.0, 65.0));
        let forward = aggregate(&[curve_a(), curve_b(), c.clone()], None);
        let backward = aggregate(&[c, curve_b(), curve_a()], None);
        assert_eq!(forward, backward);
    }

    #[test]
    fn output_stays_on_impact_axis_for_wild_input() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let curves: Vec<CurveModel> = (0..12)
            .map(|_| {
                CurveModel::new(
                    rng.random_range(0.0..5_000.0),
                    rng.random_range(-500.0..500.0),
                    InflectionPoint::new(
                        rng.random_range(-5_000.0..10_000.0),
                        rng.random_range(-1_000.0..1_000.0),
                    ),
                )
            })
            .collect();

        let points = aggregate(&curves, None);
        assert!(!points.is_empty());
        assert!(points.iter().all(|p| (0.0..=MAX_IMPACT).contains(&p.y)));
        assert!(points.windows(2).all(|w| w[0].x < w[1].x));
    }

    #[test]
    fn cached_aggregate_is_shared_for_reordered_sets() {
        let mut cache = CurveCache::new();
        let options = AggregateOptions::default();
        let first = aggregate_cached(&mut cache, &[curve_a(), curve_b()], &options);
        let second = aggregate_cached(&mut cache, &[curve_b(), curve_a()], &options);
        assert!(std::sync::Arc::ptr_eq(&first, &second));

        let unsmoothed = aggregate_cached(&mut cache, &[curve_a(), curve_b()], &options.with_smoothing(false));
        assert!(!std::sync::Arc::ptr_eq(&first, &unsmoothed));
    }
}
