//! Turns a [`CurveModel`] into a dense, ordered `(funding, impact)` sequence.

use crate::geom::{
    CurveCache, CurvePoint, QuadraticBezier2, SharedPoints, nearest_pair_y,
    tessellate_curve_parametric,
};

use super::model::CurveModel;

/// Resolution for the final rendered curve and for aggregation.
pub const DEFAULT_RESOLUTION: usize = 10_000;

/// Cheaper resolution used while a control point is being dragged.
pub const DRAG_RESOLUTION: usize = 1_000;

/// Samples `curve` as a quadratic Bézier at `resolution + 1` uniformly spaced
/// parameters.
///
/// The first point is exactly `(0, impact_at_first_dollar)` and the last is
/// exactly `(funding_at_zero_impact, 0)`. A `resolution` of 0 is treated as 1.
/// A curve with zero funding collapses onto the impact axis: every sample then
/// sits at funding 0.
#[must_use]
pub fn sample(curve: &CurveModel, resolution: usize) -> Vec<CurvePoint> {
    let mut bezier = curve.bezier();
    if curve.funding_at_zero_impact == 0.0 {
        bezier.p1.x = 0.0;
    }

    let mut points = tessellate_curve_parametric(&bezier, resolution);
    pin_endpoints(&mut points, &bezier);
    points
}

/// [`sample`] through a [`CurveCache`].
pub fn sample_cached(cache: &mut CurveCache, curve: &CurveModel, resolution: usize) -> SharedPoints {
    cache.get_or_insert_samples(curve.content_hash(), resolution, || sample(curve, resolution))
}

/// Impact at `funding` read off a sampled curve, interpolating between the two
/// samples nearest to it. Empty input reads as zero impact.
#[must_use]
pub fn impact_at(samples: &[CurvePoint], funding: f64) -> f64 {
    nearest_pair_y(samples, funding).unwrap_or(0.0)
}

/// Impact shown next to the inflection handle: the drag-resolution sample
/// closest to the inflection funding level, rounded to one decimal.
#[must_use]
pub fn impact_at_inflection(curve: &CurveModel) -> f64 {
    let target = curve.inflection_point.funding_level;
    let samples = sample(curve, DRAG_RESOLUTION);
    let closest = samples.iter().copied().reduce(|closest, point| {
        if (point.x - target).abs() < (closest.x - target).abs() {
            point
        } else {
            closest
        }
    });
    closest.map_or(0.0, |point| (point.y * 10.0).round() / 10.0)
}

fn pin_endpoints(points: &mut [CurvePoint], bezier: &QuadraticBezier2) {
    if let Some(first) = points.first_mut() {
        *first = bezier.p0;
    }
    if let Some(last) = points.last_mut() {
        *last = bezier.p2;
    }
}
