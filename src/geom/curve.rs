use super::core::CurvePoint;

/// A planar parametric curve over the unit domain `[0, 1]`.
pub trait Curve2 {
    fn point_at(&self, t: f64) -> CurvePoint;

    #[must_use]
    fn domain(&self) -> (f64, f64) {
        (0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadraticBezier2 {
    pub p0: CurvePoint,
    pub p1: CurvePoint,
    pub p2: CurvePoint,
}

impl QuadraticBezier2 {
    #[must_use]
    pub const fn new(p0: CurvePoint, p1: CurvePoint, p2: CurvePoint) -> Self {
        Self { p0, p1, p2 }
    }
}

impl Curve2 for QuadraticBezier2 {
    fn point_at(&self, t: f64) -> CurvePoint {
        let t = t.clamp(0.0, 1.0);
        let u = 1.0 - t;
        point_weighted_sum(self.p0, u * u, self.p1, 2.0 * u * t, self.p2, t * t)
    }
}

/// Samples `curve` at `steps + 1` parameters spaced uniformly in `t`.
///
/// Unlike arc-length spacing the samples bunch up where the curve moves
/// slowly, which is what the impact aggregation weights rely on.
#[must_use]
pub fn tessellate_curve_parametric(curve: &impl Curve2, steps: usize) -> Vec<CurvePoint> {
    let steps = steps.max(1);
    let (t0, t1) = curve.domain();
    let span = t1 - t0;
    let denom = steps as f64;
    (0..=steps)
        .map(|i| curve.point_at(t0 + span * (i as f64 / denom)))
        .collect()
}

/// Whether the samples are ordered by non-decreasing `x`.
#[must_use]
pub fn is_sorted_by_x(points: &[CurvePoint]) -> bool {
    points.windows(2).all(|pair| pair[0].x <= pair[1].x)
}

/// Reorders samples by `x`. A curve that bends back on itself in funding
/// keeps every sample; only the order changes.
pub fn sort_by_x(points: &mut [CurvePoint]) {
    points.sort_by(|a, b| a.x.total_cmp(&b.x));
}

/// The two samples around `x`: the last with `sample.x <= x` and the first
/// with `sample.x > x`.
///
/// `points` must be ordered by `x` (see [`sort_by_x`]). Returns `None` when
/// either side is missing.
#[must_use]
pub fn bracket_at(points: &[CurvePoint], x: f64) -> Option<(CurvePoint, CurvePoint)> {
    let upper_idx = points.partition_point(|p| p.x <= x);
    if upper_idx == 0 || upper_idx >= points.len() {
        return None;
    }
    Some((points[upper_idx - 1], points[upper_idx]))
}

/// Interpolated `y` at `x` using the two samples closest to `x`.
///
/// An exact hit on a sample returns that sample's `y`. With a single sample the
/// sample's `y` is returned; with none, `None`.
#[must_use]
pub fn nearest_pair_y(points: &[CurvePoint], x: f64) -> Option<f64> {
    let mut nearest: Option<(f64, CurvePoint)> = None;
    let mut second: Option<(f64, CurvePoint)> = None;
    for &p in points {
        let distance = (p.x - x).abs();
        if distance.is_nan() {
            continue;
        }
        match nearest {
            Some((d, _)) if distance >= d => {
                if second.is_none_or(|(d2, _)| distance < d2) {
                    second = Some((distance, p));
                }
            }
            _ => {
                second = nearest;
                nearest = Some((distance, p));
            }
        }
    }

    let (_, p1) = nearest?;
    if p1.x == x {
        return Some(p1.y);
    }
    match second {
        Some((_, p2)) => Some(p1.interpolate_y(p2, x).unwrap_or(p1.y)),
        None => Some(p1.y),
    }
}

fn point_weighted_sum(
    p0: CurvePoint,
    w0: f64,
    p1: CurvePoint,
    w1: f64,
    p2: CurvePoint,
    w2: f64,
) -> CurvePoint {
    CurvePoint::new(
        p0.x * w0 + p1.x * w1 + p2.x * w2,
        p0.y * w0 + p1.y * w1 + p2.y * w2,
    )
}
