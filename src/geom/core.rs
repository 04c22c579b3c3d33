use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// CurvePoint
// ─────────────────────────────────────────────────────────────────────────────

/// A single `(funding, impact)` sample.
///
/// `x` is a funding level, `y` an impact score. Every sampled, aggregated or
/// overlaid sequence produced by the engine is a `Vec<CurvePoint>` ordered by
/// the sampling parameter.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CurvePoint {
    pub x: f64,
    pub y: f64,
}

impl CurvePoint {
    /// The origin `(0, 0)`.
    pub const ORIGIN: Self = Self::new(0.0, 0.0);

    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Impact at `x` on the straight segment from `self` to `rhs`.
    ///
    /// Returns `None` when the segment has no horizontal extent.
    #[must_use]
    pub fn interpolate_y(self, rhs: Self, x: f64) -> Option<f64> {
        let width = rhs.x - self.x;
        if width == 0.0 || !width.is_finite() {
            return None;
        }
        let ratio = (x - self.x) / width;
        Some(self.y + ratio * (rhs.y - self.y))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scalar helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Clamp that never panics, unlike `f64::clamp` with `min > max`.
///
/// A NaN `value` comes out as `min`.
#[must_use]
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    let clamped = value.max(min).min(max);
    if clamped.is_nan() { min } else { clamped }
}

/// Rounds `value` to the nearest multiple of `step`. Non-positive or
/// non-finite steps leave the value unchanged.
#[must_use]
pub fn snap_to_step(value: f64, step: f64) -> f64 {
    if step > 0.0 && step.is_finite() {
        (value / step).round() * step
    } else {
        value
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolate_y_on_segment() {
        let a = CurvePoint::new(0.0, 10.0);
        let b = CurvePoint::new(10.0, 0.0);
        assert_eq!(a.interpolate_y(b, 5.0), Some(5.0));
        assert_eq!(a.interpolate_y(b, 0.0), Some(10.0));
    }

    #[test]
    fn interpolate_y_rejects_vertical_segment() {
        let a = CurvePoint::new(3.0, 10.0);
        let b = CurvePoint::new(3.0, 0.0);
        assert_eq!(a.interpolate_y(b, 3.0), None);
    }

    #[test]
    fn clamp_handles_nan_and_inverted_bounds() {
        assert_eq!(clamp(f64::NAN, 0.0, 100.0), 0.0);
        assert_eq!(clamp(150.0, 0.0, 100.0), 100.0);
        assert_eq!(clamp(-5.0, 0.0, 100.0), 0.0);
        assert_eq!(clamp(5.0, 10.0, 0.0), 0.0);
    }

    #[test]
    fn snap_to_step_rounds_to_nearest_multiple() {
        assert_eq!(snap_to_step(1_499.0, 1_000.0), 1_000.0);
        assert_eq!(snap_to_step(1_500.0, 1_000.0), 2_000.0);
        assert_eq!(snap_to_step(-2.4, 1.0), -2.0);
        assert_eq!(snap_to_step(7.3, 0.0), 7.3);
    }
}
