mod cache;
mod core;
mod curve;

pub use cache::{
    CurveCache, CurveCacheStats, DEFAULT_AGGREGATE_CAPACITY, DEFAULT_SAMPLE_CAPACITY, SharedPoints,
};
pub use core::{CurvePoint, clamp, snap_to_step};
pub use curve::{
    Curve2, QuadraticBezier2, bracket_at, is_sorted_by_x, nearest_pair_y, sort_by_x,
    tessellate_curve_parametric,
};

#[cfg(test)]
mod tests;
