//! Funding-to-impact curves: the per-member model, its sampling, the editing
//! constraints, and the consensus across members and projects.

pub mod aggregate;
pub mod constraint;
pub mod model;
pub mod normalize;
pub mod sampler;

pub use aggregate::{
    AggregateDiagnostics, AggregateOptions, aggregate, aggregate_cached, aggregate_with_diagnostics,
    aggregate_with_options,
};
pub use constraint::{
    Axis, ControlPoint, CurveEditor, DragOptions, DragScale, DragSession, DragState, PixelDelta,
    apply_drag, apply_drag_with_options,
};
pub use model::{
    CurveModel, DEFAULT_DOMAIN_CEILING, InflectionPoint, MAX_IMPACT, ModelError, OwnerIdentity,
    ProjectId, domain_ceiling_or_default, submission_set_hash,
};
pub use normalize::{
    AxisMode, FUNDING_COLUMN, NormalizedPoint, OverlayError, OverlayRow, ProjectCurve,
    consensus_curve, normalize, overlay,
};
pub use sampler::{DEFAULT_RESOLUTION, DRAG_RESOLUTION, impact_at, impact_at_inflection, sample, sample_cached};
