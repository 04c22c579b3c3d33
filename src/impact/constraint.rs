//! Keeps the three control points geometrically valid while they are edited.
//!
//! A drag is a short event stream: pointer-down on a handle, any number of
//! pointer-moves, pointer-up. [`DragSession`] tracks that stream and every move
//! goes through [`apply_drag`], which recomputes the curve from the snapshot
//! taken at pointer-down. Out-of-range input is clamped, never rejected.
//!
//! Inflection impact is always kept at or below the impact intercept, both for
//! drags and for slider edits, so the curve keeps its diminishing-returns shape.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::geom::{CurvePoint, clamp, snap_to_step};

use super::model::{CurveModel, DEFAULT_DOMAIN_CEILING, MAX_IMPACT, domain_ceiling_or_default};
use super::sampler::{self, DEFAULT_RESOLUTION, DRAG_RESOLUTION};

// ============================================================================
// Control points
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    Funding,
    Impact,
}

/// The role of a draggable handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlPoint {
    /// `Intercept(Funding)` is the x-intercept, `Intercept(Impact)` the
    /// y-intercept.
    Intercept(Axis),
    Inflection,
}

impl ControlPoint {
    pub const FUNDING_INTERCEPT: Self = Self::Intercept(Axis::Funding);
    pub const IMPACT_INTERCEPT: Self = Self::Intercept(Axis::Impact);

    /// Short handle name used by chart layers.
    #[must_use]
    pub const fn handle(self) -> &'static str {
        match self {
            Self::Intercept(Axis::Funding) => "x",
            Self::Intercept(Axis::Impact) => "y",
            Self::Inflection => "middle",
        }
    }
}

impl fmt::Display for ControlPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.handle())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown control point handle `{0}`")]
pub struct UnknownHandle(pub String);

impl FromStr for ControlPoint {
    type Err = UnknownHandle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" | "funding" | "xintercept" => Ok(Self::FUNDING_INTERCEPT),
            "y" | "impact" | "yintercept" => Ok(Self::IMPACT_INTERCEPT),
            "middle" | "inflection" | "middlepoint" => Ok(Self::Inflection),
            _ => Err(UnknownHandle(s.to_owned())),
        }
    }
}

// ============================================================================
// Screen-space input
// ============================================================================

/// A pointer position or displacement in surface pixels. `y` grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelDelta {
    pub dx: f64,
    pub dy: f64,
}

impl PixelDelta {
    #[must_use]
    pub const fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    #[must_use]
    pub fn between(from: CurvePoint, to: CurvePoint) -> Self {
        Self::new(to.x - from.x, to.y - from.y)
    }
}

/// Domain units per surface pixel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DragScale {
    pub funding_per_pixel: f64,
    pub impact_per_pixel: f64,
}

impl DragScale {
    #[must_use]
    pub const fn new(funding_per_pixel: f64, impact_per_pixel: f64) -> Self {
        Self {
            funding_per_pixel,
            impact_per_pixel,
        }
    }

    /// Scale for a chart showing `[0, ceiling]` funding by `[0, 100]` impact on
    /// a `width` x `height` pixel surface.
    ///
    /// A surface without a usable size yields a zero scale, which turns drags
    /// into no-ops.
    #[must_use]
    pub fn from_surface(ceiling: f64, width: f64, height: f64) -> Self {
        let per_pixel = |range: f64, pixels: f64| {
            if pixels > 0.0 && pixels.is_finite() && range.is_finite() {
                range / pixels
            } else {
                0.0
            }
        };
        Self::new(per_pixel(ceiling, width), per_pixel(MAX_IMPACT, height))
    }
}

impl Default for DragScale {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

/// Tuning for how pointer movement maps to curve edits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DragOptions {
    /// Multiplier applied to pointer movement.
    pub sensitivity: f64,
    /// Funding deltas are rounded to a multiple of this, when set.
    pub funding_snap: Option<f64>,
    /// Impact deltas are rounded to a multiple of this, when set.
    pub impact_snap: Option<f64>,
}

impl DragOptions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sensitivity: 1.0,
            funding_snap: None,
            impact_snap: None,
        }
    }

    #[must_use]
    pub const fn with_sensitivity(mut self, sensitivity: f64) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    #[must_use]
    pub const fn with_funding_snap(mut self, step: f64) -> Self {
        self.funding_snap = Some(step);
        self
    }

    #[must_use]
    pub const fn with_impact_snap(mut self, step: f64) -> Self {
        self.impact_snap = Some(step);
        self
    }

    /// Pixel delta to `(funding delta, impact delta)`. The impact delta is
    /// negated because screen `y` grows downward.
    fn domain_delta(&self, delta: PixelDelta, scale: DragScale) -> (f64, f64) {
        let sensitivity = if self.sensitivity.is_finite() { self.sensitivity } else { 1.0 };
        let mut funding = delta.dx * scale.funding_per_pixel * sensitivity;
        let mut impact = -delta.dy * scale.impact_per_pixel * sensitivity;
        if let Some(step) = self.funding_snap {
            funding = snap_to_step(funding, step);
        }
        if let Some(step) = self.impact_snap {
            impact = snap_to_step(impact, step);
        }
        (finite_or_zero(funding), finite_or_zero(impact))
    }
}

impl Default for DragOptions {
    fn default() -> Self {
        Self::new()
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

// ============================================================================
// Constraint solver
// ============================================================================

/// Computes the curve that results from dragging `active` by `delta` pixels,
/// starting from `initial` (the curve as it was at pointer-down).
#[must_use]
pub fn apply_drag(
    initial: &CurveModel,
    active: ControlPoint,
    delta: PixelDelta,
    scale: DragScale,
    ceiling: f64,
) -> CurveModel {
    apply_drag_with_options(initial, active, delta, scale, ceiling, &DragOptions::default())
}

/// [`apply_drag`] with explicit [`DragOptions`].
#[must_use]
pub fn apply_drag_with_options(
    initial: &CurveModel,
    active: ControlPoint,
    delta: PixelDelta,
    scale: DragScale,
    ceiling: f64,
    options: &DragOptions,
) -> CurveModel {
    let ceiling = domain_ceiling_or_default(Some(ceiling));
    let (funding_delta, impact_delta) = options.domain_delta(delta, scale);
    let mut next = initial.clone();
    let start = &initial.inflection_point;

    match active {
        ControlPoint::Intercept(Axis::Funding) => {
            let old = initial.funding_at_zero_impact;
            let new = clamp(old + funding_delta, 0.0, ceiling);
            // Keep the inflection at the same fraction of the funding range.
            let rescaled = if old > 0.0 {
                start.funding_level * new / old
            } else {
                start.funding_level
            };
            next.funding_at_zero_impact = new;
            next.inflection_point.funding_level = clamp(rescaled, 0.0, new);
        }
        ControlPoint::Intercept(Axis::Impact) => {
            let new = clamp(initial.impact_at_first_dollar + impact_delta, 0.0, MAX_IMPACT);
            next.impact_at_first_dollar = new;
            next.inflection_point.impact_score = clamp(start.impact_score, 0.0, new);
        }
        ControlPoint::Inflection => {
            next.inflection_point.funding_level = clamp(
                start.funding_level + funding_delta,
                0.0,
                initial.funding_at_zero_impact,
            );
            next.inflection_point.impact_score = clamp(
                start.impact_score + impact_delta,
                0.0,
                initial.impact_at_first_dollar,
            );
        }
    }
    next
}

// ============================================================================
// Drag session
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        point: ControlPoint,
        origin: CurvePoint,
        initial: CurveModel,
    },
}

/// Pointer-down / move / up state machine for one editing session.
#[derive(Debug, Clone, Default)]
pub struct DragSession {
    state: DragState,
}

impl DragSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> &DragState {
        &self.state
    }

    #[must_use]
    pub fn active_point(&self) -> Option<ControlPoint> {
        match self.state {
            DragState::Idle => None,
            DragState::Dragging { point, .. } => Some(point),
        }
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.active_point().is_some()
    }

    /// Starts dragging `point`, snapshotting `current` as the drag origin. A
    /// pointer-down during a drag restarts the session from `current`.
    pub fn pointer_down(&mut self, point: ControlPoint, at: CurvePoint, current: &CurveModel) {
        self.state = DragState::Dragging {
            point,
            origin: at,
            initial: current.clone(),
        };
    }

    /// The curve for a pointer now at `at`, or `None` when idle.
    #[must_use]
    pub fn pointer_move(
        &self,
        at: CurvePoint,
        scale: DragScale,
        ceiling: f64,
        options: &DragOptions,
    ) -> Option<CurveModel> {
        match &self.state {
            DragState::Idle => None,
            DragState::Dragging {
                point,
                origin,
                initial,
            } => Some(apply_drag_with_options(
                initial,
                *point,
                PixelDelta::between(*origin, at),
                scale,
                ceiling,
                options,
            )),
        }
    }

    /// Ends the drag, returning the point that was being dragged.
    pub fn pointer_up(&mut self) -> Option<ControlPoint> {
        let released = self.active_point();
        self.state = DragState::Idle;
        released
    }
}

// ============================================================================
// Editor
// ============================================================================

/// Owns the curve a member is editing for one project.
#[derive(Debug, Clone)]
pub struct CurveEditor {
    curve: CurveModel,
    ceiling: f64,
    scale: DragScale,
    options: DragOptions,
    session: DragSession,
}

impl Default for CurveEditor {
    fn default() -> Self {
        Self::new(DEFAULT_DOMAIN_CEILING)
    }
}

impl CurveEditor {
    /// Editor seeded with the default curve, for a project asking `ceiling`.
    #[must_use]
    pub fn new(ceiling: f64) -> Self {
        Self::with_curve(CurveModel::default(), ceiling)
    }

    /// Editor starting from `curve`, pulled inside the editor invariants.
    #[must_use]
    pub fn with_curve(curve: CurveModel, ceiling: f64) -> Self {
        let ceiling = domain_ceiling_or_default(Some(ceiling));
        Self {
            curve: curve.constrained(ceiling),
            ceiling,
            scale: DragScale::default(),
            options: DragOptions::default(),
            session: DragSession::new(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: DragOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn curve(&self) -> &CurveModel {
        &self.curve
    }

    #[must_use]
    pub fn into_curve(self) -> CurveModel {
        self.curve
    }

    #[must_use]
    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    #[must_use]
    pub fn scale(&self) -> DragScale {
        self.scale
    }

    #[must_use]
    pub fn session(&self) -> &DragSession {
        &self.session
    }

    pub fn set_options(&mut self, options: DragOptions) {
        self.options = options;
    }

    /// Derives the drag scale from the chart surface size in pixels.
    pub fn set_surface_size(&mut self, width: f64, height: f64) {
        self.scale = DragScale::from_surface(self.ceiling, width, height);
    }

    pub fn set_scale(&mut self, scale: DragScale) {
        self.scale = scale;
    }

    pub fn begin_drag(&mut self, point: ControlPoint, at: CurvePoint) {
        self.session.pointer_down(point, at, &self.curve);
    }

    /// Moves the active handle; a no-op when no drag is in progress.
    pub fn drag_to(&mut self, at: CurvePoint) -> &CurveModel {
        if let Some(next) = self
            .session
            .pointer_move(at, self.scale, self.ceiling, &self.options)
        {
            self.curve = next;
        }
        &self.curve
    }

    pub fn end_drag(&mut self) -> &CurveModel {
        if let Some(point) = self.session.pointer_up() {
            log::debug!("drag of {point} handle ended: {:?}", self.curve);
        }
        &self.curve
    }

    /// Slider edit of the funding intercept. The inflection is clamped, not
    /// rescaled, matching what the user sees on the slider.
    pub fn set_funding_at_zero_impact(&mut self, value: f64) -> &CurveModel {
        if value.is_finite() {
            let x = clamp(value, 0.0, self.ceiling);
            self.curve.funding_at_zero_impact = x;
            let p = &mut self.curve.inflection_point;
            p.funding_level = clamp(p.funding_level, 0.0, x);
        }
        &self.curve
    }

    pub fn set_impact_at_first_dollar(&mut self, value: f64) -> &CurveModel {
        if value.is_finite() {
            let y = clamp(value, 0.0, MAX_IMPACT);
            self.curve.impact_at_first_dollar = y;
            let p = &mut self.curve.inflection_point;
            p.impact_score = clamp(p.impact_score, 0.0, y);
        }
        &self.curve
    }

    pub fn set_inflection_funding(&mut self, value: f64) -> &CurveModel {
        if value.is_finite() {
            self.curve.inflection_point.funding_level =
                clamp(value, 0.0, self.curve.funding_at_zero_impact);
        }
        &self.curve
    }

    pub fn set_inflection_impact(&mut self, value: f64) -> &CurveModel {
        if value.is_finite() {
            self.curve.inflection_point.impact_score =
                clamp(value, 0.0, self.curve.impact_at_first_dollar);
        }
        &self.curve
    }

    /// Resolution to sample at: coarse while dragging, full otherwise.
    #[must_use]
    pub fn preview_resolution(&self) -> usize {
        if self.session.is_dragging() {
            DRAG_RESOLUTION
        } else {
            DEFAULT_RESOLUTION
        }
    }

    #[must_use]
    pub fn preview(&self) -> Vec<CurvePoint> {
        sampler::sample(&self.curve, self.preview_resolution())
    }
}
