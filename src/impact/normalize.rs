//! Puts consensus curves of projects with different funding ceilings on one
//! chart.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::geom::{CurvePoint, nearest_pair_y};

use super::aggregate::{AggregateOptions, aggregate_with_options};
use super::model::{CurveModel, ProjectId};

/// Number of intervals on the shared overlay grid (101 rows).
pub const OVERLAY_STEPS: usize = 100;

/// A point on the 0-100 % funding axis, remembering where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPoint {
    /// Funding as a percentage of the project's ceiling.
    pub x: f64,
    pub y: f64,
    /// Funding in currency units, for tooltips.
    pub original_x: f64,
}

impl From<NormalizedPoint> for CurvePoint {
    fn from(value: NormalizedPoint) -> Self {
        Self::new(value.x, value.y)
    }
}

/// Rescales `curve` so that `ceiling` maps to 100.
///
/// A ceiling that is not finite and positive gives an empty result.
#[must_use]
pub fn normalize(curve: &[CurvePoint], ceiling: f64) -> Vec<NormalizedPoint> {
    if !(ceiling.is_finite() && ceiling > 0.0) {
        log::warn!("normalize: unusable funding ceiling {ceiling}");
        return Vec::new();
    }
    curve
        .iter()
        .map(|point| NormalizedPoint {
            x: point.x / ceiling * 100.0,
            y: point.y,
            original_x: point.x,
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-project consensus
// ─────────────────────────────────────────────────────────────────────────────

/// The consensus curve of one project in absolute funding units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCurve {
    pub project_id: ProjectId,
    pub domain_ceiling: f64,
    pub points: Vec<CurvePoint>,
}

impl ProjectCurve {
    /// Flat zero curve shown for projects nobody has estimated yet.
    #[must_use]
    pub fn placeholder(project_id: ProjectId, ceiling: f64) -> Self {
        Self {
            points: vec![
                CurvePoint::ORIGIN,
                CurvePoint::new(ceiling / 2.0, 0.0),
                CurvePoint::new(ceiling, 0.0),
            ],
            project_id,
            domain_ceiling: ceiling,
        }
    }

    /// Wraps an aggregate; an empty one becomes the placeholder.
    #[must_use]
    pub fn from_aggregate(project_id: ProjectId, ceiling: f64, points: Vec<CurvePoint>) -> Self {
        if points.is_empty() {
            log::debug!("project {project_id}: no usable submissions, using placeholder");
            return Self::placeholder(project_id, ceiling);
        }
        Self {
            project_id,
            domain_ceiling: ceiling,
            points,
        }
    }

    #[must_use]
    pub fn normalized(&self) -> Vec<NormalizedPoint> {
        normalize(&self.points, self.domain_ceiling)
    }

    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.points.iter().all(|p| p.y == 0.0)
    }
}

/// Aggregates a project's submissions, falling back to the placeholder when
/// none of them produce a point.
#[must_use]
pub fn consensus_curve(
    project_id: ProjectId,
    ceiling: f64,
    submissions: &[CurveModel],
    options: &AggregateOptions,
) -> ProjectCurve {
    ProjectCurve::from_aggregate(project_id, ceiling, aggregate_with_options(submissions, options))
}

// ─────────────────────────────────────────────────────────────────────────────
// Overlay
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AxisMode {
    /// Funding as a percentage of each project's ceiling.
    #[default]
    Normalized,
    /// Funding in currency units.
    Absolute,
}

/// Column holding the funding position in a serialized [`OverlayRow`].
pub const FUNDING_COLUMN: &str = "x";

/// One grid position of the overlay chart: an impact value per project id.
///
/// Serializes flat, so project ids share the object with [`FUNDING_COLUMN`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayRow {
    pub x: f64,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OverlayError {
    #[error(
        "cannot overlay funding ceilings {first} and {other} on an absolute axis; normalize first"
    )]
    MixedFundingScales { first: f64, other: f64 },
    #[error("project `{0}` appears more than once in the overlay")]
    DuplicateProject(String),
    #[error("project id `x` is reserved for the funding column")]
    ReservedProjectId,
}

/// Resamples every curve onto a shared grid of 101 funding positions.
///
/// Values are interpolated between the two nearest points and floored at 0.
/// On the absolute axis a position past a project's ceiling reads 0, and
/// projects with different ceilings are rejected. Project ids must be unique
/// and must not be [`FUNDING_COLUMN`].
pub fn overlay(curves: &[ProjectCurve], mode: AxisMode) -> Result<Vec<OverlayRow>, OverlayError> {
    if curves.is_empty() {
        return Ok(Vec::new());
    }

    let mut seen = HashSet::with_capacity(curves.len());
    for curve in curves {
        let id = curve.project_id.as_str();
        if id == FUNDING_COLUMN {
            return Err(OverlayError::ReservedProjectId);
        }
        if !seen.insert(id) {
            return Err(OverlayError::DuplicateProject(id.to_owned()));
        }
    }

    let series: Vec<(&ProjectCurve, Vec<CurvePoint>)> = match mode {
        AxisMode::Normalized => curves
            .iter()
            .map(|curve| {
                let points = curve.normalized().into_iter().map(CurvePoint::from).collect();
                (curve, points)
            })
            .collect(),
        AxisMode::Absolute => {
            let first = curves[0].domain_ceiling;
            if let Some(other) = curves.iter().map(|c| c.domain_ceiling).find(|&c| c != first) {
                return Err(OverlayError::MixedFundingScales { first, other });
            }
            curves.iter().map(|curve| (curve, curve.points.clone())).collect()
        }
    };

    let max_x = match mode {
        AxisMode::Normalized => 100.0,
        AxisMode::Absolute => series
            .iter()
            .flat_map(|(_, points)| points.iter().map(|p| p.x))
            .filter(|x| x.is_finite())
            .fold(0.0_f64, f64::max),
    };
    let step = max_x / OVERLAY_STEPS as f64;

    let rows = (0..=OVERLAY_STEPS)
        .map(|i| {
            let x = i as f64 * step;
            let values = series
                .iter()
                .filter_map(|(curve, points)| {
                    let value = if mode == AxisMode::Absolute && x > curve.domain_ceiling {
                        0.0
                    } else {
                        nearest_pair_y(points, x)?.max(0.0)
                    };
                    Some((curve.project_id.to_string(), value))
                })
                .collect();
            OverlayRow { x, values }
        })
        .collect();
    Ok(rows)
}
