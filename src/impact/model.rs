//! The funding-to-impact estimate one member submits for one project.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::geom::{CurvePoint, QuadraticBezier2, clamp};

/// Upper bound of the impact axis.
pub const MAX_IMPACT: f64 = 100.0;

/// Funding ceiling used when a project does not state its requested funding.
pub const DEFAULT_DOMAIN_CEILING: f64 = 200_000.0;

/// Returns `ceiling` when it is a usable bound (finite and positive),
/// otherwise [`DEFAULT_DOMAIN_CEILING`].
#[must_use]
pub fn domain_ceiling_or_default(ceiling: Option<f64>) -> f64 {
    match ceiling {
        Some(value) if value.is_finite() && value > 0.0 => value,
        _ => DEFAULT_DOMAIN_CEILING,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Identities
// ─────────────────────────────────────────────────────────────────────────────

/// Who submitted an estimate. The social graph hands out numeric ids; other
/// stores may use opaque strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OwnerIdentity {
    Fid(u64),
    Name(String),
}

impl fmt::Display for OwnerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fid(fid) => write!(f, "fid:{fid}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<u64> for OwnerIdentity {
    fn from(value: u64) -> Self {
        Self::Fid(value)
    }
}

impl From<&str> for OwnerIdentity {
    fn from(value: &str) -> Self {
        Self::Name(value.to_owned())
    }
}

/// Identifier of a project (the hash of its announcement post).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl ProjectId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for ProjectId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CurveModel
// ─────────────────────────────────────────────────────────────────────────────

/// The interior control point shaping how quickly returns diminish.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InflectionPoint {
    #[serde(rename = "x", alias = "fundingLevel")]
    pub funding_level: f64,
    #[serde(rename = "y", alias = "impactScore")]
    pub impact_score: f64,
}

impl InflectionPoint {
    #[must_use]
    pub const fn new(funding_level: f64, impact_score: f64) -> Self {
        Self {
            funding_level,
            impact_score,
        }
    }
}

/// One member's funding-to-impact estimate.
///
/// Serialized with the field names the content store uses (`xIntercept`,
/// `yIntercept`, `middlePoint`, `authorFid`); the descriptive names are
/// accepted on input too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveModel {
    /// Funding level past which more money adds no impact (x-intercept).
    #[serde(rename = "xIntercept", alias = "fundingAtZeroImpact")]
    pub funding_at_zero_impact: f64,
    /// Impact of the very first unit of funding (y-intercept).
    #[serde(rename = "yIntercept", alias = "impactAtFirstDollar")]
    pub impact_at_first_dollar: f64,
    #[serde(rename = "middlePoint", alias = "inflectionPoint")]
    pub inflection_point: InflectionPoint,
    #[serde(
        rename = "authorFid",
        alias = "ownerIdentity",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub owner: Option<OwnerIdentity>,
}

/// Reasons a curve cannot be used at all.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("field `{field}` must be a finite number, got {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("funding at zero impact must not be negative, got {value}")]
    NegativeFunding { value: f64 },
}

impl Default for CurveModel {
    /// The estimate the editor opens with.
    fn default() -> Self {
        Self::new(100.0, 80.0, InflectionPoint::new(60.0, 60.0))
    }
}

impl CurveModel {
    #[must_use]
    pub const fn new(
        funding_at_zero_impact: f64,
        impact_at_first_dollar: f64,
        inflection_point: InflectionPoint,
    ) -> Self {
        Self {
            funding_at_zero_impact,
            impact_at_first_dollar,
            inflection_point,
            owner: None,
        }
    }

    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<OwnerIdentity>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// The three Bézier control points `P0`, `P1`, `P2`.
    #[must_use]
    pub const fn control_points(&self) -> [CurvePoint; 3] {
        [
            CurvePoint::new(0.0, self.impact_at_first_dollar),
            CurvePoint::new(
                self.inflection_point.funding_level,
                self.inflection_point.impact_score,
            ),
            CurvePoint::new(self.funding_at_zero_impact, 0.0),
        ]
    }

    #[must_use]
    pub const fn bezier(&self) -> QuadraticBezier2 {
        let [p0, p1, p2] = self.control_points();
        QuadraticBezier2::new(p0, p1, p2)
    }

    /// Checks that the curve can be sampled at all: every number finite and
    /// the funding intercept non-negative. The editor invariants are not
    /// checked here; see [`CurveModel::satisfies_editor_invariants`].
    pub fn validate(&self) -> Result<(), ModelError> {
        let fields = [
            ("xIntercept", self.funding_at_zero_impact),
            ("yIntercept", self.impact_at_first_dollar),
            ("middlePoint.x", self.inflection_point.funding_level),
            ("middlePoint.y", self.inflection_point.impact_score),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(ModelError::NonFinite { field, value });
            }
        }
        if self.funding_at_zero_impact < 0.0 {
            return Err(ModelError::NegativeFunding {
                value: self.funding_at_zero_impact,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.validate().is_ok()
    }

    /// Whether the geometric ordering the editor maintains holds.
    #[must_use]
    pub fn satisfies_editor_invariants(&self, ceiling: f64) -> bool {
        let x = self.funding_at_zero_impact;
        let y = self.impact_at_first_dollar;
        let p = self.inflection_point;
        self.is_well_formed()
            && x <= ceiling
            && (0.0..=MAX_IMPACT).contains(&y)
            && (0.0..=x).contains(&p.funding_level)
            && (0.0..=y).contains(&p.impact_score)
    }

    /// Copy of the curve pulled inside the editor invariants for `ceiling`.
    #[must_use]
    pub fn constrained(&self, ceiling: f64) -> Self {
        let x = clamp(self.funding_at_zero_impact, 0.0, ceiling);
        let y = clamp(self.impact_at_first_dollar, 0.0, MAX_IMPACT);
        Self {
            funding_at_zero_impact: x,
            impact_at_first_dollar: y,
            inflection_point: InflectionPoint::new(
                clamp(self.inflection_point.funding_level, 0.0, x),
                clamp(self.inflection_point.impact_score, 0.0, y),
            ),
            owner: self.owner.clone(),
        }
    }

    /// Hash of the curve geometry. The owner is not part of it: two members
    /// drawing the same curve share cached samples.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash_geometry(&mut hasher);
        hasher.finish()
    }

    fn hash_geometry<H: Hasher>(&self, state: &mut H) {
        self.funding_at_zero_impact.to_bits().hash(state);
        self.impact_at_first_dollar.to_bits().hash(state);
        self.inflection_point.funding_level.to_bits().hash(state);
        self.inflection_point.impact_score.to_bits().hash(state);
    }
}

/// Order-independent hash of a submission set, combined with `salt` (usually
/// a hash of the aggregation options).
#[must_use]
pub fn submission_set_hash(curves: &[CurveModel], salt: u64) -> u64 {
    let mut member_hashes: Vec<u64> = curves.iter().map(CurveModel::content_hash).collect();
    member_hashes.sort_unstable();

    let mut hasher = DefaultHasher::new();
    member_hashes.hash(&mut hasher);
    salt.hash(&mut hasher);
    hasher.finish()
}
