//! Inzendingen van curves: onbetrouwbare records, het `[curve-data]`
//! antwoordformaat en de controle op dubbele inzendingen.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::impact::model::{CurveModel, ModelError, OwnerIdentity, ProjectId};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Markering waarmee een antwoord in een discussie een curve bevat.
pub const CURVE_TAG: &str = "[curve-data]";

static CURVE_TAG_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\[curve-data\](.*)"));

/// Beschrijft fouten bij het inlezen of indienen van een curve.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// Het record is geen geldige curve-JSON.
    #[error("ongeldige curve-JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// De curve is gelezen maar onbruikbaar.
    #[error("ongeldige curve: {0}")]
    Invalid(#[from] ModelError),
    /// Deze eigenaar heeft al een curve voor dit project ingediend.
    #[error("{owner} heeft al een curve ingediend voor project {project_id}")]
    Duplicate {
        project_id: ProjectId,
        owner: OwnerIdentity,
    },
    /// Het patroon voor de curve-markering kon niet gebouwd worden.
    #[error("ongeldig markeringspatroon: {0}")]
    Pattern(#[from] regex::Error),
}

pub type SubmissionResult<T> = Result<T, SubmissionError>;

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

/// Leest één onbetrouwbaar record. Zowel de opslagnamen (`xIntercept`, ...)
/// als de beschrijvende namen worden geaccepteerd; de eigenaar mag een getal
/// of een tekst zijn.
pub fn parse_submission(record: &Value) -> SubmissionResult<CurveModel> {
    let curve = CurveModel::deserialize(record)?;
    curve.validate()?;
    Ok(curve)
}

/// Resultaat van [`parse_submissions`].
#[derive(Debug, Clone, Default)]
pub struct ParsedSubmissions {
    pub curves: Vec<CurveModel>,
    /// Aantal records dat overgeslagen is.
    pub skipped: usize,
}

/// Leest een lijst records. Een fout record wordt gelogd en overgeslagen.
#[must_use]
pub fn parse_submissions(records: &[Value]) -> ParsedSubmissions {
    let mut parsed = ParsedSubmissions::default();
    for (index, result) in parse_records(records).into_iter().enumerate() {
        match result {
            Ok(curve) => parsed.curves.push(curve),
            Err(err) => {
                log::warn!("record {index} overgeslagen: {err}");
                parsed.skipped += 1;
            }
        }
    }
    log::debug!(
        "{} curves gelezen, {} overgeslagen",
        parsed.curves.len(),
        parsed.skipped
    );
    parsed
}

#[cfg(feature = "parallel")]
fn parse_records(records: &[Value]) -> Vec<SubmissionResult<CurveModel>> {
    records.par_iter().map(parse_submission).collect()
}

#[cfg(not(feature = "parallel"))]
fn parse_records(records: &[Value]) -> Vec<SubmissionResult<CurveModel>> {
    records.iter().map(parse_submission).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Antwoordformaat
// ─────────────────────────────────────────────────────────────────────────────

/// Bouwt de antwoordtekst `[curve-data]{json}`. De eigenaar gaat niet mee:
/// die volgt uit de auteur van het antwoord.
pub fn encode_curve_reply(curve: &CurveModel) -> SubmissionResult<String> {
    let payload = CurveModel {
        owner: None,
        ..curve.clone()
    };
    Ok(format!("{CURVE_TAG}{}", serde_json::to_string(&payload)?))
}

/// Leest de curve uit een antwoordtekst. `None` betekent een gewone reactie.
#[must_use]
pub fn decode_curve_reply(text: &str) -> Option<SubmissionResult<CurveModel>> {
    let pattern = match CURVE_TAG_PATTERN.as_ref() {
        Ok(pattern) => pattern,
        Err(err) => return Some(Err(err.clone().into())),
    };
    let payload = pattern.captures(text)?.get(1)?.as_str();
    Some(
        serde_json::from_str::<CurveModel>(payload)
            .map_err(SubmissionError::from)
            .and_then(|curve| {
                curve.validate()?;
                Ok(curve)
            }),
    )
}

/// Eén antwoord in de discussie onder een project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub author: OwnerIdentity,
    pub text: String,
}

impl Reply {
    #[must_use]
    pub fn new(author: impl Into<OwnerIdentity>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
        }
    }
}

/// Een discussie gesplitst in curve-inzendingen en gewone reacties.
#[derive(Debug, Clone, Default)]
pub struct ThreadContents {
    pub submissions: Vec<CurveModel>,
    pub comments: Vec<Reply>,
    /// Gemarkeerde antwoorden waarvan de curve onleesbaar was.
    pub malformed: usize,
}

/// Splitst de antwoorden van een discussie. Een inzending krijgt de auteur
/// van het antwoord als eigenaar, ongeacht wat er in de payload staat.
#[must_use]
pub fn partition_replies(replies: &[Reply]) -> ThreadContents {
    let mut contents = ThreadContents::default();
    for reply in replies {
        match decode_curve_reply(&reply.text) {
            None => contents.comments.push(reply.clone()),
            Some(Ok(curve)) => contents
                .submissions
                .push(curve.with_owner(reply.author.clone())),
            Some(Err(err)) => {
                log::warn!("curve van {} niet leesbaar: {err}", reply.author);
                contents.malformed += 1;
            }
        }
    }
    contents
}

// ─────────────────────────────────────────────────────────────────────────────
// Dubbele inzendingen
// ─────────────────────────────────────────────────────────────────────────────

/// Opzoeking of een eigenaar al een curve voor een project heeft ingediend.
pub trait SubmissionLedger {
    fn has_submission(&self, project_id: &ProjectId, owner: &OwnerIdentity) -> bool;
}

/// In-memory [`SubmissionLedger`] op basis van gelezen discussies.
#[derive(Debug, Clone, Default)]
pub struct SubmissionIndex {
    entries: HashMap<(ProjectId, OwnerIdentity), CurveModel>,
}

impl SubmissionIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_thread(project_id: &ProjectId, contents: &ThreadContents) -> Self {
        let mut index = Self::new();
        for curve in &contents.submissions {
            index.record(project_id, curve.clone());
        }
        index
    }

    /// Registreert een inzending. Alleen de eerste per (project, eigenaar)
    /// telt; curves zonder eigenaar worden niet opgenomen.
    pub fn record(&mut self, project_id: &ProjectId, curve: CurveModel) -> bool {
        let Some(owner) = curve.owner.clone() else {
            log::debug!("curve zonder eigenaar niet geïndexeerd");
            return false;
        };
        let key = (project_id.clone(), owner);
        if self.entries.contains_key(&key) {
            log::debug!("dubbele inzending van {} genegeerd", key.1);
            return false;
        }
        self.entries.insert(key, curve);
        true
    }

    #[must_use]
    pub fn submission(&self, project_id: &ProjectId, owner: &OwnerIdentity) -> Option<&CurveModel> {
        self.entries.get(&(project_id.clone(), owner.clone()))
    }

    /// Alle inzendingen voor een project, gesorteerd op eigenaar.
    #[must_use]
    pub fn curves_for(&self, project_id: &ProjectId) -> Vec<CurveModel> {
        let mut curves: Vec<(&OwnerIdentity, &CurveModel)> = self
            .entries
            .iter()
            .filter(|((project, _), _)| project == project_id)
            .map(|((_, owner), curve)| (owner, curve))
            .collect();
        curves.sort_by(|a, b| a.0.cmp(b.0));
        curves.into_iter().map(|(_, curve)| curve.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SubmissionLedger for SubmissionIndex {
    fn has_submission(&self, project_id: &ProjectId, owner: &OwnerIdentity) -> bool {
        self.submission(project_id, owner).is_some()
    }
}

/// Wat de host moet publiceren om een curve in te dienen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub project_id: ProjectId,
    pub owner: OwnerIdentity,
    pub text: String,
}

/// Controleert een nieuwe inzending en bouwt de antwoordtekst.
///
/// Een tweede inzending van dezelfde eigenaar voor hetzelfde project wordt
/// geweigerd, net als een onbruikbare curve.
pub fn prepare_submission(
    ledger: &impl SubmissionLedger,
    project_id: &ProjectId,
    owner: &OwnerIdentity,
    curve: &CurveModel,
) -> SubmissionResult<SubmissionRequest> {
    if ledger.has_submission(project_id, owner) {
        return Err(SubmissionError::Duplicate {
            project_id: project_id.clone(),
            owner: owner.clone(),
        });
    }
    curve.validate()?;
    Ok(SubmissionRequest {
        project_id: project_id.clone(),
        owner: owner.clone(),
        text: encode_curve_reply(curve)?,
    })
}
