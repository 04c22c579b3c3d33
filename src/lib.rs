#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_precision_loss,
    clippy::float_cmp
)]

pub mod geom;
pub mod impact;
pub mod parse;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use wasm_bindgen::JsError;
use wasm_bindgen::prelude::*;

use geom::{CurveCache, CurveCacheStats, CurvePoint, SharedPoints};
use impact::constraint::UnknownHandle;
use impact::{
    AggregateOptions, AxisMode, ControlPoint, CurveEditor, CurveModel, DEFAULT_DOMAIN_CEILING,
    DEFAULT_RESOLUTION, DRAG_RESOLUTION, DragOptions, NormalizedPoint, OverlayError, OverlayRow,
    OwnerIdentity, ProjectCurve, ProjectId, aggregate_cached, impact_at_inflection, overlay,
    sample_cached,
};
use parse::{Reply, SubmissionError, SubmissionIndex, SubmissionRequest};

cfg_if::cfg_if! {
    if #[cfg(all(feature = "console_error_panic_hook", target_arch = "wasm32"))] {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            console_error_panic_hook::set_once();
            init_logger();
        }
    } else {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            // no-op fallback when panic hook is disabled
            init_logger();
        }
    }
}

#[cfg(feature = "debug_logs")]
fn init_logger() {
    use log::LevelFilter;
    use wasm_bindgen_console_logger::DEFAULT_LOGGER;
    if log::set_logger(&DEFAULT_LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}

#[cfg(not(feature = "debug_logs"))]
fn init_logger() {
    // no-op fallback when debug logs are disabled
}

#[cfg(all(feature = "parallel", target_arch = "wasm32"))]
#[wasm_bindgen]
pub async fn initialize_parallel(worker_count: Option<u32>) -> Result<(), JsError> {
    let threads = worker_count
        .map(|count| count.max(1) as usize)
        .or_else(|| {
            std::thread::available_parallelism()
                .map(|value| value.get())
                .ok()
        })
        .unwrap_or(1);

    wasm_bindgen_rayon::init_thread_pool(threads)
        .await
        .map_err(|err| JsError::new(&format!("kon rayon threadpool niet initialiseren: {err}")))
}

#[macro_export]
macro_rules! debug_log {
    ($($t:tt)*) => {{
        #[cfg(feature = "debug_logs")]
        {
            #[cfg(target_arch = "wasm32")]
            {
                ::web_sys::console::log_1(&::wasm_bindgen::JsValue::from_str(&format!($($t)*)));
            }
            #[cfg(not(target_arch = "wasm32"))]
            {
                println!("{}", format!($($t)*));
            }
        }
    }};
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuratie en fouten
// ─────────────────────────────────────────────────────────────────────────────

/// Instellingen van de engine, vanuit JS aan te leveren als object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Plafond voor projecten zonder (bruikbaar) gevraagd bedrag.
    pub default_ceiling: f64,
    pub render_resolution: usize,
    pub drag_resolution: usize,
    pub aggregate: AggregateOptions,
    pub drag: DragOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_ceiling: DEFAULT_DOMAIN_CEILING,
            render_resolution: DEFAULT_RESOLUTION,
            drag_resolution: DRAG_RESOLUTION,
            aggregate: AggregateOptions::default(),
            drag: DragOptions::default(),
        }
    }
}

impl EngineConfig {
    /// Het opgegeven plafond als het bruikbaar is, anders het standaardplafond.
    #[must_use]
    pub fn resolve_ceiling(&self, requested: Option<f64>) -> f64 {
        match requested {
            Some(value) if value.is_finite() && value > 0.0 => value,
            _ => impact::domain_ceiling_or_default(Some(self.default_ceiling)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("er is geen project geladen")]
    NoProject,
    #[error("onbekende slider `{0}`")]
    UnknownSlider(String),
    #[error(transparent)]
    Handle(#[from] UnknownHandle),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Overlay(#[from] OverlayError),
}

/// Eén project in een vergelijking.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInput {
    pub project_id: ProjectId,
    #[serde(default)]
    pub requested_funding: Option<f64>,
    #[serde(default)]
    pub submissions: Vec<JsonValue>,
}

#[derive(Debug, Clone)]
struct LoadedProject {
    id: ProjectId,
    ceiling: f64,
    submissions: Vec<CurveModel>,
    index: SubmissionIndex,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoadSummary {
    project_id: ProjectId,
    ceiling: f64,
    curves: usize,
    skipped: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

#[wasm_bindgen]
pub struct Engine {
    initialized: bool,
    config: EngineConfig,
    editor: CurveEditor,
    surface: Option<(f64, f64)>,
    project: Option<LoadedProject>,
    cache: CurveCache,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl Engine {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Engine {
        Engine::with_config(EngineConfig::default())
    }

    /// Geeft terug of de engine de minimale initialisatie heeft doorlopen.
    #[wasm_bindgen]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Vervang de instellingen. Velden die ontbreken krijgen hun standaardwaarde.
    #[wasm_bindgen]
    pub fn configure(&mut self, config: JsValue) -> Result<(), JsValue> {
        let config: EngineConfig = serde_wasm_bindgen::from_value(config).map_err(to_js_error)?;
        self.apply_config(config);
        Ok(())
    }

    /// Laad een project met zijn inzendingen (ruwe records).
    #[wasm_bindgen]
    pub fn load_project(
        &mut self,
        project_id: &str,
        requested_funding: Option<f64>,
        records: JsValue,
    ) -> Result<JsValue, JsValue> {
        let records: Vec<JsonValue> = serde_wasm_bindgen::from_value(records).map_err(to_js_error)?;
        let parsed = parse::parse_submissions(&records);
        let mut summary = self.open_project(ProjectId::from(project_id), requested_funding, parsed.curves);
        summary.skipped += parsed.skipped;
        to_js(&summary)
    }

    /// Laad een project op basis van de antwoorden in de discussie.
    #[wasm_bindgen]
    pub fn load_thread(
        &mut self,
        project_id: &str,
        requested_funding: Option<f64>,
        replies: JsValue,
    ) -> Result<JsValue, JsValue> {
        let replies: Vec<Reply> = serde_wasm_bindgen::from_value(replies).map_err(to_js_error)?;
        let summary = self.open_thread(ProjectId::from(project_id), requested_funding, &replies);
        to_js(&summary)
    }

    /// Stel de afmetingen van het tekenvlak in pixels in.
    #[wasm_bindgen]
    pub fn set_surface_size(&mut self, width: f64, height: f64) {
        self.surface = Some((width, height));
        self.editor.set_surface_size(width, height);
    }

    #[wasm_bindgen]
    pub fn pointer_down(&mut self, handle: &str, x: f64, y: f64) -> Result<(), JsValue> {
        self.begin_drag(handle, CurvePoint::new(x, y)).map_err(to_js_error)
    }

    #[wasm_bindgen]
    pub fn pointer_move(&mut self, x: f64, y: f64) -> Result<JsValue, JsValue> {
        to_js(self.editor.drag_to(CurvePoint::new(x, y)))
    }

    #[wasm_bindgen]
    pub fn pointer_up(&mut self) -> Result<JsValue, JsValue> {
        to_js(self.editor.end_drag())
    }

    /// Stel een sliderwaarde in (`xIntercept`, `yIntercept`, `middleX`, `middleY`).
    #[wasm_bindgen]
    pub fn set_slider(&mut self, name: &str, value: f64) -> Result<JsValue, JsValue> {
        if !value.is_finite() {
            return Err(js_error("sliderwaarde moet een eindig getal zijn"));
        }
        let curve = self.set_slider_value(name, value).map_err(to_js_error)?;
        to_js(curve)
    }

    #[wasm_bindgen]
    pub fn get_curve(&self) -> Result<JsValue, JsValue> {
        to_js(self.editor.curve())
    }

    /// Sampling van de curve in de editor; grof tijdens het slepen.
    #[wasm_bindgen]
    pub fn get_curve_points(&mut self) -> Result<JsValue, JsValue> {
        let points = self.curve_samples();
        to_js(points.as_slice())
    }

    #[wasm_bindgen]
    pub fn get_inflection_impact(&self) -> f64 {
        impact_at_inflection(self.editor.curve())
    }

    /// Consensuscurve van het geladen project in absolute bedragen.
    #[wasm_bindgen]
    pub fn get_aggregate(&mut self) -> Result<JsValue, JsValue> {
        let consensus = self.consensus().map_err(to_js_error)?;
        to_js(&consensus)
    }

    /// Consensuscurve van het geladen project op de 0-100 % as.
    #[wasm_bindgen]
    pub fn get_normalized(&mut self) -> Result<JsValue, JsValue> {
        let points = self.normalized_consensus().map_err(to_js_error)?;
        to_js(&points)
    }

    #[wasm_bindgen]
    pub fn compare_projects(&mut self, projects: JsValue, normalize: bool) -> Result<JsValue, JsValue> {
        let projects: Vec<ProjectInput> = serde_wasm_bindgen::from_value(projects).map_err(to_js_error)?;
        let mode = if normalize {
            AxisMode::Normalized
        } else {
            AxisMode::Absolute
        };
        let rows = self.compare(&projects, mode).map_err(to_js_error)?;
        to_js(&rows)
    }

    /// Bouw de inzending van de huidige curve voor `owner` (fid of naam).
    #[wasm_bindgen]
    pub fn build_submission(&mut self, owner: JsValue) -> Result<JsValue, JsValue> {
        let owner: OwnerIdentity = serde_wasm_bindgen::from_value(owner).map_err(to_js_error)?;
        let request = self.submit(owner).map_err(to_js_error)?;
        to_js(&request)
    }

    #[wasm_bindgen]
    pub fn get_cache_stats(&self) -> Result<JsValue, JsValue> {
        to_js(&self.cache_stats())
    }

    #[wasm_bindgen]
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

impl Engine {
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        let editor = CurveEditor::new(config.resolve_ceiling(None)).with_options(config.drag);
        Self {
            initialized: true,
            config,
            editor,
            surface: None,
            project: None,
            cache: CurveCache::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn apply_config(&mut self, config: EngineConfig) {
        self.editor.set_options(config.drag);
        self.config = config;
        self.cache.clear_aggregates();
    }

    #[must_use]
    pub fn editor(&self) -> &CurveEditor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut CurveEditor {
        &mut self.editor
    }

    #[must_use]
    pub fn project_id(&self) -> Option<&ProjectId> {
        self.project.as_ref().map(|project| &project.id)
    }

    #[must_use]
    pub fn submissions(&self) -> &[CurveModel] {
        self.project
            .as_ref()
            .map(|project| project.submissions.as_slice())
            .unwrap_or_default()
    }

    /// Opent een project met reeds gelezen curves en zet de editor terug op
    /// de standaardcurve binnen het plafond van het project.
    fn open_project(
        &mut self,
        id: ProjectId,
        requested_funding: Option<f64>,
        curves: Vec<CurveModel>,
    ) -> LoadSummary {
        let ceiling = self.config.resolve_ceiling(requested_funding);
        let mut index = SubmissionIndex::new();
        let mut duplicates = 0;
        let curves: Vec<CurveModel> = curves
            .into_iter()
            .filter(|curve| {
                // eerste inzending per eigenaar telt, curves zonder eigenaar altijd
                let keep = curve.owner.is_none() || index.record(&id, curve.clone());
                if !keep {
                    duplicates += 1;
                }
                keep
            })
            .collect();

        self.editor = CurveEditor::with_curve(CurveModel::default(), ceiling).with_options(self.config.drag);
        if let Some((width, height)) = self.surface {
            self.editor.set_surface_size(width, height);
        }

        log::debug!("project {id} geladen: plafond {ceiling}, {} curves", curves.len());
        let summary = LoadSummary {
            project_id: id.clone(),
            ceiling,
            curves: curves.len(),
            skipped: duplicates,
        };
        self.project = Some(LoadedProject {
            id,
            ceiling,
            submissions: curves,
            index,
        });
        summary
    }

    /// Laadt een project uit ruwe records. Onleesbare records en latere
    /// inzendingen van dezelfde eigenaar worden overgeslagen. Geeft het aantal
    /// overgeslagen records terug.
    pub fn load_records(
        &mut self,
        id: impl Into<ProjectId>,
        requested_funding: Option<f64>,
        records: &[JsonValue],
    ) -> usize {
        let parsed = parse::parse_submissions(records);
        let summary = self.open_project(id.into(), requested_funding, parsed.curves);
        parsed.skipped + summary.skipped
    }

    /// Laadt een project uit de antwoorden van zijn discussie. Alleen de
    /// eerste inzending per eigenaar telt mee.
    fn open_thread(
        &mut self,
        id: ProjectId,
        requested_funding: Option<f64>,
        replies: &[Reply],
    ) -> LoadSummary {
        let contents = parse::partition_replies(replies);
        let index = SubmissionIndex::from_thread(&id, &contents);
        let curves = index.curves_for(&id);
        let mut skipped = contents.malformed + contents.submissions.len() - curves.len();
        let summary = self.open_project(id, requested_funding, curves);
        skipped += summary.skipped;
        LoadSummary { skipped, ..summary }
    }

    /// Zie [`Engine::load_thread`]. Geeft het aantal genegeerde inzendingen terug.
    pub fn load_replies(
        &mut self,
        id: impl Into<ProjectId>,
        requested_funding: Option<f64>,
        replies: &[Reply],
    ) -> usize {
        self.open_thread(id.into(), requested_funding, replies).skipped
    }

    /// Start het slepen van een handvat (`x`, `y` of `middle`).
    pub fn begin_drag(&mut self, handle: &str, at: CurvePoint) -> Result<(), EngineError> {
        let point: ControlPoint = handle.parse()?;
        self.editor.begin_drag(point, at);
        Ok(())
    }

    /// Past een slider toe op de curve in de editor.
    pub fn set_slider_value(&mut self, name: &str, value: f64) -> Result<&CurveModel, EngineError> {
        let curve = match name.trim() {
            "xIntercept" | "fundingAtZeroImpact" => self.editor.set_funding_at_zero_impact(value),
            "yIntercept" | "impactAtFirstDollar" => self.editor.set_impact_at_first_dollar(value),
            "middleX" | "inflectionFunding" => self.editor.set_inflection_funding(value),
            "middleY" | "inflectionImpact" => self.editor.set_inflection_impact(value),
            other => return Err(EngineError::UnknownSlider(other.to_owned())),
        };
        Ok(curve)
    }

    /// Sampling van de editorcurve via de cache, op sleep- of weergave-resolutie.
    pub fn curve_samples(&mut self) -> SharedPoints {
        let resolution = if self.editor.session().is_dragging() {
            self.config.drag_resolution
        } else {
            self.config.render_resolution
        };
        sample_cached(&mut self.cache, self.editor.curve(), resolution)
    }

    pub fn consensus(&mut self) -> Result<ProjectCurve, EngineError> {
        let project = self.project.as_ref().ok_or(EngineError::NoProject)?;
        let points = aggregate_cached(&mut self.cache, &project.submissions, &self.config.aggregate);
        Ok(ProjectCurve::from_aggregate(
            project.id.clone(),
            project.ceiling,
            points.to_vec(),
        ))
    }

    pub fn normalized_consensus(&mut self) -> Result<Vec<NormalizedPoint>, EngineError> {
        Ok(self.consensus()?.normalized())
    }

    /// Overlay van de consensuscurves van meerdere projecten.
    pub fn compare(
        &mut self,
        projects: &[ProjectInput],
        mode: AxisMode,
    ) -> Result<Vec<OverlayRow>, EngineError> {
        let mut curves = Vec::with_capacity(projects.len());
        for input in projects {
            let parsed = parse::parse_submissions(&input.submissions);
            let ceiling = self.config.resolve_ceiling(input.requested_funding);
            let points = aggregate_cached(&mut self.cache, &parsed.curves, &self.config.aggregate);
            curves.push(ProjectCurve::from_aggregate(
                input.project_id.clone(),
                ceiling,
                points.to_vec(),
            ));
        }
        Ok(overlay(&curves, mode)?)
    }

    /// Controleert en bouwt de inzending van de editorcurve. Na succes telt
    /// de curve mee in de consensus en wordt een tweede inzending geweigerd.
    pub fn submit(&mut self, owner: OwnerIdentity) -> Result<SubmissionRequest, EngineError> {
        let project = self.project.as_mut().ok_or(EngineError::NoProject)?;
        let curve = self.editor.curve();
        let request = parse::prepare_submission(&project.index, &project.id, &owner, curve)?;

        let frozen = curve.clone().with_owner(owner);
        project.index.record(&project.id, frozen.clone());
        project.submissions.push(frozen);
        debug_log!("inzending voorbereid voor {}", request.owner);
        Ok(request)
    }

    #[must_use]
    pub fn cache_stats(&self) -> CurveCacheStats {
        self.cache.stats()
    }
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|err| JsError::new(&err.to_string()).into())
}

fn to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    js_error(&error.to_string())
}

fn js_error(message: &str) -> JsValue {
    #[cfg(target_arch = "wasm32")]
    {
        JsError::new(message).into()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = message;
        JsValue::NULL
    }
}
