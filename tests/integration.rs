use impact_curve_engine::geom::{CurvePoint, DEFAULT_SAMPLE_CAPACITY};
use impact_curve_engine::impact::{
    AxisMode, CurveModel, DEFAULT_DOMAIN_CEILING, DEFAULT_RESOLUTION, DRAG_RESOLUTION,
    InflectionPoint, OverlayError, OwnerIdentity, aggregate, normalize, sample,
};
use impact_curve_engine::parse::{Reply, SubmissionError, encode_curve_reply};
use impact_curve_engine::{Engine, EngineConfig, EngineError, ProjectInput};
use serde_json::json;

fn curve_a() -> CurveModel {
    CurveModel::new(100.0, 80.0, InflectionPoint::new(60.0, 60.0))
}

fn curve_b() -> CurveModel {
    CurveModel::new(200.0, 40.0, InflectionPoint::new(100.0, 20.0))
}

#[test]
fn engine_initializes() {
    let engine = Engine::new();
    assert!(engine.is_initialized());
    assert_eq!(engine.editor().curve(), &CurveModel::default());
    assert_eq!(engine.editor().ceiling(), DEFAULT_DOMAIN_CEILING);
}

#[test]
fn sample_endpoints_are_exact() {
    let curve = curve_b();
    for n in [1, 10, 1_000] {
        let points = sample(&curve, n);
        assert_eq!(points.len(), n + 1);
        assert_eq!(points[0], CurvePoint::new(0.0, 40.0));
        assert_eq!(points[n], CurvePoint::new(200.0, 0.0));
    }
}

#[test]
fn aggregate_of_nothing_is_empty() {
    assert!(aggregate(&[], None).is_empty());
}

#[test]
fn aggregate_covers_both_funding_ranges() {
    let points = aggregate(&[curve_a(), curve_b()], None);
    assert_eq!(points.first().map(|p| p.x), Some(0.0));
    assert!(points.last().is_some_and(|p| p.x > 199.0 && p.x <= 200.0));
    assert!(points.iter().all(|p| (0.0..=100.0).contains(&p.y)));
}

#[test]
fn normalizing_half_the_ceiling_gives_fifty_percent() {
    let points = normalize(&[CurvePoint::new(250.0, 12.0)], 500.0);
    assert_eq!(points[0].x, 50.0);
    assert_eq!(points[0].original_x, 250.0);
}

#[test]
fn dragging_funding_intercept_rescales_inflection() {
    let mut engine = Engine::new();
    engine.load_records("0xproject", Some(500.0), &[]);
    // 500 funding over 500 px, 100 impact over 100 px
    engine.set_surface_size(500.0, 100.0);

    engine.begin_drag("x", CurvePoint::new(100.0, 100.0)).expect("known handle");
    assert_eq!(engine.curve_samples().len(), DRAG_RESOLUTION + 1);
    let curve = engine.editor_mut().drag_to(CurvePoint::new(150.0, 100.0)).clone();
    engine.editor_mut().end_drag();

    assert_eq!(curve.funding_at_zero_impact, 150.0);
    assert_eq!(curve.inflection_point, InflectionPoint::new(90.0, 60.0));
    assert_eq!(engine.curve_samples().len(), DEFAULT_RESOLUTION + 1);

    assert!(matches!(
        engine.begin_drag("corner", CurvePoint::ORIGIN),
        Err(EngineError::Handle(_))
    ));
}

#[test]
fn sliders_clamp_to_project_ceiling() {
    let mut engine = Engine::new();
    engine.load_records("0xproject", Some(1_000.0), &[]);

    let curve = engine.set_slider_value("xIntercept", 5_000.0).expect("slider").clone();
    assert_eq!(curve.funding_at_zero_impact, 1_000.0);

    let curve = engine.set_slider_value("yIntercept", 50.0).expect("slider").clone();
    assert_eq!(curve.inflection_point.impact_score, 50.0);

    assert!(matches!(
        engine.set_slider_value("zIntercept", 1.0),
        Err(EngineError::UnknownSlider(_))
    ));
}

#[test]
fn consensus_requires_loaded_project() {
    let mut engine = Engine::new();
    assert!(matches!(engine.consensus(), Err(EngineError::NoProject)));
    assert!(matches!(
        engine.submit(OwnerIdentity::Fid(1)),
        Err(EngineError::NoProject)
    ));
}

#[test]
fn consensus_of_loaded_records_is_cached() {
    let records = vec![
        serde_json::to_value(curve_a()).unwrap(),
        serde_json::to_value(curve_b()).unwrap(),
        json!({"xIntercept": "broken"}),
    ];
    let mut engine = Engine::new();
    let skipped = engine.load_records("0xproject", Some(200.0), &records);
    assert_eq!(skipped, 1);
    assert_eq!(engine.submissions().len(), 2);

    let first = engine.consensus().expect("consensus");
    let second = engine.consensus().expect("consensus");
    assert_eq!(first, second);
    assert!(!first.is_placeholder());
    assert_eq!(engine.cache_stats().aggregate_hits, 1);

    let normalized = engine.normalized_consensus().expect("normalized");
    assert!(normalized.iter().all(|p| (0.0..=100.0).contains(&p.x)));
}

#[test]
fn thread_replies_feed_consensus_and_block_duplicates() {
    let text = encode_curve_reply(&curve_a()).unwrap();
    let replies = vec![
        Reply::new(7_u64, text),
        Reply::new(7_u64, encode_curve_reply(&curve_b()).unwrap()),
        Reply::new(8_u64, "looks promising"),
    ];

    let mut engine = Engine::new();
    let ignored = engine.load_replies("0xproject", Some(100.0), &replies);
    assert_eq!(ignored, 1);
    assert_eq!(engine.submissions().len(), 1);
    assert_eq!(engine.submissions()[0].owner, Some(OwnerIdentity::Fid(7)));

    assert!(matches!(
        engine.submit(OwnerIdentity::Fid(7)),
        Err(EngineError::Submission(SubmissionError::Duplicate { .. }))
    ));

    let request = engine.submit(OwnerIdentity::Fid(8)).expect("first submission");
    assert!(request.text.starts_with("[curve-data]"));
    assert_eq!(engine.submissions().len(), 2);
    assert!(engine.submit(OwnerIdentity::Fid(8)).is_err());
}

#[test]
fn comparing_projects_on_absolute_axis_needs_equal_ceilings() {
    let projects = vec![
        ProjectInput {
            project_id: "small".into(),
            requested_funding: Some(100.0),
            submissions: vec![serde_json::to_value(curve_a()).unwrap()],
        },
        ProjectInput {
            project_id: "large".into(),
            requested_funding: Some(200.0),
            submissions: vec![],
        },
    ];
    let mut engine = Engine::new();

    assert!(matches!(
        engine.compare(&projects, AxisMode::Absolute),
        Err(EngineError::Overlay(_))
    ));

    let rows = engine.compare(&projects, AxisMode::Normalized).expect("normalized overlay");
    assert_eq!(rows.len(), 101);
    assert_eq!(rows[0].values["small"], 80.0);
    assert!(rows.iter().all(|row| row.values["large"] == 0.0));
}

#[test]
fn config_falls_back_to_default_ceiling() {
    let config: EngineConfig = serde_json::from_value(json!({"defaultCeiling": 5_000})).unwrap();
    assert_eq!(config.render_resolution, DEFAULT_RESOLUTION);
    assert_eq!(config.resolve_ceiling(None), 5_000.0);
    assert_eq!(config.resolve_ceiling(Some(-1.0)), 5_000.0);
    assert_eq!(config.resolve_ceiling(Some(300.0)), 300.0);

    let engine = Engine::with_config(config);
    assert_eq!(engine.editor().ceiling(), 5_000.0);
}

#[test]
fn repeated_owner_in_records_counts_once() {
    let first = curve_a().with_owner(7_u64);
    let second = curve_b().with_owner(7_u64);
    let records = vec![
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap(),
        serde_json::to_value(curve_b()).unwrap(),
    ];
    let mut engine = Engine::new();
    let skipped = engine.load_records("0xproject", Some(200.0), &records);
    assert_eq!(skipped, 1);
    assert_eq!(engine.submissions(), &[first, curve_b()]);
    assert!(engine.submit(OwnerIdentity::Fid(7)).is_err());
}

#[test]
fn long_drag_keeps_cache_bounded() {
    let mut engine = Engine::new();
    engine.load_records("0xproject", Some(500.0), &[]);
    engine.set_surface_size(500.0, 100.0);

    engine.begin_drag("middle", CurvePoint::new(60.0, 40.0)).expect("known handle");
    for frame in 0..500 {
        let x = 60.0 + f64::from(frame % 200) * 0.1;
        engine.editor_mut().drag_to(CurvePoint::new(x, 40.0));
        let _ = engine.curve_samples();
    }
    engine.editor_mut().end_drag();
    let _ = engine.curve_samples();

    let stats = engine.cache_stats();
    assert!(stats.sample_entries <= DEFAULT_SAMPLE_CAPACITY);
    assert!(stats.evictions > 0);
}

#[test]
fn comparing_projects_with_same_id_is_rejected() {
    let project = ProjectInput {
        project_id: "same".into(),
        requested_funding: Some(100.0),
        submissions: vec![],
    };
    let mut engine = Engine::new();
    assert!(matches!(
        engine.compare(&[project.clone(), project], AxisMode::Normalized),
        Err(EngineError::Overlay(OverlayError::DuplicateProject(_)))
    ));
}
