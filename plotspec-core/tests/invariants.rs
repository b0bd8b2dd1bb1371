//! Contract Invariant Tests
//!
//! These tests verify the guarantees callers rely on.

use plotspec_core::{
    apply_transforms, canonical_json, list_geoms, resolve, suggest_templates, BatchItem, DataSet,
    PlotError, PlotPipeline, PlotSpec, RecordingRenderer, Renderer, TemplateRegistry, TransformStep,
};
use serde_json::{json, Value};

fn sales() -> DataSet {
    DataSet::from_records(&[
        json!({"category": "A", "value": 10, "status": "active"}),
        json!({"category": "A", "value": 20, "status": "active"}),
        json!({"category": "B", "value": 15, "status": "inactive"}),
        json!({"category": "B", "value": 25, "status": "active"}),
    ])
    .unwrap()
}

fn steps(value: Value) -> Vec<TransformStep> {
    serde_json::from_value(value).unwrap()
}

fn spec(value: Value) -> PlotSpec {
    PlotSpec::from_value(value).unwrap()
}

#[test]
fn invariant_transforms_do_not_touch_input() {
    let data = sales();
    let before = data.clone();
    apply_transforms(
        &data,
        &steps(json!([
            {"type": "mutate", "mutations": {"value": "value * 100"}},
            {"type": "sort", "sort_by": "value", "ascending": false},
        ])),
    )
    .unwrap();
    assert_eq!(data, before);
}

#[test]
fn invariant_empty_pipeline_is_identity() {
    let data = sales();
    assert_eq!(apply_transforms(&data, &[]).unwrap(), data);
}

#[test]
fn invariant_first_failure_aborts() {
    let err = apply_transforms(
        &sales(),
        &steps(json!([
            {"type": "filter", "filter_expr": "value > 0"},
            {"type": "rename", "rename_map": {"value": "amount"}},
            {"type": "select", "columns": ["value"]},
            {"type": "select", "columns": ["nonexistent"]},
        ])),
    )
    .unwrap_err();
    // Step 3 fails because step 2 renamed the column away
    assert_eq!(err.step_index, 3);
    assert!(err.to_string().contains("Did you mean: 'amount'?"));
}

#[test]
fn invariant_chained_example() {
    let out = apply_transforms(
        &sales(),
        &steps(json!([
            {"type": "filter", "filter_expr": "status == 'active'"},
            {"type": "group_summarize", "group_by": ["category"], "aggregations": {"value": "sum"}},
            {"type": "sort", "sort_by": ["value"], "ascending": false},
        ])),
    )
    .unwrap();
    assert_eq!(
        out.to_records(),
        vec![json!({"category": "B", "value": 25}), json!({"category": "A", "value": 30})]
    );
}

#[test]
fn invariant_resolution_is_pure_and_stable() {
    let s = spec(json!({
        "aes": {"x": "a", "y": "b"},
        "geoms": [{"type": "point"}, {"type": "smooth", "params": {"method": "lm"}}],
        "theme": {"base": "minimal", "customizations": {"figure_size": [12, 6]}},
        "output": {"filename": "fixed"},
    }));
    let before = s.clone();
    let a = resolve(&s).unwrap();
    let b = resolve(&s).unwrap();
    assert_eq!(s, before);
    assert_eq!(a, b);
    assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
}

#[test]
fn invariant_unknown_names_carry_suggestion_and_vocabulary() {
    let err = resolve(&spec(json!({"geom": {"type": "histogrm"}}))).unwrap_err();
    assert_eq!(err.suggestion.as_deref(), Some("histogram"));
    assert_eq!(err.available.len(), list_geoms().len());

    let polar = spec(json!({"geom": {"type": "point"}, "coords": {"type": "polar"}}));
    let err = resolve(&polar).unwrap_err();
    assert_eq!(err.available, vec!["cartesian", "fixed", "flip", "trans"]);
}

#[test]
fn invariant_every_builtin_template_expands_and_resolves() {
    let registry = TemplateRegistry::global();
    let aes =
        serde_json::from_value(json!({"x": "a", "y": "b", "color": "c", "fill": "d"})).unwrap();
    let facet_override =
        json!({"facets": {"type": "wrap", "facets": "~ phase", "params": {"ncol": 2}}});
    for template in registry.list() {
        let overrides = (template.name == "before_after")
            .then(|| facet_override.as_object())
            .flatten();
        let expanded = registry.expand(&template.name, None, &aes, overrides).unwrap();
        assert!(resolve(&expanded).is_ok(), "{} failed to resolve", template.name);
    }
}

#[test]
fn invariant_suggestions_are_bounded_and_unique() {
    for numeric in 0..5 {
        for categorical in 0..3 {
            for temporal in [false, true] {
                let s = suggest_templates(numeric, categorical, temporal, None);
                assert!(s.len() <= 5);
                let mut dedup = s.clone();
                dedup.sort();
                dedup.dedup();
                assert_eq!(dedup.len(), s.len());
                for name in s {
                    assert!(TemplateRegistry::global().get(name).is_some());
                }
            }
        }
    }
}

/// Renderer that always fails, for checking batch isolation.
struct FailingRenderer;

impl Renderer for FailingRenderer {
    fn render(
        &self,
        _plan: &plotspec_core::RenderPlan,
        _data: &DataSet,
    ) -> Result<plotspec_core::RenderOutcome, plotspec_core::RenderError> {
        Err(plotspec_core::RenderError::Backend("no display".into()))
    }
}

#[test]
fn invariant_batch_reports_every_item() {
    let item = |geom: &str| {
        json!({
            "data_source": {"type": "inline", "data": [{"x": 1, "y": 2}, {"x": 2, "y": 4}]},
            "aes": {"x": "x", "y": "y"},
            "geom": {"type": geom},
        })
    };
    let pipeline = PlotPipeline::with_renderer(Box::new(RecordingRenderer::new()));
    let report = pipeline.run_batch(&[item("point"), item("line"), item("nope")]);
    assert_eq!(report.total, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert!(matches!(report.items[2], BatchItem::Failed { index: 2, .. }));

    let failing = PlotPipeline::with_renderer(Box::new(FailingRenderer));
    let report = failing.run_batch(&[item("point"), item("line")]);
    assert_eq!(report.failed, 2);
}

#[test]
fn invariant_render_errors_surface_as_render() {
    let pipeline = PlotPipeline::with_renderer(Box::new(FailingRenderer));
    let err = pipeline
        .create_plot(&spec(json!({
            "data_source": {"type": "inline", "data": [{"x": 1}]},
            "aes": {"x": "x"},
            "geom": {"type": "histogram"},
        })))
        .unwrap_err();
    assert!(matches!(err, PlotError::Render(_)));
}
