//! Plot Pipeline - Single Entry Point
//!
//! Every plot goes through the same sequence: (template expansion) →
//! resolve → load → transform → render. No stage is skipped and the first
//! failure ends the run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{import_config, ConfigError};
use crate::data::{DataProfile, DataSet};
use crate::hashing::compute_plan_hash;
use crate::loader::{DataLoadError, DataLoader, InlineLoader};
use crate::palettes::PaletteError;
use crate::render::{enrich_render_error, RenderError, RenderOutcome, Renderer};
use crate::resolve::{resolve, RenderPlan, SpecError};
use crate::spec::{DataSource, PlotSpec};
use crate::templates::{Template, TemplateError, TemplateRegistry, TemplateRequest};
use crate::transforms::{apply_transforms, TransformError};
use crate::ENGINE_VERSION;

#[derive(Debug, Error)]
pub enum PlotError {
    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("Data loading error: {0}")]
    Load(#[from] DataLoadError),

    #[error("Plot rendering error: {0}")]
    Render(#[from] RenderError),

    #[error(transparent)]
    Palette(#[from] PaletteError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Resolved plan plus the data it will be drawn from.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedPlot {
    pub plan: RenderPlan,
    pub data: DataSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotArtifact {
    pub id: String,
    pub engine_version: String,
    pub created_at: DateTime<Utc>,
    pub plan_hash: String,
    pub rows: usize,
    pub columns: Vec<String>,
    pub components: Vec<String>,
    pub plan: RenderPlan,
    pub outcome: RenderOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BatchItem {
    Succeeded { index: usize, artifact: Box<PlotArtifact> },
    Failed { index: usize, error: String },
}

impl BatchItem {
    pub fn index(&self) -> usize {
        match self {
            BatchItem::Succeeded { index, .. } | BatchItem::Failed { index, .. } => *index,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BatchItem::Succeeded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub items: Vec<BatchItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPreview {
    pub profile: DataProfile,
    pub head: Vec<Value>,
}

/// The plot pipeline - single entry point for all plot operations
pub struct PlotPipeline {
    registry: TemplateRegistry,
    loader: Box<dyn DataLoader>,
    renderer: Box<dyn Renderer>,
}

impl PlotPipeline {
    pub fn new(
        registry: TemplateRegistry,
        loader: Box<dyn DataLoader>,
        renderer: Box<dyn Renderer>,
    ) -> Self {
        Self {
            registry,
            loader,
            renderer,
        }
    }

    /// Built-in templates and inline data only.
    pub fn with_renderer(renderer: Box<dyn Renderer>) -> Self {
        Self::new(TemplateRegistry::builtin(), Box::new(InlineLoader), renderer)
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    pub fn list_templates(&self) -> Vec<&Template> {
        self.registry.list()
    }

    pub fn get_template(&self, name: &str) -> Option<&Template> {
        self.registry.get(name)
    }

    pub fn load_data(&self, source: Option<&DataSource>) -> Result<DataSet, PlotError> {
        let source = source.ok_or_else(|| SpecError::missing("data_source"))?;
        Ok(self.loader.load(source)?)
    }

    pub fn preview_data(&self, source: &DataSource, rows: usize) -> Result<DataPreview, PlotError> {
        let data = self.load_data(Some(source))?;
        Ok(DataPreview {
            profile: data.profile(),
            head: data.head(rows).to_records(),
        })
    }

    /// Resolve, load and transform, without rendering.
    pub fn prepare(&self, spec: &PlotSpec) -> Result<PreparedPlot, PlotError> {
        let plan = resolve(spec)?;
        let loaded = self.load_data(spec.data_source.as_ref())?;
        let data = apply_transforms(&loaded, &spec.transforms)?;
        debug!(
            rows_in = loaded.n_rows(),
            rows_out = data.n_rows(),
            transforms = spec.transforms.len(),
            "prepared plot"
        );
        Ok(PreparedPlot { plan, data })
    }

    /// Create a plot
    ///
    /// Column errors coming back from the renderer are enriched with the
    /// data's column list before they reach the caller.
    pub fn create_plot(&self, spec: &PlotSpec) -> Result<PlotArtifact, PlotError> {
        let PreparedPlot { plan, data } = self.prepare(spec)?;

        let outcome = self
            .renderer
            .render(&plan, &data)
            .map_err(|e| enrich_render_error(e, &data))?;

        let artifact = PlotArtifact {
            id: Uuid::new_v4().to_string(),
            engine_version: ENGINE_VERSION.to_string(),
            created_at: Utc::now(),
            plan_hash: compute_plan_hash(&plan)?,
            rows: data.n_rows(),
            columns: data.column_names(),
            components: plan.components(),
            plan,
            outcome,
        };
        info!(
            id = %artifact.id,
            path = %artifact.outcome.path.display(),
            rows = artifact.rows,
            "plot created"
        );
        Ok(artifact)
    }

    pub fn create_from_template(
        &self,
        request: &TemplateRequest,
    ) -> Result<PlotArtifact, PlotError> {
        let spec = self.registry.expand_request(request)?;
        self.create_plot(&spec)
    }

    /// Accepts either a spec or a template invocation (has `template_name`).
    pub fn create_from_value(&self, value: &Value) -> Result<PlotArtifact, PlotError> {
        if value.get("template_name").is_some() {
            let request: TemplateRequest = serde_json::from_value(value.clone())?;
            self.create_from_template(&request)
        } else {
            let spec = PlotSpec::from_value(value.clone())?;
            self.create_plot(&spec)
        }
    }

    pub fn create_from_config(
        &self,
        path: &Path,
        overrides: Option<&Map<String, Value>>,
    ) -> Result<PlotArtifact, PlotError> {
        let spec = import_config(path, overrides)?;
        self.create_plot(&spec)
    }

    /// Run every item; a failure is recorded and the batch moves on.
    pub fn run_batch(&self, items: &[Value]) -> BatchReport {
        let items: Vec<BatchItem> = items
            .iter()
            .enumerate()
            .map(|(index, value)| match self.create_from_value(value) {
                Ok(artifact) => BatchItem::Succeeded {
                    index,
                    artifact: Box::new(artifact),
                },
                Err(e) => {
                    warn!(index, error = %e, "batch item failed");
                    BatchItem::Failed {
                        index,
                        error: e.to_string(),
                    }
                }
            })
            .collect();

        let succeeded = items.iter().filter(|i| i.is_success()).count();
        BatchReport {
            total: items.len(),
            succeeded,
            failed: items.len() - succeeded,
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RecordingRenderer;
    use serde_json::json;

    fn pipeline() -> PlotPipeline {
        PlotPipeline::with_renderer(Box::new(RecordingRenderer::new()))
    }

    fn inline_spec(extra: Value) -> Value {
        let mut spec = json!({
            "data_source": {
                "type": "inline",
                "data": [
                    {"category": "A", "value": 10, "status": "active"},
                    {"category": "A", "value": 20, "status": "active"},
                    {"category": "B", "value": 15, "status": "inactive"},
                    {"category": "B", "value": 25, "status": "active"},
                ],
            },
            "aes": {"x": "category", "y": "value"},
            "geom": {"type": "col"},
        });
        if let (Some(base), Some(extra)) = (spec.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        spec
    }

    #[test]
    fn test_create_plot_runs_transforms() {
        let artifact = pipeline()
            .create_from_value(&inline_spec(json!({
                "transforms": [
                    {"type": "filter", "filter_expr": "status == 'active'"},
                    {"type": "group_summarize", "group_by": "category", "aggregations": {"value": "sum"}},
                ],
                "output": {"filename": "by_category"},
            })))
            .unwrap();
        assert_eq!(artifact.rows, 2);
        assert_eq!(artifact.columns, vec!["category", "value"]);
        assert_eq!(artifact.outcome.path, Path::new("./output/by_category.png"));
        assert_eq!(artifact.plan_hash.len(), 64);
        assert_eq!(artifact.components, vec!["geom_col"]);
    }

    #[test]
    fn test_missing_data_source() {
        let spec = PlotSpec::from_value(json!({"geom": {"type": "point"}})).unwrap();
        let err = pipeline().create_plot(&spec).unwrap_err();
        assert!(matches!(err, PlotError::Spec(ref e) if e.field == "data_source"));
    }

    #[test]
    fn test_render_column_error_is_enriched() {
        let err = pipeline()
            .create_from_value(&inline_spec(json!({"aes": {"x": "categry", "y": "value"}})))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Did you mean: 'category'?"));
        assert!(msg.contains("Available columns: category, value, status"));
    }

    #[test]
    fn test_transform_failure_names_step() {
        let err = pipeline()
            .create_from_value(&inline_spec(json!({
                "transforms": [{"type": "select", "columns": ["category", "valeu"]}],
            })))
            .unwrap_err();
        assert!(err.to_string().starts_with("Transform 1 (select) failed"));
    }

    #[test]
    fn test_template_value_dispatch() {
        let artifact = pipeline()
            .create_from_value(&json!({
                "template_name": "scatter_with_trend",
                "data_source": {"type": "inline", "data": [{"x": 1, "y": 2}, {"x": 2, "y": 4}]},
                "aes": {"x": "x", "y": "y"},
                "output": {"filename": "test_template"},
            }))
            .unwrap();
        assert_eq!(artifact.components, vec!["geom_point", "geom_smooth", "theme_minimal"]);
        assert!(artifact.outcome.path.ends_with("test_template.png"));
    }

    #[test]
    fn test_batch_isolates_failures() {
        let report = pipeline().run_batch(&[
            inline_spec(json!({})),
            inline_spec(json!({"geom": {"type": "ponit"}})),
            inline_spec(json!({"geom": {"type": "line"}})),
        ]);
        assert_eq!((report.total, report.succeeded, report.failed), (3, 2, 1));
        match &report.items[1] {
            BatchItem::Failed { index, error } => {
                assert_eq!(*index, 1);
                assert!(error.contains("Did you mean: 'point'?"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(report.items[2].index(), 2);
    }

    #[test]
    fn test_preview() {
        let source = DataSource::inline((1..=5).map(|i| json!({"x": i, "y": i * 2})).collect());
        let preview = pipeline().preview_data(&source, 3).unwrap();
        assert_eq!(preview.profile.rows, 5);
        assert_eq!(preview.head.len(), 3);
    }

    #[test]
    fn test_create_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path =
            crate::config::export_config(&inline_spec(json!({})), dir.path(), "saved").unwrap();
        let overrides = json!({"geom": {"type": "bar"}});
        let artifact = pipeline()
            .create_from_config(&path, overrides.as_object())
            .unwrap();
        assert_eq!(artifact.components, vec!["geom_bar"]);
    }
}
