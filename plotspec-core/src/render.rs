//! Renderer boundary
//!
//! The graphics engine lives outside this crate. It receives a resolved
//! plan plus the transformed data and reports where the figure went.

use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::data::DataSet;
use crate::resolve::RenderPlan;
use crate::spec::OutputFormat;
use crate::suggest::format_column_error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderError {
    /// `available` is empty until [`enrich_render_error`] fills it in.
    #[error("{}", format_column_error(.column, .available))]
    ColumnNotFound { column: String, available: Vec<String> },

    #[error("Renderer failed: {0}")]
    Backend(String),
}

impl RenderError {
    pub fn column(column: impl Into<String>) -> Self {
        RenderError::ColumnNotFound {
            column: column.into(),
            available: Vec::new(),
        }
    }
}

/// Attach the data's columns to a bare column error so its message
/// carries a suggestion and the full column list.
pub fn enrich_render_error(err: RenderError, data: &DataSet) -> RenderError {
    match err {
        RenderError::ColumnNotFound { column, available } if available.is_empty() => {
            RenderError::ColumnNotFound {
                column,
                available: data.column_names(),
            }
        }
        other => other,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderOutcome {
    pub path: PathBuf,
    pub format: OutputFormat,
    pub width: f64,
    pub height: f64,
    pub dpi: u32,
}

impl RenderOutcome {
    pub fn from_plan(plan: &RenderPlan) -> Self {
        Self {
            path: plan.output.path.clone(),
            format: plan.output.format,
            width: plan.output.width,
            height: plan.output.height,
            dpi: plan.output.dpi,
        }
    }
}

pub trait Renderer: Send + Sync {
    fn render(&self, plan: &RenderPlan, data: &DataSet) -> Result<RenderOutcome, RenderError>;
}

/// Renderer that draws nothing. It checks mapped columns against the data,
/// keeps every plan it accepts, and reports the planned output target.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    plans: Mutex<Vec<RenderPlan>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<RenderPlan> {
        self.plans.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn render_count(&self) -> usize {
        self.plans.lock().map(|p| p.len()).unwrap_or(0)
    }
}

impl Renderer for RecordingRenderer {
    fn render(&self, plan: &RenderPlan, data: &DataSet) -> Result<RenderOutcome, RenderError> {
        if let Some(missing) = plan.mapped_columns().into_iter().find(|c| !data.has_column(c)) {
            return Err(RenderError::column(missing));
        }
        self.plans
            .lock()
            .map_err(|_| RenderError::Backend("recording renderer lock poisoned".into()))?
            .push(plan.clone());
        debug!(
            path = %plan.output.path.display(),
            components = plan.components().len(),
            "recorded render"
        );
        Ok(RenderOutcome::from_plan(plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve;
    use crate::spec::PlotSpec;
    use serde_json::json;

    fn plan(aes: serde_json::Value) -> RenderPlan {
        let spec = PlotSpec::from_value(json!({"aes": aes, "geom": {"type": "point"}})).unwrap();
        resolve(&spec).unwrap()
    }

    fn data() -> DataSet {
        DataSet::from_records(&[json!({"age": 30, "height": 170})]).unwrap()
    }

    #[test]
    fn test_records_valid_plans() {
        let renderer = RecordingRenderer::new();
        let p = plan(json!({"x": "age", "y": "height"}));
        let outcome = renderer.render(&p, &data()).unwrap();
        assert_eq!(outcome.path, p.output.path);
        assert_eq!(renderer.render_count(), 1);
        assert_eq!(renderer.recorded()[0], p);
    }

    #[test]
    fn test_unknown_column_enriched() {
        let renderer = RecordingRenderer::new();
        let err = renderer
            .render(&plan(json!({"x": "age", "y": "hieght"})), &data())
            .unwrap_err();
        assert_eq!(err, RenderError::column("hieght"));

        let msg = enrich_render_error(err, &data()).to_string();
        assert!(msg.contains("Did you mean: 'height'?"));
        assert!(msg.contains("Available columns: age, height"));
        assert_eq!(renderer.render_count(), 0);
    }

    #[test]
    fn test_backend_errors_pass_through() {
        let err = RenderError::Backend("disk full".into());
        assert_eq!(enrich_render_error(err.clone(), &data()), err);
    }
}
