//! Template System - Named Plot Presets
//!
//! A template is a partial spec plus the aesthetics it cannot work without.
//! Expansion merges `{data_source, aes}`, then the template fragment, then
//! caller overrides. The merge is shallow: an override key replaces the
//! template's value for that key wholesale.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::data::DataSet;
use crate::spec::{merge_overrides, Aesthetics, DataSource, LabelsConfig, OutputConfig, PlotSpec};
use crate::suggest::{sorted_vocabulary, suggest, NAME_THRESHOLD};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("{}", not_found_message(.name, .available))]
    NotFound { name: String, available: Vec<String> },

    #[error("Template '{template}' requires aesthetics: {required:?}. Missing: {missing:?}")]
    MissingAesthetics {
        template: String,
        required: Vec<String>,
        missing: Vec<String>,
    },

    #[error("Expanded template is not a valid spec: {0}")]
    InvalidSpec(#[from] serde_json::Error),
}

fn not_found_message(name: &str, available: &[String]) -> String {
    let mut message = format!("Template '{}' not found.", name);
    if let Some(s) = suggest(name, available, NAME_THRESHOLD) {
        message.push_str(&format!("\n\nDid you mean: '{}'?", s));
    }
    message.push_str(&format!("\n\nAvailable templates: {}", available.join(", ")));
    message
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub description: String,
    /// Partial spec merged over `{data_source, aes}`.
    pub config: Map<String, Value>,
    #[serde(default)]
    pub required_aesthetics: Vec<String>,
    #[serde(default)]
    pub suggested_aesthetics: Vec<String>,
}

impl Template {
    fn builtin(
        name: &str,
        description: &str,
        config: Value,
        required: &[&str],
        suggested: &[&str],
    ) -> Self {
        let config = match config {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            name: name.to_string(),
            description: description.to_string(),
            config,
            required_aesthetics: required.iter().map(|s| s.to_string()).collect(),
            suggested_aesthetics: suggested.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Required roles with no non-empty mapping, in declaration order.
    pub fn missing_aesthetics(&self, aes: &Aesthetics) -> Vec<String> {
        self.required_aesthetics
            .iter()
            .filter(|role| aes.get(role).is_none())
            .cloned()
            .collect()
    }
}

fn builtin_templates() -> Vec<Template> {
    vec![
        Template::builtin(
            "time_series",
            "Line plot optimized for time-based data with date formatting",
            json!({
                "geoms": [{"type": "line", "params": {"size": 1}}],
                "scales": [{"aesthetic": "x", "type": "datetime", "params": {}}],
                "theme": {"base": "minimal", "customizations": {"figure_size": [12, 6]}},
            }),
            &["x", "y"],
            &["color", "group"],
        ),
        Template::builtin(
            "scatter_with_trend",
            "Scatter plot with linear regression trend line and confidence interval",
            json!({
                "geoms": [
                    {"type": "point", "params": {"size": 2, "alpha": 0.6}},
                    {"type": "smooth", "params": {"method": "lm", "se": true}},
                ],
                "theme": {"base": "minimal"},
            }),
            &["x", "y"],
            &["color"],
        ),
        Template::builtin(
            "distribution_comparison",
            "Violin plot for comparing distributions across groups",
            json!({
                "geoms": [
                    {"type": "violin", "params": {"alpha": 0.7}},
                    {"type": "jitter", "params": {"width": 0.1, "alpha": 0.3, "size": 1}},
                ],
                "theme": {"base": "bw"},
            }),
            &["x", "y"],
            &["fill", "color"],
        ),
        Template::builtin(
            "category_breakdown",
            "Bar chart showing counts or values by category",
            json!({
                "geoms": [{"type": "col", "params": {}}],
                "theme": {"base": "minimal", "customizations": {"legend_position": "bottom"}},
                "coords": {"type": "flip", "params": {}},
            }),
            &["x", "y"],
            &["fill"],
        ),
        Template::builtin(
            "correlation_heatmap",
            "Heatmap for visualizing correlations or relationships",
            json!({
                "geoms": [{"type": "tile", "params": {}}],
                "scales": [{"aesthetic": "fill", "type": "gradient", "params": {"low": "blue", "high": "red"}}],
                "theme": {"base": "minimal", "customizations": {"figure_size": [10, 8]}},
            }),
            &["x", "y", "fill"],
            &[],
        ),
        Template::builtin(
            "boxplot_comparison",
            "Boxplot with individual points for detailed distribution comparison",
            json!({
                "geoms": [
                    {"type": "boxplot", "params": {"alpha": 0.7}},
                    {"type": "jitter", "params": {"width": 0.2, "alpha": 0.4, "size": 1}},
                ],
                "theme": {"base": "bw"},
            }),
            &["x", "y"],
            &["fill", "color"],
        ),
        Template::builtin(
            "multi_line",
            "Multiple line plots for comparing trends across categories",
            json!({
                "geoms": [{"type": "line", "params": {"size": 1.2}}],
                "theme": {
                    "base": "minimal",
                    "customizations": {"figure_size": [12, 6], "legend_position": "right"},
                },
            }),
            &["x", "y", "color"],
            &["linetype"],
        ),
        Template::builtin(
            "histogram_with_density",
            "Histogram overlaid with kernel density curve",
            json!({
                "geoms": [
                    {"type": "histogram", "params": {"alpha": 0.7, "bins": 30}},
                    {"type": "density", "params": {"alpha": 0}},
                ],
                "theme": {"base": "minimal"},
            }),
            &["x"],
            &["fill", "color"],
        ),
        // Facet formula is left to the caller via overrides.
        Template::builtin(
            "before_after",
            "Side-by-side comparison of before and after measurements",
            json!({
                "geoms": [
                    {"type": "point", "params": {"size": 3}},
                    {"type": "line", "params": {"alpha": 0.5}},
                ],
                "theme": {"base": "bw"},
                "facets": {"type": "wrap", "params": {"ncol": 2}},
            }),
            &["x", "y"],
            &["group", "color"],
        ),
    ]
}

static BUILTIN: LazyLock<TemplateRegistry> = LazyLock::new(TemplateRegistry::builtin);

/// Template registry - built-ins plus anything registered on top
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: IndexMap<String, Template>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self {
            templates: IndexMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for template in builtin_templates() {
            registry.register(template);
        }
        registry
    }

    /// Shared read-only registry of the built-in templates.
    pub fn global() -> &'static TemplateRegistry {
        &BUILTIN
    }

    /// Load extra `*.json` template definitions on top of the built-ins.
    ///
    /// Files that cannot be read or parsed are skipped with a warning.
    pub fn load_from_dir(dir: &Path) -> Result<Self, std::io::Error> {
        let mut registry = Self::builtin();
        if dir.exists() {
            for entry in fs::read_dir(dir)? {
                let path = entry?.path();
                if path.extension().map_or(false, |e| e == "json") {
                    let content = match fs::read_to_string(&path) {
                        Ok(content) => content,
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "skipping unreadable file");
                            continue;
                        }
                    };
                    match serde_json::from_str::<Template>(&content) {
                        Ok(template) => registry.register(template),
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "skipping template file")
                        }
                    }
                }
            }
        }
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&Template, TemplateError> {
        self.get(name).ok_or_else(|| TemplateError::NotFound {
            name: name.to_string(),
            available: self.names(),
        })
    }

    pub fn list(&self) -> Vec<&Template> {
        self.templates.values().collect()
    }

    /// Sorted template names.
    pub fn names(&self) -> Vec<String> {
        sorted_vocabulary(&self.templates.keys().collect::<Vec<_>>())
    }

    /// Name to description, sorted by name.
    pub fn descriptions(&self) -> IndexMap<String, String> {
        let mut out: IndexMap<String, String> = self
            .templates
            .values()
            .map(|t| (t.name.clone(), t.description.clone()))
            .collect();
        out.sort_keys();
        out
    }

    pub fn register(&mut self, template: Template) {
        self.templates.insert(template.name.clone(), template);
    }

    /// Expand a template into a full spec.
    pub fn expand(
        &self,
        name: &str,
        data_source: Option<&DataSource>,
        aes: &Aesthetics,
        overrides: Option<&Map<String, Value>>,
    ) -> Result<PlotSpec, TemplateError> {
        let template = self.require(name)?;

        let missing = template.missing_aesthetics(aes);
        if !missing.is_empty() {
            return Err(TemplateError::MissingAesthetics {
                template: name.to_string(),
                required: template.required_aesthetics.clone(),
                missing,
            });
        }

        let mut merged = Map::new();
        if let Some(source) = data_source {
            merged.insert("data_source".into(), serde_json::to_value(source)?);
        }
        merged.insert("aes".into(), serde_json::to_value(aes)?);
        merged.extend(template.config.clone());

        if let Some(overrides) = overrides {
            merge_overrides(&mut merged, overrides);
        }

        debug!(
            template = name,
            overridden = overrides.map_or(0, Map::len),
            "expanded template"
        );
        Ok(serde_json::from_value(Value::Object(merged))?)
    }

    /// Expand a full invocation request.
    pub fn expand_request(&self, request: &TemplateRequest) -> Result<PlotSpec, TemplateError> {
        let overrides = request.merged_overrides()?;
        self.expand(
            &request.template_name,
            request.data_source.as_ref(),
            &request.aes,
            Some(&overrides),
        )
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Template invocation as it arrives on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRequest {
    pub template_name: String,
    #[serde(default)]
    pub data_source: Option<DataSource>,
    #[serde(default)]
    pub aes: Aesthetics,
    #[serde(default)]
    pub labels: Option<LabelsConfig>,
    #[serde(default)]
    pub output: Option<OutputConfig>,
    #[serde(default)]
    pub overrides: Option<Map<String, Value>>,
}

impl TemplateRequest {
    /// `overrides` with `labels` and `output` folded in; the dedicated fields win.
    pub fn merged_overrides(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let mut merged = self.overrides.clone().unwrap_or_default();
        if let Some(labels) = &self.labels {
            merged.insert("labels".into(), serde_json::to_value(labels)?);
        }
        if let Some(output) = &self.output {
            merged.insert("output".into(), serde_json::to_value(output)?);
        }
        Ok(merged)
    }
}

pub fn list_templates() -> IndexMap<String, String> {
    TemplateRegistry::global().descriptions()
}

const MAX_SUGGESTIONS: usize = 5;

/// Recommend templates from the shape of the data and an optional goal.
///
/// The first goal keyword group that matches narrows the list; later
/// groups are not consulted.
pub fn suggest_templates(
    num_numeric: usize,
    num_categorical: usize,
    has_temporal: bool,
    goal: Option<&str>,
) -> Vec<&'static str> {
    let mut suggestions: Vec<&'static str> = Vec::new();

    if has_temporal && num_numeric >= 1 {
        suggestions.push("time_series");
        if num_categorical >= 1 {
            suggestions.push("multi_line");
        }
    }
    if num_categorical >= 1 && num_numeric >= 1 {
        suggestions.push("distribution_comparison");
        suggestions.push("boxplot_comparison");
    }
    if num_numeric >= 2 {
        suggestions.push("scatter_with_trend");
        if num_numeric >= 3 {
            suggestions.push("correlation_heatmap");
        }
    }
    if num_numeric >= 1 && num_categorical == 0 {
        suggestions.push("histogram_with_density");
    }
    if num_categorical >= 1 {
        suggestions.push("category_breakdown");
    }

    if let Some(goal) = goal {
        let goal = goal.to_lowercase();
        let groups: [(&[&str], &[&str]); 4] = [
            (&["trend", "time"], &["time", "line"]),
            (&["compare", "comparison"], &["comparison", "boxplot"]),
            (&["distribution"], &["distribution", "histogram"]),
            (&["correlation", "relationship"], &["correlation", "scatter"]),
        ];
        if let Some((_, keep)) = groups
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| goal.contains(k)))
        {
            suggestions.retain(|s| keep.iter().any(|k| s.contains(k)));
        }
    }

    let mut seen = HashSet::new();
    suggestions.retain(|s| seen.insert(*s));
    suggestions.truncate(MAX_SUGGESTIONS);
    suggestions
}

/// [`suggest_templates`] with counts taken from the data's profile.
pub fn suggest_for_dataset(data: &DataSet, goal: Option<&str>) -> Vec<&'static str> {
    let profile = data.profile();
    suggest_templates(profile.numeric, profile.categorical, profile.temporal > 0, goal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve;

    fn aes(x: &str, y: &str) -> Aesthetics {
        Aesthetics {
            x: Some(x.into()),
            y: Some(y.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_builtin_catalog() {
        let registry = TemplateRegistry::global();
        assert_eq!(registry.list().len(), 9);
        let names = registry.names();
        assert_eq!(names.first().map(String::as_str), Some("before_after"));
        assert_eq!(names.last().map(String::as_str), Some("time_series"));
        assert_eq!(
            list_templates()["histogram_with_density"],
            "Histogram overlaid with kernel density curve"
        );
    }

    #[test]
    fn test_expand_scatter_with_trend() {
        let source = DataSource::inline(vec![json!({"x": 1, "y": 2})]);
        let spec = TemplateRegistry::global()
            .expand("scatter_with_trend", Some(&source), &aes("x", "y"), None)
            .unwrap();
        assert_eq!(spec.geoms.len(), 2);
        assert_eq!(spec.geoms[1].params["method"], json!("lm"));
        assert_eq!(spec.theme.as_ref().unwrap().base, "minimal");
        assert_eq!(spec.data_source, Some(source));
        assert!(resolve(&spec).is_ok());
    }

    #[test]
    fn test_overrides_are_shallow() {
        let overrides = json!({"theme": {"base": "dark"}});
        let spec = TemplateRegistry::global()
            .expand("time_series", None, &aes("t", "v"), overrides.as_object())
            .unwrap();
        let theme = spec.theme.unwrap();
        assert_eq!(theme.base, "dark");
        // The template's customizations went with the replaced theme object
        assert!(theme.customizations.is_empty());
        assert_eq!(spec.scales.len(), 1);
    }

    #[test]
    fn test_single_geom_override_replaces_layers() {
        let overrides = json!({"geom": {"type": "area"}});
        let spec = TemplateRegistry::global()
            .expand("scatter_with_trend", None, &aes("x", "y"), overrides.as_object())
            .unwrap();
        assert_eq!(spec.geoms.len(), 1);
        assert_eq!(spec.geoms[0].kind, "area");
    }

    #[test]
    fn test_missing_aesthetics() {
        let err = TemplateRegistry::global()
            .expand("correlation_heatmap", None, &aes("x", "y"), None)
            .unwrap_err();
        match err {
            TemplateError::MissingAesthetics {
                required, missing, ..
            } => {
                assert_eq!(required, vec!["x", "y", "fill"]);
                assert_eq!(missing, vec!["fill"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_scatter_with_trend_needs_y() {
        let only_x = Aesthetics {
            x: Some("x".into()),
            ..Default::default()
        };
        let err = TemplateRegistry::global()
            .expand("scatter_with_trend", None, &only_x, None)
            .unwrap_err();
        match err {
            TemplateError::MissingAesthetics {
                template, missing, ..
            } => {
                assert_eq!(template, "scatter_with_trend");
                assert_eq!(missing, vec!["y"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_template_suggests() {
        let err = TemplateRegistry::global()
            .expand("time_serie", None, &aes("x", "y"), None)
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Did you mean: 'time_series'?"));
        assert!(msg.contains("Available templates: before_after, boxplot_comparison"));
    }

    #[test]
    fn test_request_folds_labels_and_output() {
        let request: TemplateRequest = serde_json::from_value(json!({
            "template_name": "category_breakdown",
            "aes": {"x": "cat", "y": "n"},
            "labels": {"title": "Counts"},
            "output": {"filename": "counts", "format": "svg"},
            "overrides": {"labels": {"title": "ignored"}},
        }))
        .unwrap();
        let spec = TemplateRegistry::global().expand_request(&request).unwrap();
        assert_eq!(spec.labels.unwrap().title.as_deref(), Some("Counts"));
        assert_eq!(spec.output.filename.as_deref(), Some("counts"));
        assert_eq!(spec.coords.unwrap().kind, "flip");
    }

    #[test]
    fn test_load_from_dir_adds_templates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("area_stack.json"),
            json!({
                "name": "area_stack",
                "description": "Stacked areas",
                "config": {"geoms": [{"type": "area"}]},
                "required_aesthetics": ["x", "y", "fill"],
            })
            .to_string(),
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();

        let registry = TemplateRegistry::load_from_dir(dir.path()).unwrap();
        assert_eq!(registry.list().len(), 10);
        assert_eq!(registry.get("area_stack").unwrap().required_aesthetics.len(), 3);
    }

    #[test]
    fn test_load_from_dir_skips_unreadable_entries() {
        let dir = tempfile::tempdir().unwrap();
        // A directory with a .json name cannot be read as a file
        std::fs::create_dir(dir.path().join("nested.json")).unwrap();
        std::fs::write(
            dir.path().join("dots.json"),
            json!({
                "name": "dots",
                "description": "Plain dots",
                "config": {"geom": {"type": "point"}},
            })
            .to_string(),
        )
        .unwrap();

        let registry = TemplateRegistry::load_from_dir(dir.path()).unwrap();
        assert!(registry.get("dots").is_some());
        assert_eq!(registry.list().len(), 10);
    }

    #[test]
    fn test_suggest_rules() {
        assert_eq!(
            suggest_templates(1, 1, true, None),
            vec![
                "time_series",
                "multi_line",
                "distribution_comparison",
                "boxplot_comparison",
                "category_breakdown"
            ]
        );
        assert_eq!(
            suggest_templates(3, 0, false, None),
            vec!["scatter_with_trend", "correlation_heatmap", "histogram_with_density"]
        );
        assert!(suggest_templates(0, 0, false, None).is_empty());
    }

    #[test]
    fn test_suggest_goal_first_group_wins() {
        // "time" matches before "distribution" is considered
        assert_eq!(
            suggest_templates(1, 1, true, Some("Distribution over time")),
            vec!["time_series", "multi_line"]
        );
        assert_eq!(
            suggest_templates(1, 1, true, Some("compare groups")),
            vec!["distribution_comparison", "boxplot_comparison"]
        );
    }

    #[test]
    fn test_suggest_for_dataset() {
        let data = DataSet::from_records(&[
            json!({"date": "2024-01-01", "value": 10, "category": "A"}),
            json!({"date": "2024-01-02", "value": 20, "category": "B"}),
        ])
        .unwrap();
        assert_eq!(
            suggest_for_dataset(&data, Some("show trend over time")),
            vec!["time_series", "multi_line"]
        );
    }
}
