//! Spec Resolver - symbolic names to a validated render plan
//!
//! Resolution is pure: the caller's spec is read, never modified, and the
//! resulting plan lists components in the order the renderer assembles
//! them (layers, stats, scales, facet, labels, coord, theme).
//!
//! Column names are NOT checked here. The renderer sees the data and
//! reports unknown columns.

use std::fmt;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::spec::{
    Aesthetics, CoordConfig, FacetConfig, FacetKind, GeomConfig, LabelsConfig, OutputConfig,
    OutputFormat, Params, PlotSpec, ScaleConfig, StatConfig, ThemeConfig,
};
use crate::suggest::{sorted_vocabulary, suggest, NAME_THRESHOLD};

#[derive(Debug, Clone, Error, PartialEq)]
#[error("{}", render_spec_error(.field, .reason, .suggestion, .available))]
pub struct SpecError {
    pub field: String,
    pub reason: String,
    pub suggestion: Option<String>,
    /// Sorted vocabulary, empty when the field is not a closed name.
    pub available: Vec<String>,
}

fn render_spec_error(
    field: &str,
    reason: &str,
    suggestion: &Option<String>,
    available: &[String],
) -> String {
    let mut message = format!("{}: {}", field, reason);
    if let Some(s) = suggestion {
        message.push_str(&format!("\n\nDid you mean: '{}'?", s));
    }
    if !available.is_empty() {
        message.push_str(&format!("\n\nAvailable: {}", available.join(", ")));
    }
    message
}

impl SpecError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: "missing".to_string(),
            suggestion: None,
            available: Vec::new(),
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
            suggestion: None,
            available: Vec::new(),
        }
    }

    pub fn unknown(
        field: impl Into<String>,
        label: &str,
        value: &str,
        vocabulary: &[&str],
    ) -> Self {
        Self {
            field: field.into(),
            reason: format!("Unknown {}: '{}'", label, value),
            suggestion: suggest(value, vocabulary, NAME_THRESHOLD).map(str::to_string),
            available: sorted_vocabulary(vocabulary),
        }
    }
}

/// Closed name sets with case-insensitive lookup.
macro_rules! closed_vocabulary {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
            pub const NAMES: &'static [&'static str] = &[$($text),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn lookup(name: &str) -> Option<Self> {
                let lower = name.to_lowercase();
                Self::ALL.iter().copied().find(|v| v.as_str() == lower)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

closed_vocabulary!(GeomKind {
    Point => "point",
    Line => "line",
    Bar => "bar",
    Col => "col",
    Histogram => "histogram",
    Boxplot => "boxplot",
    Violin => "violin",
    Area => "area",
    Density => "density",
    Smooth => "smooth",
    Jitter => "jitter",
    Tile => "tile",
    Text => "text",
    Errorbar => "errorbar",
    Hline => "hline",
    Vline => "vline",
    Abline => "abline",
    Path => "path",
    Polygon => "polygon",
    Ribbon => "ribbon",
});

impl GeomKind {
    pub fn description(self) -> &'static str {
        match self {
            GeomKind::Point => "Scatter plot points",
            GeomKind::Line => "Line plot connecting points",
            GeomKind::Bar => "Bar chart (stat='count' by default)",
            GeomKind::Col => "Column chart (stat='identity')",
            GeomKind::Histogram => "Histogram of continuous data",
            GeomKind::Boxplot => "Box and whisker plot",
            GeomKind::Violin => "Violin plot for distribution",
            GeomKind::Area => "Area plot (filled line)",
            GeomKind::Density => "Density plot",
            GeomKind::Smooth => "Smoothed conditional means",
            GeomKind::Jitter => "Jittered points (for overplotting)",
            GeomKind::Tile => "Tile/heatmap",
            GeomKind::Text => "Text annotations",
            GeomKind::Errorbar => "Error bars",
            GeomKind::Hline => "Horizontal reference line",
            GeomKind::Vline => "Vertical reference line",
            GeomKind::Abline => "Diagonal reference line",
            GeomKind::Path => "Path connecting points in order",
            GeomKind::Polygon => "Filled polygon",
            GeomKind::Ribbon => "Ribbon (for confidence intervals)",
        }
    }
}

closed_vocabulary!(ThemeBase {
    Gray => "gray",
    Bw => "bw",
    Minimal => "minimal",
    Classic => "classic",
    Dark => "dark",
    Light => "light",
    Void => "void",
});

closed_vocabulary!(CoordKind {
    Cartesian => "cartesian",
    Flip => "flip",
    Fixed => "fixed",
    Trans => "trans",
});

closed_vocabulary!(StatKind {
    Smooth => "smooth",
    Bin => "bin",
    Density => "density",
    Summary => "summary",
});

closed_vocabulary!(ScaleConstructor {
    XContinuous => "scale_x_continuous",
    YContinuous => "scale_y_continuous",
    XDiscrete => "scale_x_discrete",
    YDiscrete => "scale_y_discrete",
    XLog10 => "scale_x_log10",
    YLog10 => "scale_y_log10",
    XSqrt => "scale_x_sqrt",
    YSqrt => "scale_y_sqrt",
    XDatetime => "scale_x_datetime",
    YDatetime => "scale_y_datetime",
    ColorGradient => "scale_color_gradient",
    ColorDiscrete => "scale_color_discrete",
    FillGradient => "scale_fill_gradient",
    FillDiscrete => "scale_fill_discrete",
    ColorBrewer => "scale_color_brewer",
    FillBrewer => "scale_fill_brewer",
});

/// Customization keys a theme understands. Anything else is ignored.
pub const THEME_CUSTOMIZATIONS: [&str; 8] = [
    "figure_size",
    "legend_position",
    "legend_direction",
    "panel_background",
    "plot_background",
    "text",
    "axis_text",
    "axis_title",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub geom: GeomKind,
    pub params: Params,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatLayer {
    pub stat: StatKind,
    pub params: Params,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedScale {
    pub constructor: ScaleConstructor,
    pub params: Params,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemeOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub figure_size: Option<(f64, f64)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legend_position: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legend_direction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel_background: Option<Params>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot_background: Option<Params>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Params>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis_text: Option<Params>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis_title: Option<Params>,
}

impl ThemeOverrides {
    pub fn is_empty(&self) -> bool {
        *self == ThemeOverrides::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTheme {
    pub base: ThemeBase,
    pub overrides: ThemeOverrides,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFacet {
    pub kind: FacetKind,
    pub formula: String,
    pub params: Params,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedCoord {
    pub coord: CoordKind,
    pub params: Params,
}

/// Where and how the rendered figure lands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputTarget {
    pub path: PathBuf,
    pub format: OutputFormat,
    pub width: f64,
    pub height: f64,
    pub dpi: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPlan {
    pub aesthetics: IndexMap<String, String>,
    pub layers: Vec<Layer>,
    pub stats: Vec<StatLayer>,
    pub scales: Vec<ResolvedScale>,
    pub facet: Option<ResolvedFacet>,
    pub labels: Option<IndexMap<String, String>>,
    pub coord: Option<ResolvedCoord>,
    pub theme: Option<ResolvedTheme>,
    pub output: OutputTarget,
}

impl RenderPlan {
    /// Renderer-facing component names in assembly order.
    pub fn components(&self) -> Vec<String> {
        let mut out: Vec<String> = self.layers.iter().map(|l| format!("geom_{}", l.geom)).collect();
        out.extend(self.stats.iter().map(|s| format!("stat_{}", s.stat)));
        out.extend(self.scales.iter().map(|s| s.constructor.to_string()));
        if let Some(facet) = &self.facet {
            out.push(match facet.kind {
                FacetKind::Wrap => "facet_wrap".to_string(),
                FacetKind::Grid => "facet_grid".to_string(),
            });
        }
        if self.labels.is_some() {
            out.push("labs".to_string());
        }
        if let Some(coord) = &self.coord {
            out.push(format!("coord_{}", coord.coord));
        }
        if let Some(theme) = &self.theme {
            out.push(format!("theme_{}", theme.base));
            if !theme.overrides.is_empty() {
                out.push("theme".to_string());
            }
        }
        out
    }

    /// Every column the aesthetic mapping refers to, de-duplicated, in role order.
    pub fn mapped_columns(&self) -> Vec<&str> {
        let mut cols: Vec<&str> = Vec::new();
        for col in self.aesthetics.values() {
            if !cols.contains(&col.as_str()) {
                cols.push(col);
            }
        }
        cols
    }

    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        crate::hashing::compute_plan_hash(self)
    }
}

/// Resolve a whole spec into a render plan.
pub fn resolve(spec: &PlotSpec) -> Result<RenderPlan, SpecError> {
    let plan = RenderPlan {
        aesthetics: resolve_aesthetics(&spec.aes),
        layers: resolve_layers(&spec.geoms)?,
        stats: spec.stats.iter().map(resolve_stat).collect::<Result<_, _>>()?,
        scales: spec.scales.iter().map(resolve_scale).collect::<Result<_, _>>()?,
        facet: spec.facets.as_ref().map(resolve_facet).transpose()?,
        labels: spec.labels.as_ref().and_then(resolve_labels),
        coord: spec.coords.as_ref().map(resolve_coord).transpose()?,
        theme: spec.theme.as_ref().map(resolve_theme).transpose()?,
        output: resolve_output(&spec.output)?,
    };
    debug!(
        layers = plan.layers.len(),
        scales = plan.scales.len(),
        stats = plan.stats.len(),
        facet = plan.facet.is_some(),
        "resolved plot spec"
    );
    Ok(plan)
}

pub fn resolve_aesthetics(aes: &Aesthetics) -> IndexMap<String, String> {
    aes.mapped()
}

pub fn resolve_layers(geoms: &[GeomConfig]) -> Result<Vec<Layer>, SpecError> {
    if geoms.is_empty() {
        return Err(SpecError::missing("geom"));
    }
    geoms.iter().map(resolve_layer).collect()
}

pub fn resolve_layer(geom: &GeomConfig) -> Result<Layer, SpecError> {
    let kind = GeomKind::lookup(&geom.kind)
        .ok_or_else(|| SpecError::unknown("geom", "geometry type", &geom.kind, GeomKind::NAMES))?;
    Ok(Layer {
        geom: kind,
        params: geom.params.clone(),
    })
}

pub fn resolve_scale(scale: &ScaleConfig) -> Result<ResolvedScale, SpecError> {
    let mut aesthetic = scale.aesthetic.to_lowercase();
    if aesthetic == "colour" {
        aesthetic = "color".to_string();
    }
    let name = format!("scale_{}_{}", aesthetic, scale.kind.to_lowercase());
    let constructor = ScaleConstructor::lookup(&name)
        .ok_or_else(|| SpecError::unknown("scales", "scale", &name, ScaleConstructor::NAMES))?;
    Ok(ResolvedScale {
        constructor,
        params: scale.params.clone(),
    })
}

pub fn resolve_theme(theme: &ThemeConfig) -> Result<ResolvedTheme, SpecError> {
    let base = match theme.base.to_lowercase().as_str() {
        "grey" => ThemeBase::Gray,
        other => ThemeBase::lookup(other)
            .ok_or_else(|| SpecError::unknown("theme", "theme", &theme.base, ThemeBase::NAMES))?,
    };
    Ok(ResolvedTheme {
        base,
        overrides: theme_overrides(&theme.customizations)?,
    })
}

fn element_params(key: &str, value: &Value) -> Result<Params, SpecError> {
    match value {
        Value::Object(map) => Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        _ => Err(SpecError::invalid(
            format!("theme.customizations.{}", key),
            "must be an object of element parameters",
        )),
    }
}

fn theme_overrides(customizations: &Params) -> Result<ThemeOverrides, SpecError> {
    let mut overrides = ThemeOverrides::default();
    for (key, value) in customizations {
        match key.as_str() {
            "figure_size" => {
                let pair = value
                    .as_array()
                    .filter(|a| a.len() == 2)
                    .and_then(|a| Some((a[0].as_f64()?, a[1].as_f64()?)))
                    .ok_or_else(|| {
                        SpecError::invalid(
                            "theme.customizations.figure_size",
                            "must be a [width, height] pair of numbers",
                        )
                    })?;
                overrides.figure_size = Some(pair);
            }
            "legend_position" => overrides.legend_position = Some(value.clone()),
            "legend_direction" => {
                let dir = value.as_str().ok_or_else(|| {
                    SpecError::invalid("theme.customizations.legend_direction", "must be a string")
                })?;
                overrides.legend_direction = Some(dir.to_string());
            }
            "panel_background" => overrides.panel_background = Some(element_params(key, value)?),
            "plot_background" => overrides.plot_background = Some(element_params(key, value)?),
            "text" => overrides.text = Some(element_params(key, value)?),
            "axis_text" => overrides.axis_text = Some(element_params(key, value)?),
            "axis_title" => overrides.axis_title = Some(element_params(key, value)?),
            _ => {}
        }
    }
    Ok(overrides)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

pub fn resolve_facet(facet: &FacetConfig) -> Result<ResolvedFacet, SpecError> {
    let formula = match facet.kind {
        FacetKind::Wrap => non_empty(&facet.facets)
            .ok_or_else(|| SpecError::invalid("facets", "facet_wrap requires 'facets' parameter"))?
            .to_string(),
        FacetKind::Grid => match (non_empty(&facet.rows), non_empty(&facet.cols)) {
            (Some(r), Some(c)) => format!("{} ~ {}", r, c),
            (Some(r), None) => format!("{} ~ .", r),
            (None, Some(c)) => format!(". ~ {}", c),
            (None, None) => {
                return Err(SpecError::invalid(
                    "facets",
                    "facet_grid requires 'rows' or 'cols' parameter",
                ))
            }
        },
    };
    Ok(ResolvedFacet {
        kind: facet.kind,
        formula,
        params: facet.params.clone(),
    })
}

pub fn resolve_coord(coord: &CoordConfig) -> Result<ResolvedCoord, SpecError> {
    let kind = CoordKind::lookup(&coord.kind)
        .ok_or_else(|| SpecError::unknown("coords", "coord type", &coord.kind, CoordKind::NAMES))?;
    Ok(ResolvedCoord {
        coord: kind,
        params: coord.params.clone(),
    })
}

pub fn resolve_stat(stat: &StatConfig) -> Result<StatLayer, SpecError> {
    let kind = StatKind::lookup(&stat.kind)
        .ok_or_else(|| SpecError::unknown("stats", "stat type", &stat.kind, StatKind::NAMES))?;
    Ok(StatLayer {
        stat: kind,
        params: stat.params.clone(),
    })
}

/// `None` when no label is set.
pub fn resolve_labels(labels: &LabelsConfig) -> Option<IndexMap<String, String>> {
    let resolved: IndexMap<String, String> = [
        ("title", &labels.title),
        ("x", &labels.x),
        ("y", &labels.y),
        ("caption", &labels.caption),
        ("subtitle", &labels.subtitle),
    ]
    .into_iter()
    .filter_map(|(key, value)| non_empty(value).map(|v| (key.to_string(), v.to_string())))
    .collect();
    (!resolved.is_empty()).then_some(resolved)
}

pub fn resolve_output(output: &OutputConfig) -> Result<OutputTarget, SpecError> {
    if !(output.width > 0.0) {
        return Err(SpecError::invalid("output.width", "must be greater than 0"));
    }
    if !(output.height > 0.0) {
        return Err(SpecError::invalid("output.height", "must be greater than 0"));
    }
    if output.dpi == 0 {
        return Err(SpecError::invalid("output.dpi", "must be greater than 0"));
    }

    let ext = output.format.extension();
    let filename = match non_empty(&output.filename) {
        Some(name) if PathBuf::from(name).extension().is_some() => name.to_string(),
        Some(name) => format!("{}.{}", name, ext),
        None => {
            let id = Uuid::new_v4().simple().to_string();
            format!("plot_{}.{}", &id[..8], ext)
        }
    };

    Ok(OutputTarget {
        path: PathBuf::from(&output.directory).join(filename),
        format: output.format,
        width: output.width,
        height: output.height,
        dpi: output.dpi,
    })
}

/// Geometry names with a one-line description, sorted by name.
pub fn list_geoms() -> IndexMap<&'static str, &'static str> {
    let mut geoms: Vec<GeomKind> = GeomKind::ALL.to_vec();
    geoms.sort_by_key(|g| g.as_str());
    geoms.into_iter().map(|g| (g.as_str(), g.description())).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeCatalog {
    pub bases: Vec<&'static str>,
    pub synonyms: IndexMap<&'static str, &'static str>,
    pub customizations: Vec<&'static str>,
}

pub fn list_themes() -> ThemeCatalog {
    let mut synonyms = IndexMap::new();
    synonyms.insert("grey", "gray");
    ThemeCatalog {
        bases: ThemeBase::NAMES.to_vec(),
        synonyms,
        customizations: THEME_CUSTOMIZATIONS.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(value: Value) -> PlotSpec {
        PlotSpec::from_value(value).unwrap()
    }

    #[test]
    fn test_resolve_minimal() {
        let plan = resolve(&spec(json!({
            "aes": {"x": "a", "y": "b", "color": ""},
            "geom": {"type": "Point", "params": {"size": 3}},
        })))
        .unwrap();
        assert_eq!(plan.aesthetics.len(), 2);
        assert_eq!(plan.layers[0].geom, GeomKind::Point);
        assert_eq!(plan.layers[0].params["size"], json!(3));
        assert!(plan.theme.is_none());
    }

    #[test]
    fn test_missing_geom() {
        let err = resolve(&spec(json!({"aes": {"x": "a"}}))).unwrap_err();
        assert_eq!(err, SpecError::missing("geom"));
    }

    #[test]
    fn test_unknown_geom_suggests() {
        let err = resolve_layer(&GeomConfig::new("ponit")).unwrap_err();
        assert_eq!(err.suggestion.as_deref(), Some("point"));
        assert_eq!(err.available.len(), 20);
        assert_eq!(err.available[0], "abline");
        assert!(err.to_string().contains("Unknown geometry type: 'ponit'"));
    }

    #[test]
    fn test_scale_aliases() {
        let scale = ScaleConfig {
            aesthetic: "Colour".into(),
            kind: "Gradient".into(),
            params: Params::new(),
        };
        assert_eq!(resolve_scale(&scale).unwrap().constructor, ScaleConstructor::ColorGradient);

        let bad = ScaleConfig {
            aesthetic: "x".into(),
            kind: "log".into(),
            params: Params::new(),
        };
        let err = resolve_scale(&bad).unwrap_err();
        assert_eq!(err.suggestion.as_deref(), Some("scale_x_log10"));
    }

    #[test]
    fn test_theme_grey_and_overrides() {
        let theme: ThemeConfig = serde_json::from_value(json!({
            "base": "GREY",
            "customizations": {
                "figure_size": [10, 4.5],
                "legend_position": "bottom",
                "text": {"size": 12},
                "unrelated": 1
            }
        }))
        .unwrap();
        let resolved = resolve_theme(&theme).unwrap();
        assert_eq!(resolved.base, ThemeBase::Gray);
        assert_eq!(resolved.overrides.figure_size, Some((10.0, 4.5)));
        assert_eq!(resolved.overrides.text.as_ref().unwrap()["size"], json!(12));
    }

    #[test]
    fn test_theme_rejects_bad_figure_size() {
        let theme: ThemeConfig =
            serde_json::from_value(json!({"customizations": {"figure_size": [10]}})).unwrap();
        assert_eq!(
            resolve_theme(&theme).unwrap_err().field,
            "theme.customizations.figure_size"
        );
    }

    #[test]
    fn test_unknown_theme() {
        let theme = ThemeConfig {
            base: "minimall".into(),
            ..Default::default()
        };
        let err = resolve_theme(&theme).unwrap_err();
        assert_eq!(err.suggestion.as_deref(), Some("minimal"));
    }

    #[test]
    fn test_facet_formulas() {
        let grid = |rows: Option<&str>, cols: Option<&str>| FacetConfig {
            kind: FacetKind::Grid,
            rows: rows.map(String::from),
            cols: cols.map(String::from),
            ..Default::default()
        };
        assert_eq!(resolve_facet(&grid(Some("a"), Some("b"))).unwrap().formula, "a ~ b");
        assert_eq!(resolve_facet(&grid(Some("a"), None)).unwrap().formula, "a ~ .");
        assert_eq!(resolve_facet(&grid(None, Some("b"))).unwrap().formula, ". ~ b");
        assert!(resolve_facet(&grid(None, None)).is_err());
        assert!(resolve_facet(&FacetConfig::default()).is_err());
    }

    #[test]
    fn test_component_order() {
        let plan = resolve(&spec(json!({
            "aes": {"x": "a", "y": "b"},
            "geoms": [{"type": "point"}, {"type": "smooth"}],
            "stats": [{"type": "summary"}],
            "scales": [{"aesthetic": "y", "type": "log10"}],
            "facets": {"type": "wrap", "facets": "~ g"},
            "labels": {"title": "T"},
            "coords": {"type": "flip"},
            "theme": {"base": "bw", "customizations": {"legend_position": "none"}},
        })))
        .unwrap();
        assert_eq!(
            plan.components(),
            vec![
                "geom_point",
                "geom_smooth",
                "stat_summary",
                "scale_y_log10",
                "facet_wrap",
                "labs",
                "coord_flip",
                "theme_bw",
                "theme"
            ]
        );
    }

    #[test]
    fn test_output_filename() {
        let mut output = OutputConfig {
            filename: Some("chart".into()),
            format: OutputFormat::Svg,
            ..Default::default()
        };
        assert_eq!(resolve_output(&output).unwrap().path, PathBuf::from("./output/chart.svg"));

        output.filename = None;
        let generated = resolve_output(&output).unwrap().path;
        let name = generated.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("plot_") && name.ends_with(".svg"));
        assert_eq!(name.len(), "plot_".len() + 8 + ".svg".len());

        output.dpi = 0;
        assert_eq!(resolve_output(&output).unwrap_err().field, "output.dpi");
    }

    #[test]
    fn test_resolution_leaves_spec_untouched() {
        let original = spec(json!({"geom": {"type": "LINE"}, "theme": {"base": "Dark"}}));
        let before = original.clone();
        resolve(&original).unwrap();
        assert_eq!(original, before);
    }

    #[test]
    fn test_list_geoms_sorted() {
        let geoms = list_geoms();
        let names: Vec<_> = geoms.keys().copied().collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(geoms["tile"], "Tile/heatmap");
    }
}
