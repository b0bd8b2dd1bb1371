//! Plot Specification - the declarative, JSON-shaped input
//!
//! These types mirror the wire format one-to-one. Nothing here validates
//! symbolic names; that is the resolver's job.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::transforms::TransformStep;

/// Open, insertion-ordered parameter bag passed through to the renderer.
pub type Params = IndexMap<String, Value>;

/// Column-to-aesthetic mappings. Every role is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aesthetics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(default, alias = "colour", skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linetype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl Aesthetics {
    pub const ROLES: [&'static str; 9] = [
        "x", "y", "color", "fill", "size", "alpha", "shape", "linetype", "group",
    ];

    pub fn get(&self, role: &str) -> Option<&str> {
        let slot = match role {
            "x" => &self.x,
            "y" => &self.y,
            "color" | "colour" => &self.color,
            "fill" => &self.fill,
            "size" => &self.size,
            "alpha" => &self.alpha,
            "shape" => &self.shape,
            "linetype" => &self.linetype,
            "group" => &self.group,
            _ => return None,
        };
        slot.as_deref().filter(|s| !s.is_empty())
    }

    /// Non-empty mappings in canonical role order.
    pub fn mapped(&self) -> IndexMap<String, String> {
        Self::ROLES
            .iter()
            .filter_map(|role| self.get(role).map(|col| (role.to_string(), col.to_string())))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.mapped().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeomConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: Params,
}

impl GeomConfig {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Params::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: Value) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleConfig {
    pub aesthetic: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: Params,
}

fn default_theme_base() -> String {
    "gray".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeConfig {
    #[serde(default = "default_theme_base")]
    pub base: String,
    #[serde(default)]
    pub customizations: Params,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            base: default_theme_base(),
            customizations: Params::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacetKind {
    #[default]
    Wrap,
    Grid,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacetConfig {
    #[serde(rename = "type", default)]
    pub kind: FacetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facets: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cols: Option<String>,
    #[serde(default)]
    pub params: Params,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
}

fn default_coord() -> String {
    "cartesian".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordConfig {
    #[serde(rename = "type", default = "default_coord")]
    pub kind: String,
    #[serde(default)]
    pub params: Params,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: Params,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Pdf,
    Svg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Svg => "svg",
        }
    }
}

fn default_width() -> f64 {
    8.0
}

fn default_height() -> f64 {
    6.0
}

fn default_dpi() -> u32 {
    300
}

fn default_directory() -> String {
    "./output".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    #[serde(default = "default_directory")]
    pub directory: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            filename: None,
            width: default_width(),
            height: default_height(),
            dpi: default_dpi(),
            directory: default_directory(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    File,
    Url,
    Inline,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    #[default]
    Csv,
    Json,
    Parquet,
    Excel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    #[serde(rename = "type")]
    pub kind: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<DataFormat>,
}

impl DataSource {
    pub fn inline(records: Vec<Value>) -> Self {
        Self {
            kind: SourceKind::Inline,
            path: None,
            data: Some(records),
            format: None,
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::File,
            path: Some(path.into()),
            data: None,
            format: None,
        }
    }
}

/// A complete plot request.
///
/// On the wire a spec may carry either a single `geom` or a `geoms` list.
/// Both collapse into `geoms` here; a non-empty `geoms` wins over `geom`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "PlotSpecWire", into = "PlotSpecWire")]
pub struct PlotSpec {
    pub data_source: Option<DataSource>,
    pub aes: Aesthetics,
    pub geoms: Vec<GeomConfig>,
    pub scales: Vec<ScaleConfig>,
    pub theme: Option<ThemeConfig>,
    pub facets: Option<FacetConfig>,
    pub labels: Option<LabelsConfig>,
    pub coords: Option<CoordConfig>,
    pub stats: Vec<StatConfig>,
    pub transforms: Vec<TransformStep>,
    pub output: OutputConfig,
}

/// Shallow top-level merge of `overrides` into a wire-format spec.
///
/// A lone `geom` override drops any `geoms` list so the single layer is used.
pub fn merge_overrides(base: &mut Map<String, Value>, overrides: &Map<String, Value>) {
    if overrides.contains_key("geom") && !overrides.contains_key("geoms") {
        base.remove("geoms");
    }
    base.extend(overrides.clone());
}

impl PlotSpec {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PlotSpecWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data_source: Option<DataSource>,
    #[serde(default)]
    aes: Aesthetics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    geom: Option<GeomConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    geoms: Option<Vec<GeomConfig>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    scales: Vec<ScaleConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    theme: Option<ThemeConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    facets: Option<FacetConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    labels: Option<LabelsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    coords: Option<CoordConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    stats: Vec<StatConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    transforms: Vec<TransformStep>,
    #[serde(default)]
    output: OutputConfig,
}

impl From<PlotSpecWire> for PlotSpec {
    fn from(wire: PlotSpecWire) -> Self {
        let geoms = match (wire.geoms, wire.geom) {
            (Some(list), _) if !list.is_empty() => list,
            (_, Some(single)) => vec![single],
            _ => Vec::new(),
        };
        PlotSpec {
            data_source: wire.data_source,
            aes: wire.aes,
            geoms,
            scales: wire.scales,
            theme: wire.theme,
            facets: wire.facets,
            labels: wire.labels,
            coords: wire.coords,
            stats: wire.stats,
            transforms: wire.transforms,
            output: wire.output,
        }
    }
}

impl From<PlotSpec> for PlotSpecWire {
    fn from(spec: PlotSpec) -> Self {
        PlotSpecWire {
            data_source: spec.data_source,
            aes: spec.aes,
            geom: None,
            geoms: Some(spec.geoms),
            scales: spec.scales,
            theme: spec.theme,
            facets: spec.facets,
            labels: spec.labels,
            coords: spec.coords,
            stats: spec.stats,
            transforms: spec.transforms,
            output: spec.output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_geom_normalized() {
        let spec = PlotSpec::from_value(json!({
            "aes": {"x": "a", "colour": "c"},
            "geom": {"type": "point", "params": {"size": 3}},
        }))
        .unwrap();
        assert_eq!(spec.geoms.len(), 1);
        assert_eq!(spec.geoms[0].kind, "point");
        assert_eq!(spec.aes.color.as_deref(), Some("c"));
    }

    #[test]
    fn test_geoms_list_wins() {
        let spec = PlotSpec::from_value(json!({
            "geom": {"type": "bar"},
            "geoms": [{"type": "point"}, {"type": "smooth"}],
        }))
        .unwrap();
        let kinds: Vec<_> = spec.geoms.iter().map(|g| g.kind.as_str()).collect();
        assert_eq!(kinds, vec!["point", "smooth"]);
    }

    #[test]
    fn test_empty_geoms_falls_back_to_geom() {
        let spec = PlotSpec::from_value(json!({"geom": {"type": "bar"}, "geoms": []})).unwrap();
        assert_eq!(spec.geoms[0].kind, "bar");
    }

    #[test]
    fn test_output_defaults() {
        let spec = PlotSpec::from_value(json!({})).unwrap();
        assert_eq!(spec.output.format, OutputFormat::Png);
        assert_eq!(spec.output.width, 8.0);
        assert_eq!(spec.output.height, 6.0);
        assert_eq!(spec.output.dpi, 300);
        assert_eq!(spec.output.directory, "./output");
    }

    #[test]
    fn test_mapped_skips_empty_roles() {
        let aes = Aesthetics {
            x: Some("a".into()),
            y: Some(String::new()),
            group: Some("g".into()),
            ..Default::default()
        };
        let mapped = aes.mapped();
        assert_eq!(mapped.keys().collect::<Vec<_>>(), vec!["x", "group"]);
    }

    #[test]
    fn test_wire_roundtrip_uses_geoms() {
        let spec = PlotSpec {
            geoms: vec![GeomConfig::new("line")],
            ..Default::default()
        };
        let value = spec.to_value().unwrap();
        assert!(value.get("geom").is_none());
        assert_eq!(value["geoms"][0]["type"], json!("line"));
        assert_eq!(PlotSpec::from_value(value).unwrap(), spec);
    }
}
