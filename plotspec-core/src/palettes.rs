//! Palette Registry - named color sequences by category
//!
//! Palettes are addressed by their fully-qualified name
//! `{category}_{name}`, or by any suffix after an underscore.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::spec::{Params, ScaleConfig};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PaletteError {
    #[error("Palette '{name}' not found. Use list_palettes() to see available palettes.")]
    NotFound { name: String },

    #[error("Unknown scale type for palette: '{0}' (expected 'discrete' or 'gradient')")]
    UnsupportedScale(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaletteCategory {
    ColorblindSafe,
    Scientific,
    Categorical,
    Corporate,
    Sequential,
    Diverging,
}

impl PaletteCategory {
    pub const ALL: [PaletteCategory; 6] = [
        PaletteCategory::ColorblindSafe,
        PaletteCategory::Scientific,
        PaletteCategory::Categorical,
        PaletteCategory::Corporate,
        PaletteCategory::Sequential,
        PaletteCategory::Diverging,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PaletteCategory::ColorblindSafe => "colorblind_safe",
            PaletteCategory::Scientific => "scientific",
            PaletteCategory::Categorical => "categorical",
            PaletteCategory::Corporate => "corporate",
            PaletteCategory::Sequential => "sequential",
            PaletteCategory::Diverging => "diverging",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            PaletteCategory::ColorblindSafe => "Accessible color schemes for colorblind viewers",
            PaletteCategory::Scientific => {
                "Perceptually uniform palettes (viridis, plasma, inferno, magma)"
            }
            PaletteCategory::Categorical => "Distinct colors for categorical data",
            PaletteCategory::Corporate => "Professional color schemes for business presentations",
            PaletteCategory::Sequential => "Gradual color scales for ordered data",
            PaletteCategory::Diverging => "Two-tone scales for data with a midpoint",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub category: PaletteCategory,
    pub name: &'static str,
    pub colors: &'static [&'static str],
}

impl Palette {
    pub fn qualified_name(&self) -> String {
        format!("{}_{}", self.category.as_str(), self.name)
    }

    pub fn first(&self) -> &'static str {
        self.colors[0]
    }

    pub fn last(&self) -> &'static str {
        self.colors[self.colors.len() - 1]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaletteInfo {
    pub name: String,
    pub category: String,
    pub colors: Vec<&'static str>,
    pub count: usize,
}

macro_rules! palette {
    ($category:ident, $name:literal, [$($color:literal),+ $(,)?]) => {
        Palette {
            category: PaletteCategory::$category,
            name: $name,
            colors: &[$($color),+],
        }
    };
}

/// Registry order matters: suffix lookup returns the first hit.
static PALETTES: &[Palette] = &[
    palette!(ColorblindSafe, "okabe_ito", [
        "#E69F00", "#56B4E9", "#009E73", "#F0E442", "#0072B2", "#D55E00", "#CC79A7",
    ]),
    palette!(ColorblindSafe, "tol_bright", [
        "#4477AA", "#EE6677", "#228833", "#CCBB44", "#66CCEE", "#AA3377", "#BBBBBB",
    ]),
    palette!(ColorblindSafe, "tol_muted", [
        "#332288", "#88CCEE", "#44AA99", "#117733", "#999933", "#DDCC77", "#CC6677", "#882255",
        "#AA4499",
    ]),
    palette!(Scientific, "viridis", [
        "#440154", "#482777", "#3E4989", "#31688E", "#26828E", "#1F9E89", "#35B779", "#6DCD59",
        "#B4DE2C", "#FDE724",
    ]),
    palette!(Scientific, "plasma", [
        "#0D0887", "#4C02A1", "#7E03A8", "#A92395", "#CC4678", "#E56B5D", "#F89441", "#FEC328",
        "#F0F921",
    ]),
    palette!(Scientific, "inferno", [
        "#000004", "#1B0C41", "#4A0C6B", "#781C6D", "#A52C60", "#CF4446", "#ED6925", "#FB9A06",
        "#F7D13D", "#FCFFA4",
    ]),
    palette!(Scientific, "magma", [
        "#000004", "#180F3E", "#451077", "#721F81", "#9F2F7F", "#CD4071", "#F1605D", "#FD9668",
        "#FEC287", "#FCFDBF",
    ]),
    palette!(Categorical, "set1", [
        "#E41A1C", "#377EB8", "#4DAF4A", "#984EA3", "#FF7F00", "#FFFF33", "#A65628", "#F781BF",
        "#999999",
    ]),
    palette!(Categorical, "set2", [
        "#66C2A5", "#FC8D62", "#8DA0CB", "#E78AC3", "#A6D854", "#FFD92F", "#E5C494", "#B3B3B3",
    ]),
    palette!(Categorical, "set3", [
        "#8DD3C7", "#FFFFB3", "#BEBADA", "#FB8072", "#80B1D3", "#FDB462", "#B3DE69", "#FCCDE5",
        "#D9D9D9", "#BC80BD", "#CCEBC5", "#FFED6F",
    ]),
    palette!(Categorical, "tableau10", [
        "#4E79A7", "#F28E2B", "#E15759", "#76B7B2", "#59A14F", "#EDC948", "#B07AA1", "#FF9DA7",
        "#9C755F", "#BAB0AC",
    ]),
    palette!(Corporate, "corporate_blue", [
        "#003f5c", "#2f4b7c", "#665191", "#a05195", "#d45087", "#f95d6a", "#ff7c43", "#ffa600",
    ]),
    palette!(Corporate, "professional", [
        "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    ]),
    palette!(Corporate, "modern", ["#264653", "#2A9D8F", "#E9C46A", "#F4A261", "#E76F51"]),
    palette!(Sequential, "blues", [
        "#F7FBFF", "#DEEBF7", "#C6DBEF", "#9ECAE1", "#6BAED6", "#4292C6", "#2171B5", "#08519C",
        "#08306B",
    ]),
    palette!(Sequential, "greens", [
        "#F7FCF5", "#E5F5E0", "#C7E9C0", "#A1D99B", "#74C476", "#41AB5D", "#238B45", "#006D2C",
        "#00441B",
    ]),
    palette!(Sequential, "reds", [
        "#FFF5F0", "#FEE0D2", "#FCBBA1", "#FC9272", "#FB6A4A", "#EF3B2C", "#CB181D", "#A50F15",
        "#67000D",
    ]),
    palette!(Sequential, "oranges", [
        "#FFF5EB", "#FEE6CE", "#FDD0A2", "#FDAE6B", "#FD8D3C", "#F16913", "#D94801", "#A63603",
        "#7F2704",
    ]),
    palette!(Diverging, "red_blue", [
        "#B2182B", "#D6604D", "#F4A582", "#FDDBC7", "#F7F7F7", "#D1E5F0", "#92C5DE", "#4393C3",
        "#2166AC",
    ]),
    palette!(Diverging, "red_green", [
        "#D73027", "#F46D43", "#FDAE61", "#FEE08B", "#FFFFBF", "#D9EF8B", "#A6D96A", "#66BD63",
        "#1A9850",
    ]),
    palette!(Diverging, "purple_orange", [
        "#7F3B08", "#B35806", "#E08214", "#FDB863", "#FEE0B6", "#F7F7F7", "#D8DAEB", "#B2ABD2",
        "#8073AC", "#542788",
    ]),
];

pub fn all_palettes() -> &'static [Palette] {
    PALETTES
}

/// Exact qualified match first, then the first palette whose qualified
/// name ends with `_{name}`.
pub fn get_palette(name: &str) -> Result<&'static Palette, PaletteError> {
    if let Some(p) = PALETTES.iter().find(|p| p.qualified_name() == name) {
        return Ok(p);
    }
    let suffix = format!("_{}", name);
    PALETTES
        .iter()
        .find(|p| p.qualified_name().ends_with(&suffix))
        .ok_or_else(|| PaletteError::NotFound {
            name: name.to_string(),
        })
}

/// Qualified name to colors, optionally limited to one category prefix.
pub fn list_palettes(category: Option<&str>) -> IndexMap<String, Vec<&'static str>> {
    let prefix = category.map(|c| format!("{}_", c));
    PALETTES
        .iter()
        .map(|p| (p.qualified_name(), p.colors.to_vec()))
        .filter(|(name, _)| prefix.as_deref().map_or(true, |pre| name.starts_with(pre)))
        .collect()
}

pub fn palette_categories() -> IndexMap<&'static str, &'static str> {
    PaletteCategory::ALL
        .iter()
        .map(|c| (c.as_str(), c.description()))
        .collect()
}

/// Category is read off the requested name's prefix, "unknown" when the
/// caller used a short name.
pub fn palette_info(name: &str) -> Result<PaletteInfo, PaletteError> {
    let palette = get_palette(name)?;
    let category = PaletteCategory::ALL
        .iter()
        .find(|c| name.starts_with(c.as_str()))
        .map_or("unknown", |c| c.as_str());
    Ok(PaletteInfo {
        name: name.to_string(),
        category: category.to_string(),
        colors: palette.colors.to_vec(),
        count: palette.colors.len(),
    })
}

/// Build a color/fill scale from a palette.
pub fn scale_from_palette(
    name: &str,
    aesthetic: &str,
    scale_type: &str,
) -> Result<ScaleConfig, PaletteError> {
    let palette = get_palette(name)?;
    let mut params = Params::new();
    match scale_type {
        "discrete" => {
            params.insert("values".into(), Value::from(palette.colors.to_vec()));
        }
        "gradient" => {
            params.insert("low".into(), Value::from(palette.first()));
            params.insert("high".into(), Value::from(palette.last()));
        }
        other => return Err(PaletteError::UnsupportedScale(other.to_string())),
    }
    Ok(ScaleConfig {
        aesthetic: aesthetic.to_string(),
        kind: scale_type.to_string(),
        params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_and_suffix_lookup() {
        assert_eq!(get_palette("scientific_viridis").unwrap().name, "viridis");
        assert_eq!(get_palette("viridis").unwrap().colors.len(), 10);
        assert_eq!(get_palette("okabe_ito").unwrap().first(), "#E69F00");
        assert_eq!(
            get_palette("corporate_blue").unwrap().qualified_name(),
            "corporate_corporate_blue"
        );
    }

    #[test]
    fn test_suffix_lookup_first_in_registry_order() {
        // "blue" is a suffix of both corporate_corporate_blue and diverging_red_blue
        assert_eq!(get_palette("blue").unwrap().name, "corporate_blue");
    }

    #[test]
    fn test_short_name_is_same_palette() {
        assert_eq!(
            get_palette("viridis").unwrap().colors,
            get_palette("scientific_viridis").unwrap().colors
        );
    }

    #[test]
    fn test_every_color_is_hex() {
        for palette in all_palettes() {
            for color in palette.colors {
                let name = palette.qualified_name();
                assert!(color.starts_with('#'), "{} has {}", name, color);
                assert!(color.len() == 7 || color.len() == 9, "{} has {}", name, color);
            }
        }
    }

    #[test]
    fn test_not_found() {
        let err = get_palette("rainbow").unwrap_err();
        assert_eq!(
            err,
            PaletteError::NotFound {
                name: "rainbow".into()
            }
        );
    }

    #[test]
    fn test_list_by_category() {
        let all = list_palettes(None);
        assert_eq!(all.len(), 21);
        let sci = list_palettes(Some("scientific"));
        assert_eq!(
            sci.keys().collect::<Vec<_>>(),
            vec![
                "scientific_viridis",
                "scientific_plasma",
                "scientific_inferno",
                "scientific_magma"
            ]
        );
        assert!(list_palettes(Some("nope")).is_empty());
    }

    #[test]
    fn test_categories_fixed() {
        let cats = palette_categories();
        assert_eq!(cats.len(), 6);
        assert!(cats.contains_key("colorblind_safe"));
    }

    #[test]
    fn test_info_category_from_prefix() {
        let info = palette_info("sequential_blues").unwrap();
        assert_eq!(info.category, "sequential");
        assert_eq!(info.count, 9);
        assert_eq!(palette_info("blues").unwrap().category, "unknown");
    }

    #[test]
    fn test_scale_from_palette() {
        let discrete = scale_from_palette("set2", "fill", "discrete").unwrap();
        assert_eq!(discrete.params["values"].as_array().unwrap().len(), 8);

        let gradient = scale_from_palette("viridis", "color", "gradient").unwrap();
        assert_eq!(gradient.params["low"], "#440154");
        assert_eq!(gradient.params["high"], "#FDE724");

        assert_eq!(
            scale_from_palette("viridis", "color", "brewer").unwrap_err(),
            PaletteError::UnsupportedScale("brewer".into())
        );
    }
}
