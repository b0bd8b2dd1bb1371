//! PlotSpec Core - Declarative Chart Specification Compiler
//!
//! # The Five Rules
//! 1. Specs Are Data (resolution never mutates the caller's spec)
//! 2. Transforms Run In Order, Fail Whole
//! 3. Templates Expand, Overrides Win
//! 4. Every Unknown Name Gets A Suggestion
//! 5. Same Spec, Same Plan Hash

pub mod data;
pub mod suggest;
pub mod expr;
pub mod transforms;
pub mod spec;
pub mod palettes;
pub mod resolve;
pub mod templates;
pub mod hashing;
pub mod loader;
pub mod render;
pub mod config;
pub mod pipeline;

pub use data::{Column, ColumnKind, DataError, DataProfile, DataSet, Scalar, Timestamp};
pub use expr::{parse_expr, Expr, ExprError};
pub use transforms::{
    apply_transforms, TransformCause, TransformError, TransformPipeline, TransformStep,
};
pub use spec::{
    Aesthetics, DataSource, GeomConfig, OutputConfig, Params, PlotSpec, ScaleConfig, ThemeConfig,
};
pub use palettes::{
    get_palette, list_palettes, palette_categories, scale_from_palette, PaletteError,
};
pub use resolve::{resolve, list_geoms, list_themes, GeomKind, RenderPlan, SpecError, ThemeBase};
pub use templates::{
    suggest_for_dataset, suggest_templates, Template, TemplateError, TemplateRegistry,
    TemplateRequest,
};
pub use hashing::{canonical_json, compute_plan_hash};
pub use loader::{DataLoadError, DataLoader, InlineLoader};
pub use render::{RecordingRenderer, RenderError, RenderOutcome, Renderer};
pub use config::{export_config, import_config, ConfigError};
pub use pipeline::{BatchItem, BatchReport, PlotArtifact, PlotError, PlotPipeline};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
