//! PlotSpec CLI - JSON bridge to the core
//!
//! Payload arguments take inline JSON or `@path/to/file.json`.
//! Results go to stdout as JSON; logs go to stderr (RUST_LOG, default warn).
//! Exit code 2 means the request was understood but rejected.

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use plotspec_core::{
    apply_transforms, export_config, list_geoms, list_palettes, list_themes,
    palette_categories, palettes::palette_info, resolve, suggest_for_dataset, suggest_templates,
    DataSet, PlotPipeline, PlotSpec, RecordingRenderer, TemplateRegistry, TemplateRequest,
    TransformStep,
};

#[derive(Parser)]
#[command(name = "plotspec-cli")]
#[command(about = "PlotSpec CLI - declarative chart spec resolution and data transforms")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory of extra template definitions (*.json)
    #[arg(short, long)]
    templates_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available templates
    Templates,

    /// List geometry types
    Geoms,

    /// List themes and customization keys
    Themes,

    /// List palettes, optionally for one category
    Palettes {
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Show one palette
    Palette { name: String },

    /// Resolve a spec into a render plan
    Resolve {
        #[arg(short, long)]
        spec: String,
    },

    /// Apply transform steps to inline records
    Transform {
        /// JSON array of records
        #[arg(short, long)]
        data: String,

        /// JSON array of transform steps
        #[arg(short, long)]
        steps: String,
    },

    /// Run a spec through the full pipeline without drawing
    Plot {
        #[arg(short, long)]
        spec: String,
    },

    /// Expand and plot a template request
    Template {
        #[arg(short, long)]
        request: String,
    },

    /// Suggest templates from records or column counts
    Suggest {
        /// JSON array of records; overrides the counts
        #[arg(short, long)]
        data: Option<String>,

        #[arg(long, default_value_t = 0)]
        numeric: usize,

        #[arg(long, default_value_t = 0)]
        categorical: usize,

        #[arg(long)]
        temporal: bool,

        #[arg(short, long)]
        goal: Option<String>,
    },

    /// Run several specs or template requests, reporting each
    Batch {
        /// JSON array of specs
        #[arg(short, long)]
        plots: String,
    },

    /// Save a spec to {directory}/{filename}.json
    Export {
        #[arg(short, long)]
        config: String,

        #[arg(short, long)]
        filename: String,

        #[arg(short, long, default_value = "./configs")]
        directory: PathBuf,
    },

    /// Load a saved spec, apply overrides, and run it
    Import {
        path: PathBuf,

        /// JSON object of top-level keys to replace
        #[arg(short, long)]
        overrides: Option<String>,
    },
}

fn read_payload(arg: &str) -> Result<Value, String> {
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path, e))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&text).map_err(|e| format!("Invalid JSON payload: {}", e))
}

fn parse_payload<T: serde::de::DeserializeOwned>(arg: &str) -> Result<T, String> {
    serde_json::from_value(read_payload(arg)?).map_err(|e| format!("Invalid payload: {}", e))
}

fn records(arg: &str) -> Result<DataSet, String> {
    let rows: Vec<Value> = parse_payload(arg)?;
    DataSet::from_records(&rows).map_err(|e| e.to_string())
}

fn emit<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to serialize output: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn reject(error: impl ToString) -> ExitCode {
    let output = json!({"success": false, "error": error.to_string()});
    println!("{}", output);
    ExitCode::from(2)
}

fn bad_input(error: String) -> ExitCode {
    let output = json!({"success": false, "error": error});
    println!("{}", output);
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let registry = match &cli.templates_dir {
        Some(dir) => match TemplateRegistry::load_from_dir(dir) {
            Ok(r) => r,
            Err(e) => return bad_input(format!("Failed to load templates: {}", e)),
        },
        None => TemplateRegistry::builtin(),
    };

    let pipeline = PlotPipeline::new(
        registry,
        Box::new(plotspec_core::InlineLoader),
        Box::new(RecordingRenderer::new()),
    );

    match cli.command {
        Commands::Templates => {
            let templates: Vec<_> = pipeline
                .list_templates()
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "required_aesthetics": t.required_aesthetics,
                        "suggested_aesthetics": t.suggested_aesthetics,
                    })
                })
                .collect();
            emit(&templates)
        }

        Commands::Geoms => emit(&list_geoms()),

        Commands::Themes => emit(&list_themes()),

        Commands::Palettes { category } => match category {
            Some(c) => emit(&list_palettes(Some(c.as_str()))),
            None => emit(&json!({
                "categories": palette_categories(),
                "palettes": list_palettes(None),
            })),
        },

        Commands::Palette { name } => match palette_info(&name) {
            Ok(info) => emit(&info),
            Err(e) => reject(e),
        },

        Commands::Resolve { spec } => {
            let spec: PlotSpec = match parse_payload(&spec) {
                Ok(s) => s,
                Err(e) => return bad_input(e),
            };
            match resolve(&spec) {
                Ok(plan) => match plan.fingerprint() {
                    Ok(hash) => emit(&json!({
                        "success": true,
                        "plan_hash": hash,
                        "components": plan.components(),
                        "plan": plan,
                    })),
                    Err(e) => reject(e),
                },
                Err(e) => reject(e),
            }
        }

        Commands::Transform { data, steps } => {
            let data = match records(&data) {
                Ok(d) => d,
                Err(e) => return bad_input(e),
            };
            let steps: Vec<TransformStep> = match parse_payload(&steps) {
                Ok(s) => s,
                Err(e) => return bad_input(e),
            };
            match apply_transforms(&data, &steps) {
                Ok(out) => emit(&json!({
                    "success": true,
                    "rows": out.n_rows(),
                    "columns": out.column_names(),
                    "data": out.to_records(),
                })),
                Err(e) => reject(e),
            }
        }

        Commands::Plot { spec } => {
            let spec: PlotSpec = match parse_payload(&spec) {
                Ok(s) => s,
                Err(e) => return bad_input(e),
            };
            match pipeline.create_plot(&spec) {
                Ok(artifact) => emit(&json!({"success": true, "artifact": artifact})),
                Err(e) => reject(e),
            }
        }

        Commands::Template { request } => {
            let request: TemplateRequest = match parse_payload(&request) {
                Ok(r) => r,
                Err(e) => return bad_input(e),
            };
            match pipeline.create_from_template(&request) {
                Ok(artifact) => emit(&json!({"success": true, "artifact": artifact})),
                Err(e) => reject(e),
            }
        }

        Commands::Suggest {
            data,
            numeric,
            categorical,
            temporal,
            goal,
        } => {
            let suggestions = match data {
                Some(arg) => match records(&arg) {
                    Ok(d) => suggest_for_dataset(&d, goal.as_deref()),
                    Err(e) => return bad_input(e),
                },
                None => suggest_templates(numeric, categorical, temporal, goal.as_deref()),
            };
            let registry = pipeline.registry();
            let described: Vec<_> = suggestions
                .iter()
                .map(|name| {
                    json!({
                        "name": name,
                        "description": registry.get(name).map(|t| t.description.as_str()),
                    })
                })
                .collect();
            emit(&described)
        }

        Commands::Batch { plots } => {
            let plots: Vec<Value> = match parse_payload(&plots) {
                Ok(p) => p,
                Err(e) => return bad_input(e),
            };
            let report = pipeline.run_batch(&plots);
            let code = emit(&report);
            if report.failed > 0 {
                ExitCode::from(2)
            } else {
                code
            }
        }

        Commands::Export {
            config,
            filename,
            directory,
        } => {
            let config = match read_payload(&config) {
                Ok(c) => c,
                Err(e) => return bad_input(e),
            };
            match export_config(&config, &directory, &filename) {
                Ok(path) => emit(&json!({"success": true, "path": path})),
                Err(e) => reject(e),
            }
        }

        Commands::Import { path, overrides } => {
            let overrides: Option<Map<String, Value>> = match overrides
                .as_deref()
                .map(parse_payload::<Map<String, Value>>)
                .transpose()
            {
                Ok(o) => o,
                Err(e) => return bad_input(e),
            };
            match pipeline.create_from_config(&path, overrides.as_ref()) {
                Ok(artifact) => emit(&json!({"success": true, "artifact": artifact})),
                Err(e) => reject(e),
            }
        }
    }
}
