//! Config persistence - save a merged spec, load it back with overrides

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use crate::spec::{merge_overrides, PlotSpec};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config '{}': {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config '{}' must contain a JSON object", .0.display())]
    NotAnObject(PathBuf),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ConfigError + '_ {
    move |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `config` as pretty JSON to `{directory}/{filename}.json`,
/// creating the directory if needed. Returns the written path.
pub fn export_config<T: Serialize>(
    config: &T,
    directory: &Path,
    filename: &str,
) -> Result<PathBuf, ConfigError> {
    fs::create_dir_all(directory).map_err(io_error(directory))?;
    let name = if filename.ends_with(".json") {
        filename.to_string()
    } else {
        format!("{}.json", filename)
    };
    let path = directory.join(name);
    let body = serde_json::to_string_pretty(config)?;
    fs::write(&path, body).map_err(io_error(&path))?;
    info!(path = %path.display(), "exported plot config");
    Ok(path)
}

/// Read a saved config, replacing top-level keys with `overrides`.
pub fn import_config_value(
    path: &Path,
    overrides: Option<&Map<String, Value>>,
) -> Result<Map<String, Value>, ConfigError> {
    let content = fs::read_to_string(path).map_err(io_error(path))?;
    let mut config = match serde_json::from_str::<Value>(&content)? {
        Value::Object(map) => map,
        _ => return Err(ConfigError::NotAnObject(path.to_path_buf())),
    };
    if let Some(overrides) = overrides {
        merge_overrides(&mut config, overrides);
    }
    Ok(config)
}

pub fn import_config(
    path: &Path,
    overrides: Option<&Map<String, Value>>,
) -> Result<PlotSpec, ConfigError> {
    let config = import_config_value(path, overrides)?;
    Ok(PlotSpec::from_value(Value::Object(config))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_export_then_import_with_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let config = json!({
            "data_source": {"type": "file", "path": "./data/test.csv"},
            "aes": {"x": "date", "y": "value", "color": "category"},
            "geom": {"type": "line", "params": {"size": 1.5}},
            "labels": {"title": "Test Plot"},
        });
        let path = export_config(&config, &dir.path().join("configs"), "test_config").unwrap();
        assert!(path.ends_with("configs/test_config.json"));

        let saved: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["aes"]["x"], "date");

        let overrides = json!({"labels": {"title": "Replaced"}});
        let spec = import_config(&path, overrides.as_object()).unwrap();
        assert_eq!(spec.labels.unwrap().title.as_deref(), Some("Replaced"));
        assert_eq!(spec.geoms[0].kind, "line");
    }

    #[test]
    fn test_geom_override_replaces_saved_layers() {
        let dir = tempfile::tempdir().unwrap();
        let spec = PlotSpec::from_value(json!({
            "aes": {"x": "a", "y": "b"},
            "geoms": [{"type": "point"}, {"type": "smooth"}],
        }))
        .unwrap();
        let path = export_config(&spec, dir.path(), "layers").unwrap();

        let overrides = json!({"geom": {"type": "line"}});
        let spec = import_config(&path, overrides.as_object()).unwrap();
        assert_eq!(spec.geoms.len(), 1);
        assert_eq!(spec.geoms[0].kind, "line");
    }

    #[test]
    fn test_import_missing_file() {
        let err = import_config(Path::new("/nonexistent/plot.json"), None).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_import_rejects_non_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.json");
        fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            import_config(&path, None).unwrap_err(),
            ConfigError::NotAnObject(_)
        ));
    }
}
