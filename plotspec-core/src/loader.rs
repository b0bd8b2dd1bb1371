//! Data loading boundary
//!
//! Only inline records are materialized here. File and URL sources belong
//! to an external loader plugged in through [`DataLoader`].

use thiserror::Error;
use tracing::trace;

use crate::data::{DataError, DataSet};
use crate::spec::{DataSource, SourceKind};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataLoadError {
    #[error("Inline data source requires 'data'")]
    MissingInlineData,

    #[error("{kind:?} data source requires 'path'")]
    MissingPath { kind: SourceKind },

    #[error("No loader available for {kind:?} source '{path}'")]
    Unsupported { kind: SourceKind, path: String },

    #[error("Invalid inline data: {0}")]
    Data(#[from] DataError),
}

pub trait DataLoader: Send + Sync {
    fn load(&self, source: &DataSource) -> Result<DataSet, DataLoadError>;
}

/// Loader for `inline` sources; rejects everything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineLoader;

impl DataLoader for InlineLoader {
    fn load(&self, source: &DataSource) -> Result<DataSet, DataLoadError> {
        match source.kind {
            SourceKind::Inline => {
                let records = source.data.as_deref().ok_or(DataLoadError::MissingInlineData)?;
                let data = DataSet::from_records(records)?;
                trace!(rows = data.n_rows(), cols = data.n_cols(), "loaded inline data");
                Ok(data)
            }
            kind => {
                let path = source
                    .path
                    .clone()
                    .ok_or(DataLoadError::MissingPath { kind })?;
                Err(DataLoadError::Unsupported { kind, path })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inline_loads() {
        let source = DataSource::inline(vec![json!({"x": 1, "y": 2}), json!({"x": 2, "y": 4})]);
        let data = InlineLoader.load(&source).unwrap();
        assert_eq!(data.n_rows(), 2);
        assert_eq!(data.column_names(), vec!["x", "y"]);
    }

    #[test]
    fn test_inline_without_data() {
        let mut source = DataSource::inline(vec![]);
        source.data = None;
        assert_eq!(InlineLoader.load(&source).unwrap_err(), DataLoadError::MissingInlineData);
    }

    #[test]
    fn test_inline_rejects_non_objects() {
        let source = DataSource::inline(vec![json!([1, 2])]);
        assert!(matches!(
            InlineLoader.load(&source).unwrap_err(),
            DataLoadError::Data(DataError::InvalidRecord { row: 0 })
        ));
    }

    #[test]
    fn test_file_source_is_external() {
        let err = InlineLoader.load(&DataSource::file("data.csv")).unwrap_err();
        assert_eq!(
            err,
            DataLoadError::Unsupported {
                kind: SourceKind::File,
                path: "data.csv".into()
            }
        );
    }
}
