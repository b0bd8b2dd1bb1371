//! DataSet - Column-Oriented Table
//!
//! Every transform step reads a DataSet and produces a new one.
//! Nothing here is shared mutably between steps.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::suggest::format_column_error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataError {
    #[error("{}", format_column_error(.column, .available))]
    ColumnNotFound { column: String, available: Vec<String> },

    #[error("Column '{column}' has {actual} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Duplicate column name: '{0}'")]
    DuplicateColumn(String),

    #[error("Row {row} is not a JSON object")]
    InvalidRecord { row: usize },
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Scalar {
    #[default]
    Missing,
    Bool(bool),
    Number(f64),
    Text(String),
    Temporal(Timestamp),
}

impl Scalar {
    pub fn number(value: f64) -> Self {
        if value.is_nan() {
            Scalar::Missing
        } else {
            Scalar::Number(value)
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Scalar::Text(value.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Scalar::Missing)
    }

    /// Numeric view; booleans count as 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Scalar::Missing => "missing",
            Scalar::Bool(_) => "boolean",
            Scalar::Number(_) => "numeric",
            Scalar::Text(_) => "text",
            Scalar::Temporal(_) => "temporal",
        }
    }

    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Scalar::Missing,
            Value::Bool(b) => Scalar::Bool(*b),
            Value::Number(n) => n.as_f64().map(Scalar::number).unwrap_or(Scalar::Missing),
            Value::String(s) => match Timestamp::parse(s) {
                Some(ts) => Scalar::Temporal(ts),
                None => Scalar::Text(s.clone()),
            },
            // Nested values are kept as their JSON text
            other => Scalar::Text(other.to_string()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Missing => Value::Null,
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 9.0e15 {
                    Value::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
            }
            Scalar::Text(s) => Value::String(s.clone()),
            Scalar::Temporal(ts) => Value::String(ts.as_str().to_string()),
        }
    }

    /// Total order over non-missing values of mixed kinds.
    ///
    /// Kinds rank bool < number < temporal < text; missing ranks after
    /// everything so callers can keep it last in either direction.
    pub fn total_cmp(&self, other: &Scalar) -> Ordering {
        match (self, other) {
            (Scalar::Missing, Scalar::Missing) => Ordering::Equal,
            (Scalar::Missing, _) => Ordering::Greater,
            (_, Scalar::Missing) => Ordering::Less,
            (Scalar::Bool(a), Scalar::Bool(b)) => a.cmp(b),
            (Scalar::Number(a), Scalar::Number(b)) => a.total_cmp(b),
            (Scalar::Temporal(a), Scalar::Temporal(b)) => a.at().cmp(&b.at()),
            (Scalar::Text(a), Scalar::Text(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Scalar::Bool(_) => 0,
            Scalar::Number(_) => 1,
            Scalar::Temporal(_) => 2,
            Scalar::Text(_) => 3,
            Scalar::Missing => 4,
        }
    }

    pub(crate) fn key(&self) -> ScalarKey {
        match self {
            Scalar::Missing => ScalarKey::Missing,
            Scalar::Bool(b) => ScalarKey::Bool(*b),
            // -0.0 and 0.0 group together
            Scalar::Number(n) => ScalarKey::Number((n + 0.0).to_bits()),
            Scalar::Text(s) => ScalarKey::Text(s.clone()),
            Scalar::Temporal(ts) => ScalarKey::Temporal(ts.at()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Missing => write!(f, "NA"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => write!(f, "{}", *n as i64),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Text(s) => write!(f, "{}", s),
            Scalar::Temporal(ts) => write!(f, "{}", ts.as_str()),
        }
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::number(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Number(value as f64)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

/// Hashable identity of a scalar, used for grouping and de-duplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ScalarKey {
    Missing,
    Bool(bool),
    Number(u64),
    Text(String),
    Temporal(NaiveDateTime),
}

pub fn parse_temporal(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    // Cheap reject before trying formats
    if s.len() < 10 || !s.as_bytes()[0].is_ascii_digit() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// A parsed date or datetime that keeps the text it was read from.
///
/// Ordering and equality use the UTC instant; output uses the original text.
#[derive(Debug, Clone)]
pub struct Timestamp {
    at: NaiveDateTime,
    text: String,
}

impl Timestamp {
    pub fn parse(s: &str) -> Option<Self> {
        parse_temporal(s).map(|at| Self {
            at,
            text: s.to_string(),
        })
    }

    pub fn at(&self) -> NaiveDateTime {
        self.at
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Boolean,
    Text,
    Temporal,
    Mixed,
    Empty,
}

impl ColumnKind {
    pub fn is_categorical(self) -> bool {
        matches!(
            self,
            ColumnKind::Boolean | ColumnKind::Text | ColumnKind::Mixed | ColumnKind::Empty
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Scalar>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Scalar>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn kind(&self) -> ColumnKind {
        let mut kind: Option<ColumnKind> = None;
        for value in &self.values {
            let k = match value {
                Scalar::Missing => continue,
                Scalar::Bool(_) => ColumnKind::Boolean,
                Scalar::Number(_) => ColumnKind::Numeric,
                Scalar::Text(_) => ColumnKind::Text,
                Scalar::Temporal(_) => ColumnKind::Temporal,
            };
            match kind {
                None => kind = Some(k),
                Some(prev) if prev != k => return ColumnKind::Mixed,
                _ => {}
            }
        }
        kind.unwrap_or(ColumnKind::Empty)
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_missing()).count()
    }
}

/// Shape summary used by the template advisor and previews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataProfile {
    pub rows: usize,
    pub columns: usize,
    pub numeric: usize,
    pub categorical: usize,
    pub temporal: usize,
    pub column_kinds: IndexMap<String, ColumnKind>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataSet {
    columns: Vec<Column>,
    rows: usize,
}

impl DataSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns(columns: Vec<Column>) -> Result<Self, DataError> {
        let mut data = DataSet::new();
        for column in columns {
            data.push_column(column)?;
        }
        Ok(data)
    }

    /// Build from an array of JSON objects. Column order follows first appearance.
    pub fn from_records(records: &[Value]) -> Result<Self, DataError> {
        let mut names: IndexMap<String, ()> = IndexMap::new();
        for (row, record) in records.iter().enumerate() {
            let obj = record.as_object().ok_or(DataError::InvalidRecord { row })?;
            for key in obj.keys() {
                names.entry(key.clone()).or_insert(());
            }
        }

        let columns = names
            .keys()
            .map(|name| {
                let values = records
                    .iter()
                    .map(|r| r.get(name).map(Scalar::from_json).unwrap_or_default())
                    .collect();
                Column::new(name.clone(), values)
            })
            .collect();

        let mut data = Self::from_columns(columns)?;
        data.rows = records.len();
        Ok(data)
    }

    pub fn to_records(&self) -> Vec<Value> {
        (0..self.rows)
            .map(|row| {
                let obj: Map<String, Value> = self
                    .columns
                    .iter()
                    .map(|c| (c.name.clone(), c.values[row].to_json()))
                    .collect();
                Value::Object(obj)
            })
            .collect()
    }

    pub fn n_rows(&self) -> usize {
        self.rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Result<usize, DataError> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| self.not_found(name))
    }

    pub fn require_column(&self, name: &str) -> Result<&Column, DataError> {
        self.column(name).ok_or_else(|| self.not_found(name))
    }

    pub fn not_found(&self, name: &str) -> DataError {
        DataError::ColumnNotFound {
            column: name.to_string(),
            available: self.column_names(),
        }
    }

    /// Append a new column. The first column fixes the row count.
    pub fn push_column(&mut self, column: Column) -> Result<(), DataError> {
        if self.has_column(&column.name) {
            return Err(DataError::DuplicateColumn(column.name));
        }
        if self.columns.is_empty() {
            self.rows = column.values.len();
        } else if column.values.len() != self.rows {
            return Err(DataError::LengthMismatch {
                column: column.name,
                expected: self.rows,
                actual: column.values.len(),
            });
        }
        self.columns.push(column);
        Ok(())
    }

    /// Overwrite an existing column in place, or append it.
    pub fn set_column(&mut self, name: &str, values: Vec<Scalar>) -> Result<(), DataError> {
        if values.len() != self.rows && !self.columns.is_empty() {
            return Err(DataError::LengthMismatch {
                column: name.to_string(),
                expected: self.rows,
                actual: values.len(),
            });
        }
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => self.push_column(Column::new(name, values))?,
        }
        Ok(())
    }

    /// New DataSet holding the given rows, in the given order.
    pub fn take_rows(&self, indices: &[usize]) -> DataSet {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let values = indices.iter().map(|&i| c.values[i].clone()).collect();
                Column::new(c.name.clone(), values)
            })
            .collect();
        DataSet {
            columns,
            rows: indices.len(),
        }
    }

    /// New DataSet holding the given columns, in the given order. Row count is kept.
    pub fn project(&self, column_indices: &[usize]) -> Result<DataSet, DataError> {
        let mut out = DataSet {
            columns: Vec::with_capacity(column_indices.len()),
            rows: self.rows,
        };
        for &c in column_indices {
            let column = self.columns[c].clone();
            if out.has_column(&column.name) {
                return Err(DataError::DuplicateColumn(column.name));
            }
            out.columns.push(column);
        }
        Ok(out)
    }

    pub fn head(&self, n: usize) -> DataSet {
        let indices: Vec<usize> = (0..n.min(self.rows)).collect();
        self.take_rows(&indices)
    }

    pub fn value(&self, row: usize, column: usize) -> &Scalar {
        &self.columns[column].values[row]
    }

    pub(crate) fn row_key(&self, row: usize, column_indices: &[usize]) -> Vec<ScalarKey> {
        column_indices
            .iter()
            .map(|&c| self.columns[c].values[row].key())
            .collect()
    }

    pub fn profile(&self) -> DataProfile {
        let column_kinds: IndexMap<String, ColumnKind> = self
            .columns
            .iter()
            .map(|c| (c.name.clone(), c.kind()))
            .collect();
        let count = |pred: fn(ColumnKind) -> bool| {
            column_kinds.values().filter(|k| pred(**k)).count()
        };

        DataProfile {
            rows: self.rows,
            columns: self.columns.len(),
            numeric: count(|k| k == ColumnKind::Numeric),
            categorical: count(ColumnKind::is_categorical),
            temporal: count(|k| k == ColumnKind::Temporal),
            column_kinds,
        }
    }
}
