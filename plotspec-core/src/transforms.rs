//! Transform Pipeline - ordered reshaping before plotting
//!
//! Steps run strictly in list order. The first failing step aborts the run
//! and is reported with its 1-based position; no partial result escapes.

use std::collections::HashSet;

use indexmap::IndexMap;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace};

use crate::data::{Column, DataError, DataSet, Scalar, ScalarKey};
use crate::expr::{parse_expr, ExprError};

#[derive(Debug, Clone, Error, PartialEq)]
#[error("Transform {step_index} ({step_kind}) failed: {cause}")]
pub struct TransformError {
    pub step_index: usize,
    pub step_kind: &'static str,
    pub cause: TransformCause,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransformCause {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Expr(#[from] ExprError),

    #[error("Filter expression must produce booleans, got {0} at row {1}")]
    NonBooleanFilter(&'static str, usize),

    #[error("Cannot compute {function} of column '{column}': found {found} values")]
    NonNumeric {
        column: String,
        function: &'static str,
        found: &'static str,
    },

    #[error("Got {flags} ascending flags for {columns} sort columns")]
    SortOrderMismatch { columns: usize, flags: usize },

    #[error("Pivot values {first} and {second} both become column '{name}'")]
    PivotNameCollision {
        name: String,
        first: String,
        second: String,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// One value or a list of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone> OneOrMany<T> {
    pub fn to_vec(&self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v.clone()],
            OneOrMany::Many(vs) => vs.clone(),
        }
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(value: T) -> Self {
        OneOrMany::One(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggFunc {
    Sum,
    Mean,
    Median,
    Min,
    Max,
    Count,
    Std,
    Var,
}

impl AggFunc {
    pub fn name(self) -> &'static str {
        match self {
            AggFunc::Sum => "sum",
            AggFunc::Mean => "mean",
            AggFunc::Median => "median",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
            AggFunc::Count => "count",
            AggFunc::Std => "std",
            AggFunc::Var => "var",
        }
    }

    /// Aggregate the non-missing values of `column`.
    ///
    /// `min`/`max` order any comparable kind; the rest need numbers.
    pub fn apply(self, column: &str, values: &[&Scalar]) -> Result<Scalar, TransformCause> {
        let present: Vec<&Scalar> = values.iter().copied().filter(|v| !v.is_missing()).collect();

        match self {
            AggFunc::Count => return Ok(Scalar::Number(present.len() as f64)),
            AggFunc::Min | AggFunc::Max => {
                let pick = present.into_iter().reduce(|a, b| {
                    let ord = a.total_cmp(b);
                    match (self, ord) {
                        (AggFunc::Min, std::cmp::Ordering::Greater) => b,
                        (AggFunc::Max, std::cmp::Ordering::Less) => b,
                        _ => a,
                    }
                });
                return Ok(pick.cloned().unwrap_or_default());
            }
            _ => {}
        }

        let mut numbers = Vec::with_capacity(present.len());
        for v in present {
            match v {
                Scalar::Number(n) => numbers.push(*n),
                other => {
                    return Err(TransformCause::NonNumeric {
                        column: column.to_string(),
                        function: self.name(),
                        found: other.kind_name(),
                    })
                }
            }
        }
        Ok(reduce_numbers(self, &numbers))
    }
}

fn reduce_numbers(func: AggFunc, numbers: &[f64]) -> Scalar {
    let n = numbers.len();
    match func {
        AggFunc::Sum => Scalar::Number(numbers.iter().sum()),
        AggFunc::Mean if n > 0 => Scalar::number(numbers.iter().sum::<f64>() / n as f64),
        AggFunc::Median if n > 0 => {
            let mut sorted = numbers.to_vec();
            sorted.sort_by(f64::total_cmp);
            let mid = n / 2;
            if n % 2 == 0 {
                Scalar::number((sorted[mid - 1] + sorted[mid]) / 2.0)
            } else {
                Scalar::number(sorted[mid])
            }
        }
        AggFunc::Var | AggFunc::Std if n > 1 => {
            let mean = numbers.iter().sum::<f64>() / n as f64;
            let var = numbers.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            Scalar::number(if func == AggFunc::Std { var.sqrt() } else { var })
        }
        AggFunc::Min => extreme(numbers, f64::min),
        AggFunc::Max => extreme(numbers, f64::max),
        AggFunc::Count => Scalar::Number(n as f64),
        _ => Scalar::Missing,
    }
}

fn extreme(numbers: &[f64], pick: fn(f64, f64) -> f64) -> Scalar {
    numbers.iter().copied().reduce(pick).map_or(Scalar::Missing, Scalar::number)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortOrder {
    All(bool),
    PerColumn(Vec<bool>),
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::All(true)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropHow {
    #[default]
    Any,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMethod {
    #[serde(alias = "ffill", alias = "pad")]
    Forward,
    #[serde(alias = "bfill", alias = "backfill")]
    Backward,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FillValues {
    PerColumn(IndexMap<String, Value>),
    Scalar(Value),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollingFunc {
    #[default]
    Mean,
    Sum,
    Min,
    Max,
    Std,
}

impl RollingFunc {
    pub fn name(self) -> &'static str {
        match self {
            RollingFunc::Mean => "mean",
            RollingFunc::Sum => "sum",
            RollingFunc::Min => "min",
            RollingFunc::Max => "max",
            RollingFunc::Std => "std",
        }
    }

    fn reduce(self, window: &[f64]) -> Scalar {
        let agg = match self {
            RollingFunc::Mean => AggFunc::Mean,
            RollingFunc::Sum => AggFunc::Sum,
            RollingFunc::Min => AggFunc::Min,
            RollingFunc::Max => AggFunc::Max,
            RollingFunc::Std => AggFunc::Std,
        };
        reduce_numbers(agg, window)
    }
}

fn default_random_state() -> u64 {
    42
}

fn default_agg() -> AggFunc {
    AggFunc::Mean
}

/// A single reshaping step, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformStep {
    Filter {
        #[serde(alias = "expr")]
        filter_expr: String,
    },
    GroupSummarize {
        group_by: OneOrMany<String>,
        aggregations: IndexMap<String, OneOrMany<AggFunc>>,
    },
    Sort {
        sort_by: OneOrMany<String>,
        #[serde(default)]
        ascending: SortOrder,
    },
    Select {
        columns: Vec<String>,
    },
    Rename {
        #[serde(alias = "map")]
        rename_map: IndexMap<String, String>,
    },
    Mutate {
        mutations: IndexMap<String, String>,
    },
    DropNa {
        #[serde(default)]
        columns: Option<Vec<String>>,
        #[serde(default)]
        how: DropHow,
    },
    FillNa {
        #[serde(default)]
        fill_values: Option<FillValues>,
        #[serde(default)]
        method: Option<FillMethod>,
    },
    Sample {
        #[serde(default)]
        n: Option<usize>,
        #[serde(default)]
        frac: Option<f64>,
        #[serde(default = "default_random_state")]
        random_state: u64,
    },
    Unique {
        #[serde(default)]
        columns: Option<Vec<String>>,
    },
    Rolling {
        column: String,
        window: usize,
        #[serde(default)]
        function: RollingFunc,
        #[serde(default)]
        new_column: Option<String>,
    },
    Pivot {
        index: String,
        columns: String,
        values: String,
        #[serde(default = "default_agg")]
        aggfunc: AggFunc,
    },
}

impl TransformStep {
    pub fn kind(&self) -> &'static str {
        match self {
            TransformStep::Filter { .. } => "filter",
            TransformStep::GroupSummarize { .. } => "group_summarize",
            TransformStep::Sort { .. } => "sort",
            TransformStep::Select { .. } => "select",
            TransformStep::Rename { .. } => "rename",
            TransformStep::Mutate { .. } => "mutate",
            TransformStep::DropNa { .. } => "drop_na",
            TransformStep::FillNa { .. } => "fill_na",
            TransformStep::Sample { .. } => "sample",
            TransformStep::Unique { .. } => "unique",
            TransformStep::Rolling { .. } => "rolling",
            TransformStep::Pivot { .. } => "pivot",
        }
    }

    /// Run this step alone.
    pub fn apply(&self, data: &DataSet) -> Result<DataSet, TransformCause> {
        match self {
            TransformStep::Filter { filter_expr } => filter(data, filter_expr),
            TransformStep::GroupSummarize {
                group_by,
                aggregations,
            } => group_summarize(data, &group_by.to_vec(), aggregations),
            TransformStep::Sort { sort_by, ascending } => sort(data, &sort_by.to_vec(), ascending),
            TransformStep::Select { columns } => select(data, columns),
            TransformStep::Rename { rename_map } => rename(data, rename_map),
            TransformStep::Mutate { mutations } => mutate(data, mutations),
            TransformStep::DropNa { columns, how } => drop_na(data, columns.as_deref(), *how),
            TransformStep::FillNa {
                fill_values,
                method,
            } => fill_na(data, fill_values.as_ref(), *method),
            TransformStep::Sample {
                n,
                frac,
                random_state,
            } => sample(data, *n, *frac, *random_state),
            TransformStep::Unique { columns } => unique(data, columns.as_deref()),
            TransformStep::Rolling {
                column,
                window,
                function,
                new_column,
            } => rolling(data, column, *window, *function, new_column.as_deref()),
            TransformStep::Pivot {
                index,
                columns,
                values,
                aggfunc,
            } => pivot(data, index, columns, values, *aggfunc),
        }
    }
}

/// An immutable, ordered list of steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransformPipeline {
    steps: Vec<TransformStep>,
}

impl TransformPipeline {
    pub fn new(steps: Vec<TransformStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[TransformStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn apply(&self, data: &DataSet) -> Result<DataSet, TransformError> {
        apply_transforms(data, &self.steps)
    }
}

/// Apply `steps` in order, failing on the first step that errors.
pub fn apply_transforms(
    data: &DataSet,
    steps: &[TransformStep],
) -> Result<DataSet, TransformError> {
    debug!(steps = steps.len(), rows = data.n_rows(), "applying transforms");

    let mut current = data.clone();
    for (i, step) in steps.iter().enumerate() {
        current = step.apply(&current).map_err(|cause| TransformError {
            step_index: i + 1,
            step_kind: step.kind(),
            cause,
        })?;
        trace!(
            step = i + 1,
            kind = step.kind(),
            rows = current.n_rows(),
            cols = current.n_cols(),
            "transform step done"
        );
    }
    Ok(current)
}

fn column_indices(data: &DataSet, names: &[String]) -> Result<Vec<usize>, DataError> {
    names.iter().map(|n| data.column_index(n)).collect()
}

pub fn filter(data: &DataSet, expr: &str) -> Result<DataSet, TransformCause> {
    let mask = parse_expr(expr)?.evaluate(data)?;
    let mut keep = Vec::new();
    for (row, v) in mask.iter().enumerate() {
        match v {
            Scalar::Bool(true) => keep.push(row),
            Scalar::Bool(false) | Scalar::Missing => {}
            other => return Err(TransformCause::NonBooleanFilter(other.kind_name(), row)),
        }
    }
    Ok(data.take_rows(&keep))
}

/// Groups come out in first-seen key order. Rows with a missing key are dropped.
pub fn group_summarize(
    data: &DataSet,
    group_by: &[String],
    aggregations: &IndexMap<String, OneOrMany<AggFunc>>,
) -> Result<DataSet, TransformCause> {
    if group_by.is_empty() {
        return Err(TransformCause::InvalidParameter(
            "group_by needs at least one column".into(),
        ));
    }
    let key_cols = column_indices(data, group_by)?;

    let mut groups: IndexMap<Vec<ScalarKey>, Vec<usize>> = IndexMap::new();
    for row in 0..data.n_rows() {
        let key = data.row_key(row, &key_cols);
        if key.contains(&ScalarKey::Missing) {
            continue;
        }
        groups.entry(key).or_default().push(row);
    }

    let mut columns: Vec<Column> = key_cols
        .iter()
        .map(|&c| {
            let values = groups.values().map(|rows| data.value(rows[0], c).clone()).collect();
            Column::new(data.columns()[c].name.clone(), values)
        })
        .collect();

    for (name, funcs) in aggregations {
        let source = data.require_column(name)?;
        let funcs = funcs.to_vec();
        for func in &funcs {
            let out_name = if funcs.len() == 1 {
                name.clone()
            } else {
                format!("{}_{}", name, func.name())
            };
            let values = groups
                .values()
                .map(|rows| {
                    let cells: Vec<&Scalar> = rows.iter().map(|&r| &source.values[r]).collect();
                    func.apply(name, &cells)
                })
                .collect::<Result<Vec<_>, _>>()?;
            columns.push(Column::new(out_name, values));
        }
    }

    Ok(DataSet::from_columns(columns)?)
}

pub fn sort(
    data: &DataSet,
    sort_by: &[String],
    ascending: &SortOrder,
) -> Result<DataSet, TransformCause> {
    let key_cols = column_indices(data, sort_by)?;
    let flags = match ascending {
        SortOrder::All(asc) => vec![*asc; key_cols.len()],
        SortOrder::PerColumn(flags) if flags.len() == key_cols.len() => flags.clone(),
        SortOrder::PerColumn(flags) => {
            return Err(TransformCause::SortOrderMismatch {
                columns: key_cols.len(),
                flags: flags.len(),
            })
        }
    };

    let mut order: Vec<usize> = (0..data.n_rows()).collect();
    // Vec::sort_by is stable
    order.sort_by(|&a, &b| {
        for (&c, &asc) in key_cols.iter().zip(&flags) {
            let (x, y) = (data.value(a, c), data.value(b, c));
            let ord = match (x.is_missing(), y.is_missing()) {
                (true, true) => std::cmp::Ordering::Equal,
                (true, false) => std::cmp::Ordering::Greater,
                (false, true) => std::cmp::Ordering::Less,
                _ if asc => x.total_cmp(y),
                _ => y.total_cmp(x),
            };
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    });
    Ok(data.take_rows(&order))
}

pub fn select(data: &DataSet, columns: &[String]) -> Result<DataSet, TransformCause> {
    let picked = column_indices(data, columns)?;
    Ok(data.project(&picked)?)
}

pub fn rename(
    data: &DataSet,
    rename_map: &IndexMap<String, String>,
) -> Result<DataSet, TransformCause> {
    let columns = data
        .columns()
        .iter()
        .map(|c| {
            let name = rename_map.get(&c.name).cloned().unwrap_or_else(|| c.name.clone());
            Column::new(name, c.values.clone())
        })
        .collect();
    Ok(DataSet::from_columns(columns)?)
}

pub fn mutate(
    data: &DataSet,
    mutations: &IndexMap<String, String>,
) -> Result<DataSet, TransformCause> {
    let mut out = data.clone();
    for (name, expr) in mutations {
        let values = parse_expr(expr)?.evaluate(&out)?;
        out.set_column(name, values)?;
    }
    Ok(out)
}

pub fn drop_na(
    data: &DataSet,
    columns: Option<&[String]>,
    how: DropHow,
) -> Result<DataSet, TransformCause> {
    let considered = match columns {
        Some(names) => column_indices(data, names)?,
        None => (0..data.n_cols()).collect(),
    };
    if considered.is_empty() {
        return Ok(data.clone());
    }

    let keep: Vec<usize> = (0..data.n_rows())
        .filter(|&row| {
            let mut missing = considered.iter().map(|&c| data.value(row, c).is_missing());
            match how {
                DropHow::Any => !missing.any(|m| m),
                DropHow::All => !missing.all(|m| m),
            }
        })
        .collect();
    Ok(data.take_rows(&keep))
}

pub fn fill_na(
    data: &DataSet,
    fill_values: Option<&FillValues>,
    method: Option<FillMethod>,
) -> Result<DataSet, TransformCause> {
    let mut out = data.clone();

    if let Some(method) = method {
        for column in data.columns() {
            let mut values = column.values.clone();
            let mut carry = Scalar::Missing;
            let positions: Box<dyn Iterator<Item = usize>> = match method {
                FillMethod::Forward => Box::new(0..values.len()),
                FillMethod::Backward => Box::new((0..values.len()).rev()),
            };
            for i in positions {
                if values[i].is_missing() {
                    values[i] = carry.clone();
                } else {
                    carry = values[i].clone();
                }
            }
            out.set_column(&column.name, values)?;
        }
        return Ok(out);
    }

    match fill_values {
        Some(FillValues::Scalar(v)) => {
            let fill = Scalar::from_json(v);
            for column in data.columns() {
                out.set_column(&column.name, fill_column(&column.values, &fill))?;
            }
        }
        Some(FillValues::PerColumn(map)) => {
            for (name, v) in map {
                let column = data.require_column(name)?;
                out.set_column(name, fill_column(&column.values, &Scalar::from_json(v)))?;
            }
        }
        None => {
            return Err(TransformCause::InvalidParameter(
                "fill_na needs fill_values or method".into(),
            ))
        }
    }
    Ok(out)
}

fn fill_column(values: &[Scalar], fill: &Scalar) -> Vec<Scalar> {
    values
        .iter()
        .map(|v| if v.is_missing() { fill.clone() } else { v.clone() })
        .collect()
}

/// Draw rows without replacement. Output order is draw order.
pub fn sample(
    data: &DataSet,
    n: Option<usize>,
    frac: Option<f64>,
    random_state: u64,
) -> Result<DataSet, TransformCause> {
    let rows = data.n_rows();
    let count = match (n, frac) {
        (Some(n), _) => n.min(rows),
        (None, Some(f)) if (0.0..=1.0).contains(&f) => (f * rows as f64).round_ties_even() as usize,
        (None, Some(f)) => {
            return Err(TransformCause::InvalidParameter(format!(
                "frac must be within [0, 1], got {}",
                f
            )))
        }
        (None, None) => {
            return Err(TransformCause::InvalidParameter(
                "sample needs either 'n' or 'frac'".into(),
            ))
        }
    };

    let mut rng = StdRng::seed_from_u64(random_state);
    let picked = rand::seq::index::sample(&mut rng, rows, count).into_vec();
    Ok(data.take_rows(&picked))
}

pub fn unique(data: &DataSet, columns: Option<&[String]>) -> Result<DataSet, TransformCause> {
    let considered = match columns {
        Some(names) => column_indices(data, names)?,
        None => (0..data.n_cols()).collect(),
    };
    let mut seen = HashSet::new();
    let keep: Vec<usize> = (0..data.n_rows())
        .filter(|&row| seen.insert(data.row_key(row, &considered)))
        .collect();
    Ok(data.take_rows(&keep))
}

/// Trailing window ending at each row; rows before the first full window are missing.
pub fn rolling(
    data: &DataSet,
    column: &str,
    window: usize,
    function: RollingFunc,
    new_column: Option<&str>,
) -> Result<DataSet, TransformCause> {
    if window == 0 {
        return Err(TransformCause::InvalidParameter("window must be at least 1".into()));
    }
    let source = data.require_column(column)?;

    let mut numbers = Vec::with_capacity(source.values.len());
    for v in &source.values {
        match v {
            Scalar::Missing => numbers.push(None),
            Scalar::Number(n) => numbers.push(Some(*n)),
            other => {
                return Err(TransformCause::NonNumeric {
                    column: column.to_string(),
                    function: function.name(),
                    found: other.kind_name(),
                })
            }
        }
    }

    let values = (0..numbers.len())
        .map(|end| {
            if end + 1 < window {
                return Scalar::Missing;
            }
            let slice: Option<Vec<f64>> = numbers[end + 1 - window..=end].iter().copied().collect();
            slice.map_or(Scalar::Missing, |w| function.reduce(&w))
        })
        .collect();

    let name = new_column
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}_rolling_{}", column, function.name()));
    let mut out = data.clone();
    out.set_column(&name, values)?;
    Ok(out)
}

/// Long to wide. Index rows and new columns come out in ascending value order.
/// Rows whose index or column key is missing are dropped.
pub fn pivot(
    data: &DataSet,
    index: &str,
    columns: &str,
    values: &str,
    aggfunc: AggFunc,
) -> Result<DataSet, TransformCause> {
    let index_col = data.require_column(index)?;
    let columns_col = data.require_column(columns)?;
    let values_col = data.require_column(values)?;

    let kept: Vec<usize> = (0..data.n_rows())
        .filter(|&row| !index_col.values[row].is_missing() && !columns_col.values[row].is_missing())
        .collect();

    let distinct = |col: &Column| {
        let mut seen: IndexMap<ScalarKey, Scalar> = IndexMap::new();
        for &row in &kept {
            let v = &col.values[row];
            seen.entry(v.key()).or_insert_with(|| v.clone());
        }
        let mut out: Vec<(ScalarKey, Scalar)> = seen.into_iter().collect();
        out.sort_by(|a, b| a.1.total_cmp(&b.1));
        out
    };
    let row_keys = distinct(index_col);
    let col_keys = distinct(columns_col);

    let mut cells: IndexMap<(ScalarKey, ScalarKey), Vec<&Scalar>> = IndexMap::new();
    for &row in &kept {
        cells
            .entry((index_col.values[row].key(), columns_col.values[row].key()))
            .or_default()
            .push(&values_col.values[row]);
    }

    let mut out_columns = vec![Column::new(
        index,
        row_keys.iter().map(|(_, v)| v.clone()).collect(),
    )];
    // None marks the index column itself
    let mut names: IndexMap<String, Option<&Scalar>> = IndexMap::new();
    names.insert(index.to_string(), None);
    for (col_key, col_value) in &col_keys {
        let name = col_value.to_string();
        if let Some(prev) = names.insert(name.clone(), Some(col_value)) {
            let first = match prev {
                Some(value) => describe_pivot_value(value),
                None => format!("index '{}'", index),
            };
            return Err(TransformCause::PivotNameCollision {
                name,
                first,
                second: describe_pivot_value(col_value),
            });
        }
        let cells = row_keys
            .iter()
            .map(|(row_key, _)| match cells.get(&(row_key.clone(), col_key.clone())) {
                Some(group) => aggfunc.apply(values, group),
                None => Ok(Scalar::Missing),
            })
            .collect::<Result<Vec<_>, _>>()?;
        out_columns.push(Column::new(name, cells));
    }
    Ok(DataSet::from_columns(out_columns)?)
}

fn describe_pivot_value(value: &Scalar) -> String {
    format!("{} {}", value.kind_name(), value.to_json())
}
