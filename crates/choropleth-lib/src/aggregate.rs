//! Data join and aggregation
//!
//! Rows are grouped by the string form of their join field and each group is reduced
//! to one scalar. Results are always recomputed from scratch.

use crate::feature::properties_from_json;
use crate::{MapError, Result, Scalar};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// One tabular row: column → value
pub type TableRow = BTreeMap<String, Scalar>;

/// Rows plus their column list, as handed over by the data store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<TableRow>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<TableRow>) -> Self {
        Self { columns, rows }
    }

    /// Build a table, listing columns in order of first appearance
    ///
    /// Rows are maps sorted by column name, so columns new to the same row come
    /// alphabetically. [`Table::from_json`] keeps the source object order instead.
    pub fn from_rows(rows: Vec<TableRow>) -> Self {
        let mut seen = HashSet::new();
        let mut columns = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if seen.insert(key.as_str()) {
                    columns.push(key.clone());
                }
            }
        }
        Self { columns, rows }
    }

    /// Build a table from a JSON array of row objects
    ///
    /// Columns follow the key order of the objects as written; keys holding only
    /// nulls or nested values never become columns.
    pub fn from_json(value: &Value) -> Result<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| MapError::InvalidTable("expected an array of row objects".into()))?;

        let mut seen = HashSet::new();
        let mut columns = Vec::new();
        let mut rows = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let object = item
                .as_object()
                .ok_or_else(|| MapError::InvalidTable(format!("row {i} is not an object")))?;
            let row = properties_from_json(object);
            for key in object.keys() {
                if row.contains_key(key) && seen.insert(key.clone()) {
                    columns.push(key.clone());
                }
            }
            rows.push(row);
        }
        Ok(Self { columns, rows })
    }

    #[inline]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[inline]
    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Columns holding at least one numeric value
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|column| {
                self.rows
                    .iter()
                    .any(|row| row.get(*column).and_then(Scalar::as_number).is_some())
            })
            .map(String::as_str)
            .collect()
    }
}

/// Reduction applied to each join group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Aggregator {
    #[default]
    Sum,
    Average,
    /// Rows in the group, whether or not the value is usable
    Count,
    Min,
    Max,
    /// Rows whose value is present and not blank
    CountNonEmpty,
}

impl Aggregator {
    pub const ALL: [Aggregator; 6] = [
        Aggregator::Sum,
        Aggregator::Average,
        Aggregator::Count,
        Aggregator::Min,
        Aggregator::Max,
        Aggregator::CountNonEmpty,
    ];

    /// Human readable name
    pub fn label(&self) -> &'static str {
        match self {
            Aggregator::Sum => "Sum",
            Aggregator::Average => "Average",
            Aggregator::Count => "Count",
            Aggregator::Min => "Min",
            Aggregator::Max => "Max",
            Aggregator::CountNonEmpty => "Count (non-empty)",
        }
    }

    /// Whether the reduction is computed from numeric values
    pub fn needs_numbers(&self) -> bool {
        matches!(
            self,
            Aggregator::Sum | Aggregator::Average | Aggregator::Min | Aggregator::Max
        )
    }
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Aggregator::Sum => "sum",
            Aggregator::Average => "average",
            Aggregator::Count => "count",
            Aggregator::Min => "min",
            Aggregator::Max => "max",
            Aggregator::CountNonEmpty => "countNonEmpty",
        })
    }
}

impl FromStr for Aggregator {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "sum" => Ok(Aggregator::Sum),
            "average" | "avg" | "mean" => Ok(Aggregator::Average),
            "count" => Ok(Aggregator::Count),
            "min" => Ok(Aggregator::Min),
            "max" => Ok(Aggregator::Max),
            "countnonempty" => Ok(Aggregator::CountNonEmpty),
            _ => Err(MapError::UnknownAggregator(s.to_string())),
        }
    }
}

/// Which rows join to which features and how they are reduced
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JoinSpec {
    /// Column of the rows, and property of the features, holding the join key
    pub join_field: String,
    /// Column holding the value to reduce
    pub value_field: String,
    pub aggregator: Aggregator,
}

impl JoinSpec {
    pub fn new(
        join_field: impl Into<String>,
        value_field: impl Into<String>,
        aggregator: Aggregator,
    ) -> Self {
        Self {
            join_field: join_field.into(),
            value_field: value_field.into(),
            aggregator,
        }
    }

    /// Both fields are set
    pub fn is_complete(&self) -> bool {
        !self.join_field.is_empty() && !self.value_field.is_empty()
    }
}

/// Inclusive range of the aggregated scalars
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

/// Per-key scalars and their global range
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationResult {
    values: HashMap<String, f64>,
    range: ValueRange,
}

impl AggregationResult {
    /// Scalar for a join key
    #[inline]
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    #[inline]
    pub fn range(&self) -> ValueRange {
        self.range
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always `false`: empty results are never constructed
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Running state of one join group
#[derive(Debug, Clone, Copy)]
struct Group {
    rows: usize,
    non_empty: usize,
    numeric: usize,
    sum: f64,
    min: f64,
    max: f64,
}

impl Default for Group {
    fn default() -> Self {
        Self {
            rows: 0,
            non_empty: 0,
            numeric: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl Group {
    fn push(&mut self, value: Option<&Scalar>) {
        self.rows += 1;
        let Some(value) = value else {
            return;
        };
        if !value.is_blank() {
            self.non_empty += 1;
        }
        if let Some(n) = value.as_number() {
            self.numeric += 1;
            self.sum += n;
            self.min = self.min.min(n);
            self.max = self.max.max(n);
        }
    }

    fn reduce(&self, aggregator: Aggregator) -> Option<f64> {
        let has_numbers = self.numeric > 0;
        match aggregator {
            Aggregator::Sum => Some(self.sum),
            Aggregator::Average => has_numbers.then(|| self.sum / self.numeric as f64),
            Aggregator::Count => Some(self.rows as f64),
            Aggregator::CountNonEmpty => Some(self.non_empty as f64),
            Aggregator::Min => has_numbers.then_some(self.min),
            Aggregator::Max => has_numbers.then_some(self.max),
        }
    }
}

/// Group `rows` by `join_field` and reduce `value_field` per group
///
/// Rows without the join field are skipped. Returns `None` when either field is
/// empty, when a numeric aggregator saw no numeric value at all, or when no group
/// produced a scalar.
pub fn aggregate(
    rows: &[TableRow],
    join_field: &str,
    value_field: &str,
    aggregator: Aggregator,
) -> Option<AggregationResult> {
    #[cfg(feature = "profiling")]
    profiling::scope!("aggregate");

    if join_field.is_empty() || value_field.is_empty() {
        return None;
    }

    let mut groups: HashMap<String, Group> = HashMap::new();
    let mut skipped = 0usize;
    for row in rows {
        let Some(key) = row.get(join_field) else {
            skipped += 1;
            continue;
        };
        groups
            .entry(key.to_string())
            .or_default()
            .push(row.get(value_field));
    }

    if aggregator.needs_numbers() && groups.values().all(|g| g.numeric == 0) {
        tracing::debug!(
            "No numeric '{}' values among {} rows, nothing to color",
            value_field,
            rows.len()
        );
        return None;
    }

    let values: HashMap<String, f64> = groups
        .into_iter()
        .filter_map(|(key, group)| group.reduce(aggregator).map(|v| (key, v)))
        .collect();
    if values.is_empty() {
        return None;
    }

    let range = values.values().fold(
        ValueRange {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        },
        |range, &v| ValueRange {
            min: range.min.min(v),
            max: range.max.max(v),
        },
    );

    tracing::debug!(
        "Aggregated {} rows into {} keys with {} ({} rows without '{}'), range {} - {}",
        rows.len(),
        values.len(),
        aggregator,
        skipped,
        join_field,
        range.min,
        range.max
    );

    Some(AggregationResult { values, range })
}

/// Rows whose join field stringifies to `key`
pub fn rows_for_key<'a>(rows: &'a [TableRow], join_field: &str, key: &str) -> Vec<&'a TableRow> {
    rows.iter()
        .filter(|row| {
            row.get(join_field)
                .is_some_and(|value| value.to_string() == key)
        })
        .collect()
}
