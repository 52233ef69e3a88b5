//! Tabular dataset passed between ingestion, data sources and estimators.
//!
//! A [`Dataset`] is an ordered list of rows, each mapping a column name to a
//! [`Value`]. It serializes as a JSON array of records.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// One cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Missing value.
    Null,
    /// Boolean, treated as 0/1 when used numerically.
    Bool(bool),
    /// Numeric value. NaN is treated as missing.
    Number(f64),
    /// Free text. Numeric-looking text is accepted where a number is expected.
    Text(String),
}

/// Text tokens that denote a missing value.
pub fn is_null_token(s: &str) -> bool {
    let t = s.trim();
    t.is_empty()
        || t.eq_ignore_ascii_case("nan")
        || t.eq_ignore_ascii_case("null")
        || t.eq_ignore_ascii_case("na")
        || t.eq_ignore_ascii_case("none")
}

impl Value {
    /// Whether the cell is missing (`Null`, NaN, or a null-like token).
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(_) => false,
            Value::Number(v) => v.is_nan(),
            Value::Text(s) => is_null_token(s),
        }
    }

    /// Numeric reading of the cell.
    ///
    /// `Ok(None)` for missing values, `Err(())` for text that is not a number.
    #[allow(clippy::result_unit_err)]
    pub fn to_f64(&self) -> Result<Option<f64>, ()> {
        if self.is_null() {
            return Ok(None);
        }
        match self {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(if *b { 1.0 } else { 0.0 })),
            Value::Number(v) if v.is_finite() => Ok(Some(*v)),
            Value::Number(_) => Ok(None),
            Value::Text(s) => match s.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(Some(v)),
                Ok(_) => Ok(None),
                Err(_) => Err(()),
            },
        }
    }

    /// Canonical text of the cell when used as a panel key.
    ///
    /// Integral numbers render without a fractional part so that `2001` and
    /// `2001.0` map to the same key.
    pub fn key_string(&self) -> Option<String> {
        if self.is_null() {
            return None;
        }
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(v) if v.fract() == 0.0 && v.abs() < 1e15 => {
                Some(format!("{}", *v as i64))
            }
            Value::Number(v) => Some(v.to_string()),
            Value::Text(s) => Some(s.trim().to_string()),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(v as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A single record.
pub type Row = BTreeMap<String, Value>;

static NULL: Value = Value::Null;

/// Ordered collection of rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    rows: Vec<Row>,
}

impl Dataset {
    /// Wrap an existing list of rows.
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Build a dataset column-wise. Columns shorter than the longest are padded with nulls.
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, Vec<Value>)>) -> Self {
        let columns: Vec<(String, Vec<Value>)> =
            columns.into_iter().map(|(name, values)| (name.into(), values)).collect();
        let n = columns.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
        let rows = (0..n)
            .map(|i| {
                columns
                    .iter()
                    .map(|(name, values)| {
                        (name.clone(), values.get(i).cloned().unwrap_or(Value::Null))
                    })
                    .collect()
            })
            .collect();
        Self { rows }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Append a row.
    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// Keep only rows matching `f`.
    pub fn retain<F: FnMut(&Row) -> bool>(&mut self, f: F) {
        self.rows.retain(f);
    }

    /// Union of column names over all rows, sorted.
    pub fn columns(&self) -> Vec<String> {
        let set: BTreeSet<&String> = self.rows.iter().flat_map(|r| r.keys()).collect();
        set.into_iter().cloned().collect()
    }

    /// Whether any row carries `name`.
    pub fn has_column(&self, name: &str) -> bool {
        self.rows.iter().any(|r| r.contains_key(name))
    }

    /// Cells of column `name`, with `Null` for rows lacking the key.
    pub fn column<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.rows.iter().map(move |r| r.get(name).unwrap_or(&NULL))
    }
}

impl FromIterator<Row> for Dataset {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        Self { rows: iter.into_iter().collect() }
    }
}
