/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements the column store: named data columns sharing one row count, plus definitions.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # store
//!
//! Named columns of test or simulation data. Every data column has the same
//! number of rows `n`; the first column stored fixes `n`. Vector-valued
//! outputs are stored as an `m x n` matrix, one length-`m` column per row.

use std::{borrow::Cow, collections::HashMap};

use faer::Mat;
use serde::{Deserialize, Serialize};

use crate::{
    error::{DataKitError, Result},
    value::Value,
};

/// The element type of a [`Column`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Float,
    Int,
    Text,
    Vector,
}

/// One named array of data.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Float(Vec<f64>),
    Int(Vec<i64>),
    Text(Vec<String>),
    /// `m x n` matrix; column `i` is the output vector of row `i`.
    Vector(Mat<f64>),
}

impl Column {
    /// Number of rows.
    pub fn len(&self) -> usize {
        match self {
            Column::Float(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::Text(v) => v.len(),
            Column::Vector(m) => m.ncols(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Column::Float(_) => ColumnKind::Float,
            Column::Int(_) => ColumnKind::Int,
            Column::Text(_) => ColumnKind::Text,
            Column::Vector(_) => ColumnKind::Vector,
        }
    }

    /// Output vector length, or `0` for non-vector columns.
    pub fn output_dim(&self) -> usize {
        match self {
            Column::Vector(m) => m.nrows(),
            _ => 0,
        }
    }

    /// Numeric view of a scalar column. Integer columns are converted.
    pub fn as_f64(&self) -> Option<Cow<'_, [f64]>> {
        match self {
            Column::Float(v) => Some(Cow::Borrowed(v.as_slice())),
            Column::Int(v) => Some(Cow::Owned(v.iter().map(|&x| x as f64).collect())),
            _ => None,
        }
    }

    /// The output of row `i`; `None` for text columns or rows out of range.
    pub fn value(&self, i: usize) -> Option<Value> {
        if i >= self.len() {
            return None;
        }
        match self {
            Column::Float(v) => Some(Value::Scalar(v[i])),
            Column::Int(v) => Some(Value::Scalar(v[i] as f64)),
            Column::Text(_) => None,
            Column::Vector(m) => Some(Value::Vector(m.col(i).iter().copied().collect())),
        }
    }

    /// Copies the given rows into a new column.
    pub fn select(&self, rows: &[usize]) -> Column {
        match self {
            Column::Float(v) => Column::Float(rows.iter().map(|&i| v[i]).collect()),
            Column::Int(v) => Column::Int(rows.iter().map(|&i| v[i]).collect()),
            Column::Text(v) => Column::Text(rows.iter().map(|i| v[*i].clone()).collect()),
            Column::Vector(m) => Column::Vector(Mat::from_fn(m.nrows(), rows.len(), |r, c| {
                m[(r, rows[c])]
            })),
        }
    }
}

impl From<Vec<f64>> for Column {
    fn from(v: Vec<f64>) -> Self {
        Column::Float(v)
    }
}

impl From<Vec<i64>> for Column {
    fn from(v: Vec<i64>) -> Self {
        Column::Int(v)
    }
}

impl From<Vec<String>> for Column {
    fn from(v: Vec<String>) -> Self {
        Column::Text(v)
    }
}

impl From<Mat<f64>> for Column {
    fn from(m: Mat<f64>) -> Self {
        Column::Vector(m)
    }
}

/// Per-column metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Definition {
    /// `0` for one scalar per row, otherwise the length of each row's output vector.
    pub output_dim: usize,

    /// Names of the auxiliary arguments that index a vector output.
    pub output_xargs: Vec<String>,

    pub description: Option<String>,
}

/// Named data columns sharing a common row count.
#[derive(Debug, Clone, Default)]
pub struct ColumnStore {
    cols: Vec<String>,
    data: HashMap<String, Column>,
    defns: HashMap<String, Definition>,
    nrows: Option<usize>,
}

impl ColumnStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from `(name, column)` pairs, checking lengths.
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Column)>,
        S: Into<String>,
    {
        let mut store = Self::new();
        for (name, col) in columns {
            store.set(name, col)?;
        }
        Ok(store)
    }

    /// Number of rows shared by every column (`0` for an empty store).
    pub fn nrows(&self) -> usize {
        self.nrows.unwrap_or(0)
    }

    /// Column names in insertion order.
    pub fn cols(&self) -> &[String] {
        &self.cols
    }

    pub fn has(&self, col: &str) -> bool {
        self.data.contains_key(col)
    }

    pub fn try_get(&self, col: &str) -> Option<&Column> {
        self.data.get(col)
    }

    pub fn get(&self, col: &str) -> Result<&Column> {
        self.data
            .get(col)
            .ok_or_else(|| DataKitError::missing_column(col))
    }

    /// Stores `column` under `col`. The first column fixes the row count; later
    /// columns must match it.
    pub fn set(&mut self, col: impl Into<String>, column: Column) -> Result<()> {
        let col = col.into();
        let n = column.len();
        match self.nrows {
            Some(expected) if expected != n && !(self.data.len() == 1 && self.has(&col)) => {
                return Err(DataKitError::ShapeMismatch {
                    context: format!("column '{}'", col),
                    expected: vec![expected],
                    found: vec![n],
                });
            }
            _ => self.nrows = Some(n),
        }
        if !self.data.contains_key(&col) {
            self.cols.push(col.clone());
        }
        self.data.insert(col, column);
        Ok(())
    }

    /// Removes a column, returning it if present.
    pub fn remove(&mut self, col: &str) -> Option<Column> {
        let column = self.data.remove(col)?;
        self.cols.retain(|c| c != col);
        if self.data.is_empty() {
            self.nrows = None;
        }
        Some(column)
    }

    /// The column as floats; fails for absent or non-numeric columns.
    pub fn float(&self, col: &str) -> Result<Cow<'_, [f64]>> {
        self.get(col)?
            .as_f64()
            .ok_or_else(|| DataKitError::invalid(col, "column is not numeric"))
    }

    /// The stored definition, or a default one reflecting the column's shape.
    pub fn definition(&self, col: &str) -> Definition {
        match self.defns.get(col) {
            Some(defn) => defn.clone(),
            None => Definition {
                output_dim: self.data.get(col).map_or(0, Column::output_dim),
                ..Definition::default()
            },
        }
    }

    pub fn set_definition(&mut self, col: impl Into<String>, defn: Definition) {
        self.defns.insert(col.into(), defn);
    }

    pub fn output_dim(&self, col: &str) -> usize {
        self.definition(col).output_dim
    }

    pub fn set_output_dim(&mut self, col: &str, ndim: usize) {
        self.defns.entry(col.to_string()).or_default().output_dim = ndim;
    }

    pub fn output_xargs(&self, col: &str) -> Vec<String> {
        self.definition(col).output_xargs
    }
}
