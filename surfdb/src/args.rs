/////////////////////////////////////////////////////////////////////////////////////////////
//
// Resolves evaluation call inputs into broadcast per-argument arrays.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # args
//!
//! A call names a column and supplies values positionally, by keyword, or not
//! at all. Each declared argument is resolved through a fixed chain:
//!
//! 1. the positional slot with the argument's index,
//! 2. a keyword with the argument's name (aliases are renamed before this step),
//! 3. a store column with that name, only in [`ResolveMode::FromStore`],
//! 4. a registered [`Converter`](crate::Converter),
//! 5. a registered default.
//!
//! The resolved values are then broadcast to a common shape by [`normalize_args`].

use std::collections::BTreeMap;

use crate::{
    error::{DataKitError, Result},
    metadata::Metadata,
    config::EvalOptions,
    store::{Column, ColumnStore},
};

/// A dense array of floats with an explicit shape (row-major).
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    values: Vec<f64>,
    shape: Vec<usize>,
}

impl Array {
    /// Creates an array, checking that `shape` covers `values`.
    pub fn new(values: Vec<f64>, shape: Vec<usize>) -> Result<Self> {
        let size: usize = shape.iter().product();
        if size != values.len() || shape.is_empty() {
            return Err(DataKitError::ShapeMismatch {
                context: "array construction".into(),
                expected: shape,
                found: vec![values.len()],
            });
        }
        Ok(Array { values, shape })
    }

    /// A one-dimensional array.
    pub fn from_vec(values: Vec<f64>) -> Self {
        let n = values.len();
        Array { values, shape: vec![n] }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

/// One input value of an evaluation call.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Scalar(f64),
    Array(Array),
    Text(String),
}

impl ArgValue {
    /// Number of elements (`1` for scalars and text).
    pub fn size(&self) -> usize {
        match self {
            ArgValue::Array(a) => a.len(),
            _ => 1,
        }
    }

    /// Number of dimensions (`0` for scalars and text).
    pub fn ndim(&self) -> usize {
        match self {
            ArgValue::Array(a) => a.ndim(),
            _ => 0,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ArgValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Flattened numeric values; `None` for text.
    pub fn to_vec(&self) -> Option<Vec<f64>> {
        match self {
            ArgValue::Scalar(v) => Some(vec![*v]),
            ArgValue::Array(a) => Some(a.values.clone()),
            ArgValue::Text(_) => None,
        }
    }

    /// Applies `f` elementwise, keeping the shape.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Option<ArgValue> {
        match self {
            ArgValue::Scalar(v) => Some(ArgValue::Scalar(f(*v))),
            ArgValue::Array(a) => Some(ArgValue::Array(Array {
                values: a.values.iter().map(|&v| f(v)).collect(),
                shape: a.shape.clone(),
            })),
            ArgValue::Text(_) => None,
        }
    }

    /// Combines two values elementwise, broadcasting a scalar against an array.
    /// Returns `None` for text or arrays of different shapes.
    pub fn map2(&self, other: &ArgValue, f: impl Fn(f64, f64) -> f64) -> Option<ArgValue> {
        match (self, other) {
            (ArgValue::Scalar(a), ArgValue::Scalar(b)) => Some(ArgValue::Scalar(f(*a, *b))),
            (ArgValue::Scalar(a), ArgValue::Array(_)) => other.map(|x| f(*a, x)),
            (ArgValue::Array(_), ArgValue::Scalar(b)) => self.map(|x| f(x, *b)),
            (ArgValue::Array(a), ArgValue::Array(b)) if a.shape == b.shape => {
                Some(ArgValue::Array(Array {
                    values: a.values.iter().zip(&b.values).map(|(&x, &y)| f(x, y)).collect(),
                    shape: a.shape.clone(),
                }))
            }
            _ => None,
        }
    }
}

impl From<f64> for ArgValue {
    fn from(v: f64) -> Self {
        ArgValue::Scalar(v)
    }
}

impl From<Vec<f64>> for ArgValue {
    fn from(v: Vec<f64>) -> Self {
        ArgValue::Array(Array::from_vec(v))
    }
}

impl From<&[f64]> for ArgValue {
    fn from(v: &[f64]) -> Self {
        ArgValue::Array(Array::from_vec(v.to_vec()))
    }
}

impl From<Array> for ArgValue {
    fn from(a: Array) -> Self {
        ArgValue::Array(a)
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::Text(s.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        ArgValue::Text(s)
    }
}

/// The inputs of one evaluation call.
///
/// ```
/// use surfdb::CallArgs;
///
/// let call = CallArgs::new().arg(0.8).kw("alpha", vec![0.0, 2.0]);
/// assert_eq!(call.positional.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub positional: Vec<ArgValue>,
    pub keywords: BTreeMap<String, ArgValue>,

    /// Replaces the declared evaluation options for this call.
    pub options: Option<EvalOptions>,

    /// Whether unsupplied arguments may be taken from same-named store columns.
    pub mode: ResolveMode,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// A call whose first positional value is the column name.
    pub fn for_col(col: &str) -> Self {
        Self::new().arg(col)
    }

    pub fn arg(mut self, value: impl Into<ArgValue>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn kw(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.keywords.insert(name.into(), value.into());
        self
    }

    pub fn with_options(mut self, options: EvalOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Lets arguments missing from the call resolve to the stored column of
    /// the same name, evaluating at every stored row.
    pub fn derive_all(mut self) -> Self {
        self.mode = ResolveMode::FromStore;
        self
    }

    /// Renames keywords given under an alias to their canonical argument name.
    pub(crate) fn canonical_keywords(
        &self,
        aliases: &BTreeMap<String, String>,
    ) -> BTreeMap<String, ArgValue> {
        let mut out = BTreeMap::new();
        for (k, v) in &self.keywords {
            let name = aliases.get(k).unwrap_or(k);
            out.insert(name.clone(), v.clone());
        }
        out
    }
}

/// Splits the target column name off a call: the `coeff` or `col` keyword,
/// else the first positional value when it is text.
pub fn prep_colname(call: &CallArgs) -> Result<(String, CallArgs)> {
    let mut rest = call.clone();
    for key in ["coeff", "col"] {
        if let Some(ArgValue::Text(name)) = rest.keywords.get(key) {
            let name = name.clone();
            rest.keywords.remove(key);
            return Ok((name, rest));
        }
    }
    if let Some(ArgValue::Text(name)) = rest.positional.first() {
        let name = name.clone();
        rest.positional.remove(0);
        return Ok((name, rest));
    }
    Err(DataKitError::invalid("col", "column name must be a string"))
}

/// Read-only view handed to converters: the call's keywords, then optionally the
/// columns of the store.
#[derive(Debug, Clone, Copy)]
pub struct ArgView<'a> {
    keywords: &'a BTreeMap<String, ArgValue>,
    store: Option<&'a ColumnStore>,
}

impl<'a> ArgView<'a> {
    pub fn new(keywords: &'a BTreeMap<String, ArgValue>, store: Option<&'a ColumnStore>) -> Self {
        ArgView { keywords, store }
    }

    /// Looks `name` up among the keywords, then among numeric store columns.
    pub fn get(&self, name: &str) -> Option<ArgValue> {
        if let Some(v) = self.keywords.get(name) {
            return Some(v.clone());
        }
        let column = self.store?.try_get(name)?;
        match column {
            Column::Float(_) | Column::Int(_) => {
                column.as_f64().map(|v| ArgValue::from(v.into_owned()))
            }
            _ => None,
        }
    }

    pub fn keywords(&self) -> &BTreeMap<String, ArgValue> {
        self.keywords
    }
}

/// Whether resolution may fall back to whole store columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolveMode {
    #[default]
    Explicit,
    FromStore,
}

/// Resolves the value of argument `i` (named `name`) of column `col`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn resolve_arg(
    store: &ColumnStore,
    meta: &Metadata,
    col: &str,
    i: usize,
    name: &str,
    positional: &[ArgValue],
    keywords: &BTreeMap<String, ArgValue>,
    mode: ResolveMode,
) -> Result<ArgValue> {
    if let Some(v) = positional.get(i) {
        return Ok(v.clone());
    }
    if let Some(v) = keywords.get(name) {
        return Ok(v.clone());
    }
    if mode == ResolveMode::FromStore {
        if let Some(column) = store.try_get(name) {
            if let Some(v) = column.as_f64() {
                return Ok(ArgValue::from(v.into_owned()));
            }
        }
    }
    if let Some(conv) = meta.converter(name) {
        let view_store = match mode {
            ResolveMode::FromStore => Some(store),
            ResolveMode::Explicit => None,
        };
        if let Some(v) = conv.convert(&ArgView::new(keywords, view_store)) {
            return Ok(v);
        }
        tracing::debug!(arg = name, col, "eval argument converter produced no value");
    }
    if let Some(v) = meta.arg_default(name) {
        return Ok(v.clone());
    }
    Err(DataKitError::MissingArgument {
        arg: name.to_string(),
        col: col.to_string(),
    })
}

/// Resolves every argument in `names` for a call to `col`.
pub(crate) fn resolve_args(
    store: &ColumnStore,
    meta: &Metadata,
    col: &str,
    names: &[String],
    positional: &[ArgValue],
    keywords: &BTreeMap<String, ArgValue>,
    mode: ResolveMode,
) -> Result<Vec<ArgValue>> {
    names
        .iter()
        .enumerate()
        .map(|(i, k)| resolve_arg(store, meta, col, i, k, positional, keywords, mode))
        .collect()
}

/// Arguments broadcast to a common shape.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedArgs {
    /// One flat array per argument, each of length [`NormalizedArgs::len`].
    pub columns: Vec<Vec<f64>>,

    /// Shape of the broadcast result; empty for a scalar call.
    pub shape: Vec<usize>,
}

impl NormalizedArgs {
    /// Number of lookup points.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }

    /// Coordinates of lookup point `j`.
    pub fn point(&self, j: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[j]).collect()
    }

    /// The broadcast values, reshaped back into call inputs.
    pub fn to_arg_values(&self) -> Vec<ArgValue> {
        self.columns
            .iter()
            .map(|c| match self.is_scalar() {
                true => ArgValue::Scalar(c[0]),
                false => ArgValue::Array(Array {
                    values: c.clone(),
                    shape: self.shape.clone(),
                }),
            })
            .collect()
    }
}

/// Broadcasts resolved argument values to a common shape.
///
/// The largest rank and size among the values set the output shape (taken from
/// the first value of largest size). Scalars are tiled to that size; any other
/// rank or size mismatch fails. With `asarray`, an all-scalar call becomes a
/// one-element array.
pub fn normalize_args(names: &[String], values: &[ArgValue], asarray: bool) -> Result<NormalizedArgs> {
    let nx = values.iter().map(ArgValue::size).max().unwrap_or(1);
    let nd = values.iter().map(ArgValue::ndim).max().unwrap_or(0);

    let mut shape: Vec<usize> = values
        .iter()
        .find(|v| v.size() == nx && v.ndim() == nd)
        .or_else(|| values.iter().find(|v| v.size() == nx))
        .and_then(|v| match v {
            ArgValue::Array(a) => Some(a.shape.clone()),
            _ => None,
        })
        .unwrap_or_default();

    if asarray && nd == 0 {
        shape = vec![1];
    }

    let mut columns = Vec::with_capacity(values.len());
    for (i, v) in values.iter().enumerate() {
        let name = names.get(i).map_or("?", String::as_str);
        let column = match v {
            ArgValue::Scalar(x) => match shape.is_empty() {
                true => vec![*x],
                false => vec![*x; nx],
            },
            ArgValue::Array(a) if a.ndim() != nd => {
                return Err(DataKitError::ShapeMismatch {
                    context: format!("cannot normalize {}D and {}D inputs ('{}')", a.ndim(), nd, name),
                    expected: shape,
                    found: a.shape.clone(),
                });
            }
            ArgValue::Array(a) if a.len() != nx => {
                return Err(DataKitError::ShapeMismatch {
                    context: format!("cannot normalize inputs of size {} and {} ('{}')", a.len(), nx, name),
                    expected: shape,
                    found: a.shape.clone(),
                });
            }
            ArgValue::Array(a) => a.values.clone(),
            ArgValue::Text(_) => {
                return Err(DataKitError::invalid(name, "text values cannot be broadcast"));
            }
        };
        columns.push(column);
    }

    Ok(NormalizedArgs { columns, shape })
}

#[cfg(test)]
mod tests {
    use super::*;
    use equator::assert;

    fn names(n: &[&str]) -> Vec<String> {
        n.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolution_sources_take_priority_in_order() {
        let store = ColumnStore::from_columns([("alpha", Column::Float(vec![1.0, 3.0]))]).unwrap();
        let mut meta = Metadata::default();
        meta.set_converter("alpha", |_: &ArgView<'_>| Some(ArgValue::from(4.0)));
        meta.set_arg_default("alpha", 5.0);

        let positional = [ArgValue::from(0.5)];
        let mut keywords = BTreeMap::new();
        keywords.insert("alpha".to_string(), ArgValue::from(2.0));
        let empty = BTreeMap::new();
        let from_store = ArgValue::from(vec![1.0, 3.0]);

        // (positional, keywords, mode, expected)
        let cases = [
            (&positional[..], &keywords, ResolveMode::FromStore, ArgValue::from(0.5)),
            (&[][..], &keywords, ResolveMode::FromStore, ArgValue::from(2.0)),
            (&[][..], &empty, ResolveMode::FromStore, from_store),
            (&[][..], &empty, ResolveMode::Explicit, ArgValue::from(4.0)),
        ];
        for (positional, keywords, mode, expected) in cases {
            let v = resolve_arg(&store, &meta, "CA", 0, "alpha", positional, keywords, mode).unwrap();
            assert!(v == expected);
        }

        let mut meta = Metadata::default();
        meta.set_arg_default("alpha", 5.0);
        let v = resolve_arg(&store, &meta, "CA", 0, "alpha", &[], &empty, ResolveMode::Explicit);
        assert!(v.unwrap() == ArgValue::from(5.0));

        let meta = Metadata::default();
        let err = resolve_arg(&store, &meta, "CA", 0, "alpha", &[], &empty, ResolveMode::Explicit)
            .unwrap_err();
        assert!(matches!(err, DataKitError::MissingArgument { .. }));
    }

    #[test]
    fn scalars_stay_scalar() {
        let n = normalize_args(&names(&["a", "b"]), &[1.0.into(), 2.0.into()], false).unwrap();
        assert!(n.is_scalar());
        assert!(n.len() == 1);
        assert!(n.point(0) == vec![1.0, 2.0]);

        let n = normalize_args(&names(&["a"]), &[1.0.into()], true).unwrap();
        assert!(n.shape == vec![1]);
    }

    #[test]
    fn scalars_are_tiled_to_array_size() {
        let n = normalize_args(
            &names(&["mach", "alpha"]),
            &[0.8.into(), vec![0.0, 2.0, 4.0].into()],
            false,
        )
        .unwrap();
        assert!(n.shape == vec![3]);
        assert!(n.columns[0] == vec![0.8, 0.8, 0.8]);
        assert!(n.point(2) == vec![0.8, 4.0]);
    }

    #[test]
    fn two_dimensional_shape_is_kept() {
        let grid = Array::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]).unwrap();
        let n = normalize_args(&names(&["a", "b"]), &[grid.into(), 0.5.into()], false).unwrap();
        assert!(n.shape == vec![2, 3]);
        assert!(n.len() == 6);
    }

    #[test]
    fn mismatched_inputs_fail() {
        let err = normalize_args(
            &names(&["a", "b"]),
            &[vec![1.0, 2.0].into(), vec![1.0, 2.0, 3.0].into()],
            false,
        )
        .unwrap_err();
        assert!(matches!(err, DataKitError::ShapeMismatch { .. }));

        let grid = Array::new(vec![0.0; 4], vec![2, 2]).unwrap();
        let err = normalize_args(
            &names(&["a", "b"]),
            &[grid.into(), vec![1.0, 2.0, 3.0, 4.0].into()],
            false,
        )
        .unwrap_err();
        assert!(matches!(err, DataKitError::ShapeMismatch { .. }));

        let err = normalize_args(&names(&["cfg"]), &["wing".into()], false).unwrap_err();
        assert!(matches!(err, DataKitError::InvalidArgument { .. }));
    }

    #[test]
    fn normalize_is_idempotent() {
        let cases: Vec<Vec<ArgValue>> = vec![
            vec![1.0.into(), 2.0.into()],
            vec![0.8.into(), vec![0.0, 2.0, 4.0].into()],
            vec![Array::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]).unwrap().into(), 3.0.into()],
        ];
        for values in cases {
            let n = names(&["a", "b"]);
            let once = normalize_args(&n, &values, false).unwrap();
            let twice = normalize_args(&n, &once.to_arg_values(), false).unwrap();
            assert!(once == twice);
        }
    }

    #[test]
    fn column_name_from_keyword_or_first_positional() {
        let (col, rest) = prep_colname(&CallArgs::new().kw("col", "CA").arg(0.5)).unwrap();
        assert!(col == "CA");
        assert!(rest.positional.len() == 1);
        assert!(rest.keywords.is_empty());

        let (col, rest) = prep_colname(&CallArgs::for_col("CN").arg(0.5)).unwrap();
        assert!(col == "CN");
        assert!(rest.positional == vec![ArgValue::Scalar(0.5)]);

        assert!(prep_colname(&CallArgs::new().arg(0.5)).is_err());
    }

    #[test]
    fn map2_broadcasts_scalars() {
        let a: ArgValue = vec![1.0, 2.0].into();
        let b = ArgValue::Scalar(10.0);
        assert!(a.map2(&b, |x, y| x + y) == Some(vec![11.0, 12.0].into()));
        assert!(b.map2(&a, |x, y| x - y) == Some(vec![9.0, 8.0].into()));
        assert!(a.map2(&ArgValue::from(vec![1.0]), |x, y| x + y).is_none());
    }
}
