/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines evaluation methods, per-column response declarations and argument metadata.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # metadata
//!
//! Everything a [`DataKit`](crate::DataKit) knows about how to evaluate its
//! columns: the declared method and argument list of each response, argument
//! aliases, converters and defaults, and links to uncertainty columns.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    str::FromStr,
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{
    args::{ArgValue, ArgView},
    config::{EvalOptions, RbfParams},
    dispatch::Evaluator,
    error::{DataKitError, Result},
    value::Value,
    DataKit,
};

/// The fixed set of evaluation methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvalMethod {
    Exact,
    Function,
    Multilinear,
    MultilinearSchedule,
    Nearest,
    Rbf,
    RbfLinear,
    RbfMap,
}

/// Legacy and shorthand method names.
const METHOD_ALIASES: [(&str, EvalMethod); 11] = [
    ("fn", EvalMethod::Function),
    ("func", EvalMethod::Function),
    ("lin-rbf", EvalMethod::RbfLinear),
    ("linear-rbf", EvalMethod::RbfLinear),
    ("linear", EvalMethod::Multilinear),
    ("linear-schedule", EvalMethod::MultilinearSchedule),
    ("map-rbf", EvalMethod::RbfMap),
    ("rbf-global", EvalMethod::Rbf),
    ("rbf-schedule", EvalMethod::RbfMap),
    ("rbf0", EvalMethod::Rbf),
    ("rbf1", EvalMethod::RbfMap),
];

impl EvalMethod {
    pub const ALL: [EvalMethod; 8] = [
        EvalMethod::Exact,
        EvalMethod::Function,
        EvalMethod::Multilinear,
        EvalMethod::MultilinearSchedule,
        EvalMethod::Nearest,
        EvalMethod::Rbf,
        EvalMethod::RbfLinear,
        EvalMethod::RbfMap,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EvalMethod::Exact => "exact",
            EvalMethod::Function => "function",
            EvalMethod::Multilinear => "multilinear",
            EvalMethod::MultilinearSchedule => "multilinear-schedule",
            EvalMethod::Nearest => "nearest",
            EvalMethod::Rbf => "rbf",
            EvalMethod::RbfLinear => "rbf-linear",
            EvalMethod::RbfMap => "rbf-map",
        }
    }

    /// Whether the method can evaluate vector-valued columns.
    pub fn supports_vector(&self) -> bool {
        !self.is_rbf()
    }

    pub fn is_rbf(&self) -> bool {
        matches!(self, EvalMethod::Rbf | EvalMethod::RbfLinear | EvalMethod::RbfMap)
    }

    /// Names of the methods available for columns with output dimension `ndim`.
    pub fn valid_names(ndim: usize) -> Vec<&'static str> {
        EvalMethod::ALL
            .iter()
            .filter(|m| ndim == 0 || m.supports_vector())
            .map(EvalMethod::name)
            .collect()
    }

    /// Canonical form of a method name: lower case, `_` replaced by `-`, legacy
    /// names mapped to their current method.
    pub fn normalize_name(name: &str) -> String {
        let key = name.trim().to_lowercase().replace('_', "-");
        METHOD_ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map_or(key, |(_, m)| m.name().to_string())
    }

    /// Parses `name` and checks it is available for output dimension `ndim`.
    pub fn parse(name: &str, ndim: usize) -> Result<Self> {
        let key = Self::normalize_name(name);
        EvalMethod::ALL
            .into_iter()
            .find(|m| m.name() == key && (ndim == 0 || m.supports_vector()))
            .ok_or_else(|| DataKitError::InvalidMethod {
                method: name.to_string(),
                ndim,
                valid: Self::valid_names(ndim),
            })
    }
}

impl fmt::Display for EvalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EvalMethod {
    type Err = DataKitError;

    fn from_str(s: &str) -> Result<Self> {
        EvalMethod::parse(s, 0)
    }
}

/// Derives an argument value from the other inputs of a call (or from the
/// store, when evaluating over stored rows).
pub trait Converter: Send + Sync {
    fn convert(&self, view: &ArgView<'_>) -> Option<ArgValue>;
}

impl<F> Converter for F
where
    F: Fn(&ArgView<'_>) -> Option<ArgValue> + Send + Sync,
{
    fn convert(&self, view: &ArgView<'_>) -> Option<ArgValue> {
        self(view)
    }
}

/// A user function backing the `function` method. Receives the kit and the
/// resolved coordinates of one lookup point.
pub trait EvalFunction: Send + Sync {
    fn call(&self, kit: &DataKit, x: &[f64]) -> Result<Value>;
}

impl<F> EvalFunction for F
where
    F: Fn(&DataKit, &[f64]) -> Result<Value> + Send + Sync,
{
    fn call(&self, kit: &DataKit, x: &[f64]) -> Result<Value> {
        self(kit, x)
    }
}

/// Lifecycle of a column with respect to evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    /// No method; only direct access.
    Undeclared,
    /// Method, arguments and options are fixed.
    Declared,
    /// An RBF method whose interpolants have been built.
    Fitted,
}

/// Request to declare how a column is evaluated.
///
/// ```
/// use surfdb::Declaration;
///
/// let decl = Declaration::new("linear", ["mach", "alpha"]).alias("aoa", "alpha");
/// assert_eq!(decl.args, vec!["mach", "alpha"]);
/// ```
#[derive(Clone)]
pub struct Declaration {
    pub method: String,
    pub args: Vec<String>,

    /// Alternate keyword name mapped to canonical argument name.
    pub aliases: BTreeMap<String, String>,
    pub options: EvalOptions,

    /// Output dimension; `None` keeps the column's current definition.
    pub output_dim: Option<usize>,
    pub function: Option<Arc<dyn EvalFunction>>,
    pub rbf: RbfParams,
}

impl Declaration {
    pub fn new<I, S>(method: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Declaration {
            method: method.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            aliases: BTreeMap::new(),
            options: EvalOptions::default(),
            output_dim: None,
            function: None,
            rbf: RbfParams::default(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>, arg: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), arg.into());
        self
    }

    pub fn options(mut self, options: EvalOptions) -> Self {
        self.options = options;
        self
    }

    pub fn output_dim(mut self, ndim: usize) -> Self {
        self.output_dim = Some(ndim);
        self
    }

    pub fn function(mut self, function: impl EvalFunction + 'static) -> Self {
        self.function = Some(Arc::new(function));
        self
    }

    pub fn rbf(mut self, params: RbfParams) -> Self {
        self.rbf = params;
        self
    }
}

impl fmt::Debug for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Declaration")
            .field("method", &self.method)
            .field("args", &self.args)
            .field("aliases", &self.aliases)
            .field("options", &self.options)
            .field("output_dim", &self.output_dim)
            .field("function", &self.function.is_some())
            .field("rbf", &self.rbf)
            .finish()
    }
}

/// A validated declaration, with its evaluator resolved.
#[derive(Clone)]
pub struct ResponseDef {
    pub method: EvalMethod,
    pub args: Vec<String>,
    pub aliases: BTreeMap<String, String>,
    pub options: EvalOptions,
    pub output_dim: usize,
    pub function: Option<Arc<dyn EvalFunction>>,
    pub rbf: RbfParams,
    pub(crate) evaluator: Evaluator,
}

impl fmt::Debug for ResponseDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseDef")
            .field("method", &self.method)
            .field("args", &self.args)
            .field("aliases", &self.aliases)
            .field("output_dim", &self.output_dim)
            .finish_non_exhaustive()
    }
}

/// Per-column evaluation metadata owned by a [`DataKit`].
#[derive(Clone, Default)]
pub struct Metadata {
    responses: HashMap<String, ResponseDef>,
    default_response: Option<ResponseDef>,
    converters: HashMap<String, Arc<dyn Converter>>,
    arg_defaults: HashMap<String, ArgValue>,
    uq_cols: HashMap<String, Vec<String>>,
}

impl Metadata {
    /// The declaration of `col`, falling back to the kit-wide default declaration.
    pub fn response(&self, col: &str) -> Option<&ResponseDef> {
        self.responses.get(col).or(self.default_response.as_ref())
    }

    /// Only an explicit declaration of `col`.
    pub fn explicit_response(&self, col: &str) -> Option<&ResponseDef> {
        self.responses.get(col)
    }

    pub(crate) fn insert_response(&mut self, col: &str, def: ResponseDef) {
        self.responses.insert(col.to_string(), def);
    }

    pub(crate) fn set_default_response(&mut self, def: ResponseDef) {
        self.default_response = Some(def);
    }

    pub fn declared_cols(&self) -> Vec<&str> {
        let mut cols: Vec<&str> = self.responses.keys().map(String::as_str).collect();
        cols.sort_unstable();
        cols
    }

    pub fn eval_args(&self, col: &str) -> Option<&[String]> {
        self.response(col).map(|d| d.args.as_slice())
    }

    pub fn eval_method(&self, col: &str) -> Option<EvalMethod> {
        self.response(col).map(|d| d.method)
    }

    pub fn aliases(&self, col: &str) -> Option<&BTreeMap<String, String>> {
        self.response(col).map(|d| &d.aliases)
    }

    pub fn set_converter(&mut self, arg: impl Into<String>, converter: impl Converter + 'static) {
        self.converters.insert(arg.into(), Arc::new(converter));
    }

    pub fn converter(&self, arg: &str) -> Option<&Arc<dyn Converter>> {
        self.converters.get(arg)
    }

    pub fn set_arg_default(&mut self, arg: impl Into<String>, value: impl Into<ArgValue>) {
        self.arg_defaults.insert(arg.into(), value.into());
    }

    pub fn arg_default(&self, arg: &str) -> Option<&ArgValue> {
        self.arg_defaults.get(arg)
    }

    /// Links `col` to the columns holding its uncertainty.
    pub fn set_uq_cols<I, S>(&mut self, col: impl Into<String>, uq_cols: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uq_cols
            .insert(col.into(), uq_cols.into_iter().map(Into::into).collect());
    }

    pub fn uq_cols(&self, col: &str) -> &[String] {
        self.uq_cols.get(col).map_or(&[], Vec::as_slice)
    }
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut converters: Vec<&String> = self.converters.keys().collect();
        converters.sort_unstable();
        f.debug_struct("Metadata")
            .field("responses", &self.responses)
            .field("default_response", &self.default_response)
            .field("converters", &converters)
            .field("arg_defaults", &self.arg_defaults)
            .field("uq_cols", &self.uq_cols)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equator::assert;

    #[test]
    fn method_aliases_normalize() {
        assert!("linear".parse::<EvalMethod>().unwrap() == EvalMethod::Multilinear);
        assert!("Linear_Schedule".parse::<EvalMethod>().unwrap() == EvalMethod::MultilinearSchedule);
        assert!("rbf_linear".parse::<EvalMethod>().unwrap() == EvalMethod::RbfLinear);
        assert!("rbf1".parse::<EvalMethod>().unwrap() == EvalMethod::RbfMap);
        assert!("rbf-schedule".parse::<EvalMethod>().unwrap() == EvalMethod::RbfMap);
        assert!("rbf0".parse::<EvalMethod>().unwrap() == EvalMethod::Rbf);
        assert!("func".parse::<EvalMethod>().unwrap() == EvalMethod::Function);
        for m in EvalMethod::ALL {
            assert!(m.name().parse::<EvalMethod>().unwrap() == m);
        }
    }

    #[test]
    fn vector_outputs_use_reduced_table() {
        assert!(EvalMethod::parse("nearest", 3).unwrap() == EvalMethod::Nearest);
        let err = EvalMethod::parse("rbf", 3).unwrap_err();
        match err {
            DataKitError::InvalidMethod { ndim, valid, .. } => {
                assert!(ndim == 3);
                assert!(valid == vec!["exact", "function", "multilinear", "multilinear-schedule", "nearest"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unknown_method_is_rejected() {
        assert!(matches!(
            "spline".parse::<EvalMethod>(),
            Err(DataKitError::InvalidMethod { .. })
        ));
    }

    #[test]
    fn argument_metadata() {
        let mut meta = Metadata::default();
        meta.set_arg_default("beta", 0.0);
        meta.set_uq_cols("CN", ["UCN"]);
        meta.set_converter("q", |view: &ArgView<'_>| view.get("qbar"));

        assert!(meta.arg_default("beta") == Some(&ArgValue::Scalar(0.0)));
        assert!(meta.uq_cols("CN").to_vec() == vec!["UCN".to_string()]);
        assert!(meta.uq_cols("CA").is_empty());

        let kw: BTreeMap<String, ArgValue> = [("qbar".to_string(), ArgValue::Scalar(2.5))].into();
        let q = meta.converter("q").unwrap().convert(&ArgView::new(&kw, None));
        assert!(q == Some(ArgValue::Scalar(2.5)));
    }
}
