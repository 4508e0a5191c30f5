/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements the DataKit response-surface database and its public operations.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

use std::{collections::BTreeMap, sync::Arc};

use faer::Mat;
use rayon::prelude::*;
use surfdb_rbf::{DirectRbfFitter, Interpolant, RbfFit};
use tracing::{debug, trace};

use crate::{
    args::{
        normalize_args, prep_colname, resolve_arg, resolve_args, ArgValue, ArgView, CallArgs,
        NormalizedArgs,
    },
    breakpoints::{Bracket, BreakpointTable, Breakpoints, FullFactorial},
    config::{
        BreakpointParams, EvalOptions, FindOptions, MatchMode, PairwiseOptions, RbfParams,
        RegularizeOptions, RowMask,
    },
    dispatch::evaluator_for,
    error::{DataKitError, Result},
    find::{find_rows, FindOutput, SearchArg},
    metadata::{Converter, Declaration, EvalMethod, Metadata, ResponseDef, ResponseState},
    progress::{report, ProgressMsg, ProgressSink},
    rbf::{self, RbfTable},
    stats,
    store::{Column, ColumnStore, Definition},
    value::{Evaluation, Value},
};

fn to_strings<I, S>(cols: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    cols.into_iter().map(Into::into).collect()
}

/// Stored rows matching a call, with the argument values at those rows.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedValues {
    /// Value of the column at each matched row.
    pub values: Vec<Value>,
    pub rows: Vec<usize>,
    /// Test points that found a match.
    pub found: Vec<usize>,
    /// Value of each declared argument at each matched row.
    pub args: BTreeMap<String, Vec<f64>>,
}

/// Builder for a [`DataKit`] with a custom RBF capability or progress sink.
pub struct DataKitBuilder {
    store: ColumnStore,
    fitter: Arc<dyn RbfFit>,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl DataKitBuilder {
    /// Replaces the default [`DirectRbfFitter`].
    pub fn fitter(mut self, fitter: Arc<dyn RbfFit>) -> Self {
        self.fitter = fitter;
        self
    }

    /// Attaches a sink for progress messages emitted while fitting.
    pub fn progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn build(self) -> DataKit {
        DataKit {
            store: self.store,
            meta: Metadata::default(),
            bkpts: BreakpointTable::new(),
            rbfs: RbfTable::default(),
            fitter: self.fitter,
            progress: self.progress,
        }
    }
}

/// An in-memory response-surface database.
///
/// A `DataKit` owns a [`ColumnStore`] of sampled conditions and responses, the
/// breakpoints derived from it, and a declaration per response column saying
/// how to evaluate it between (or at) the stored samples.
///
/// ```
/// use surfdb::{CallArgs, Column, ColumnStore, DataKit, Declaration};
///
/// let store = ColumnStore::from_columns([
///     ("mach", Column::Float(vec![0.5, 0.5, 1.0, 1.0])),
///     ("alpha", Column::Float(vec![0.0, 2.0, 0.0, 2.0])),
///     ("CN", Column::Float(vec![0.0, 0.2, 0.1, 0.4])),
/// ])
/// .unwrap();
///
/// let mut kit = DataKit::builder(store).build();
/// kit.get_bkpts(["mach", "alpha"], &surfdb::BreakpointParams::new(1, 1e-12)).unwrap();
/// kit.declare("CN", Declaration::new("linear", ["mach", "alpha"])).unwrap();
///
/// let cn = kit
///     .evaluate("CN", &CallArgs::new().kw("mach", 0.75).kw("alpha", 1.0))
///     .unwrap();
/// assert!((cn.scalar().unwrap() - 0.175).abs() < 1e-12);
/// ```
#[derive(Clone, Debug)]
pub struct DataKit {
    pub(crate) store: ColumnStore,
    pub(crate) meta: Metadata,
    pub(crate) bkpts: BreakpointTable,
    pub(crate) rbfs: RbfTable,
    fitter: Arc<dyn RbfFit>,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl Default for DataKit {
    fn default() -> Self {
        Self::new()
    }
}

impl DataKit {
    /// An empty kit using the default RBF capability.
    pub fn new() -> Self {
        Self::builder(ColumnStore::new()).build()
    }

    pub fn builder(store: ColumnStore) -> DataKitBuilder {
        DataKitBuilder {
            store,
            fitter: Arc::new(DirectRbfFitter),
            progress: None,
        }
    }

    // ----------------------------------------------------------------------
    // Column store
    // ----------------------------------------------------------------------

    pub fn store(&self) -> &ColumnStore {
        &self.store
    }

    pub fn cols(&self) -> &[String] {
        self.store.cols()
    }

    pub fn nrows(&self) -> usize {
        self.store.nrows()
    }

    pub fn has(&self, col: &str) -> bool {
        self.store.has(col)
    }

    pub fn get(&self, col: &str) -> Result<&Column> {
        self.store.get(col)
    }

    /// Stores a column, checking its length against the other columns.
    pub fn set(&mut self, col: impl Into<String>, column: impl Into<Column>) -> Result<()> {
        self.store.set(col, column.into())
    }

    pub fn definition(&self, col: &str) -> Definition {
        self.store.definition(col)
    }

    pub fn set_definition(&mut self, col: impl Into<String>, defn: Definition) {
        self.store.set_definition(col, defn);
    }

    /// Copies columns (and their definitions) from another kit; every column
    /// of `other` when `cols` is `None`.
    pub fn link_data(&mut self, other: &DataKit, cols: Option<&[String]>) -> Result<()> {
        let cols = cols.map_or_else(|| other.cols().to_vec(), <[String]>::to_vec);
        for col in &cols {
            let column = other.get(col)?.clone();
            self.store.set(col.clone(), column)?;
            self.store.set_definition(col.clone(), other.definition(col));
        }
        debug!(count = cols.len(), "linked columns");
        Ok(())
    }

    // ----------------------------------------------------------------------
    // Metadata
    // ----------------------------------------------------------------------

    pub fn metadata(&self) -> &Metadata {
        &self.meta
    }

    /// Registers a function deriving argument `arg` from other inputs.
    pub fn set_converter(&mut self, arg: impl Into<String>, converter: impl Converter + 'static) {
        self.meta.set_converter(arg, converter);
    }

    /// Registers the value used for `arg` when a call does not supply it.
    pub fn set_arg_default(&mut self, arg: impl Into<String>, value: impl Into<ArgValue>) {
        self.meta.set_arg_default(arg, value);
    }

    /// Links `col` to the columns describing its uncertainty.
    pub fn set_uq_cols<I, S>(&mut self, col: impl Into<String>, uq_cols: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta.set_uq_cols(col, uq_cols);
    }

    fn response(&self, col: &str) -> Result<&ResponseDef> {
        self.meta.response(col).ok_or_else(|| DataKitError::Undeclared {
            col: col.to_string(),
        })
    }

    fn response_def(&self, col: Option<&str>, decl: Declaration) -> Result<ResponseDef> {
        let ndim = match (decl.output_dim, col) {
            (Some(ndim), _) => ndim,
            (None, Some(col)) => self.store.output_dim(col),
            (None, None) => 0,
        };
        let method = EvalMethod::parse(&decl.method, ndim)?;

        if decl.args.is_empty() && method != EvalMethod::Function {
            return Err(DataKitError::invalid(
                col.unwrap_or("_"),
                format!("method '{}' needs an argument list", method),
            ));
        }
        if method == EvalMethod::Function && decl.function.is_none() {
            return Err(DataKitError::invalid(
                col.unwrap_or("_"),
                "method 'function' needs an evaluation function",
            ));
        }

        Ok(ResponseDef {
            method,
            args: decl.args,
            aliases: decl.aliases,
            options: decl.options,
            output_dim: ndim,
            function: decl.function,
            rbf: decl.rbf,
            evaluator: evaluator_for(method),
        })
    }

    /// Declares how `col` is evaluated.
    ///
    /// The method name is normalized and checked against the methods available
    /// for the column's output dimension. RBF methods build their interpolants
    /// here; the column is only marked fitted when every fit succeeds.
    pub fn declare(&mut self, col: &str, decl: Declaration) -> Result<()> {
        let explicit_dim = decl.output_dim;
        let def = self.response_def(Some(col), decl)?;

        match def.method {
            EvalMethod::Rbf => {
                let node = rbf::fit_global(
                    &self.store,
                    self.fitter.as_ref(),
                    col,
                    &def.args,
                    &def.rbf,
                    &self.progress,
                )?;
                self.rbfs.insert(col, node);
            }
            EvalMethod::RbfLinear | EvalMethod::RbfMap => {
                let node = rbf::fit_slices(
                    &self.store,
                    &self.bkpts,
                    self.fitter.as_ref(),
                    col,
                    &def.args,
                    &def.rbf,
                    &self.progress,
                )?;
                self.rbfs.insert(col, node);
            }
            _ => {
                self.rbfs.remove(col);
            }
        }

        if let Some(ndim) = explicit_dim {
            self.store.set_output_dim(col, ndim);
        }
        debug!(col, method = %def.method, args = ?def.args, "declared response");
        self.meta.insert_response(col, def);
        Ok(())
    }

    /// Declares several columns the same way.
    pub fn declare_all<I, S>(&mut self, cols: I, decl: &Declaration) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for col in cols {
            self.declare(col.as_ref(), decl.clone())?;
        }
        Ok(())
    }

    /// Declares the fallback used by every column without its own declaration.
    /// RBF methods are rejected since their fits belong to one column.
    pub fn declare_default(&mut self, decl: Declaration) -> Result<()> {
        let def = self.response_def(None, decl)?;
        if def.method.is_rbf() {
            return Err(DataKitError::invalid(
                "_",
                format!("method '{}' cannot be a default declaration", def.method),
            ));
        }
        debug!(method = %def.method, args = ?def.args, "declared default response");
        self.meta.set_default_response(def);
        Ok(())
    }

    pub fn response_state(&self, col: &str) -> ResponseState {
        match self.meta.response(col) {
            None => ResponseState::Undeclared,
            Some(def) if def.method.is_rbf() && self.rbfs.contains(col) => ResponseState::Fitted,
            Some(_) => ResponseState::Declared,
        }
    }

    // ----------------------------------------------------------------------
    // Evaluation
    // ----------------------------------------------------------------------

    fn normalized(&self, col: &str, def: &ResponseDef, call: &CallArgs) -> Result<NormalizedArgs> {
        let keywords = call.canonical_keywords(&def.aliases);
        let values = resolve_args(
            &self.store,
            &self.meta,
            col,
            &def.args,
            &call.positional,
            &keywords,
            call.mode,
        )?;
        normalize_args(&def.args, &values, false)
    }

    /// Evaluates a call whose column name is its first positional value or its
    /// `col`/`coeff` keyword.
    pub fn call(&self, call: &CallArgs) -> Result<Evaluation> {
        let (col, rest) = prep_colname(call)?;
        self.evaluate(&col, &rest)
    }

    /// Evaluates `col` at the (broadcast) inputs of `call`.
    ///
    /// Options given with the call replace the declared ones. A vectorized call
    /// fails on its first failing point.
    pub fn evaluate(&self, col: &str, call: &CallArgs) -> Result<Evaluation> {
        let def = self.response(col)?;
        let norm = self.normalized(col, def, call)?;
        let opts = call.options.as_ref().unwrap_or(&def.options);

        let values = (0..norm.len())
            .map(|j| {
                let x = norm.point(j);
                trace!(col, ?x, "evaluating point");
                (def.evaluator)(self, col, def, &x, opts)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Evaluation {
            values,
            shape: norm.shape,
        })
    }

    /// Evaluates `col` at every stored row, taking each argument missing from
    /// `call` from the store column of the same name.
    pub fn evaluate_all(&self, col: &str, call: &CallArgs) -> Result<Evaluation> {
        self.evaluate(col, &call.clone().derive_all())
    }

    /// The resolved, broadcast value of each declared argument of `col`.
    pub fn arg_value_dict(&self, col: &str, call: &CallArgs) -> Result<BTreeMap<String, ArgValue>> {
        let def = self.response(col)?;
        let norm = self.normalized(col, def, call)?;
        Ok(def.args.iter().cloned().zip(norm.to_arg_values()).collect())
    }

    /// Evaluates every uncertainty column linked to `col` at the inputs of
    /// `call`, feeding each one the subset of `col`'s arguments it declares.
    pub fn eval_uq(&self, col: &str, call: &CallArgs) -> Result<BTreeMap<String, Evaluation>> {
        let def = self.response(col)?;
        let values = self.normalized(col, def, call)?.to_arg_values();

        let mut out = BTreeMap::new();
        for uk in self.meta.uq_cols(col) {
            let udef = self.response(uk)?;
            let mut ucall = CallArgs {
                options: call.options.clone(),
                ..CallArgs::default()
            };
            for arg in &udef.args {
                let i = def.args.iter().position(|a| a == arg).ok_or_else(|| {
                    DataKitError::invalid(
                        uk.as_str(),
                        format!(
                            "UQ column '{}' is a function of '{}', but '{}' is not",
                            uk, arg, col
                        ),
                    )
                })?;
                ucall.positional.push(values[i].clone());
            }
            out.insert(uk.clone(), self.evaluate(uk, &ucall)?);
        }
        Ok(out)
    }

    /// Evaluates `col` from values given for the argument list `args`, which
    /// may belong to another column. `col`'s aliases bridge differing names.
    pub fn eval_from_arglist(&self, col: &str, args: &[String], call: &CallArgs) -> Result<Evaluation> {
        let values = resolve_args(
            &self.store,
            &self.meta,
            col,
            args,
            &call.positional,
            &call.keywords,
            call.mode,
        )?;
        let values = normalize_args(args, &values, false)?.to_arg_values();

        let def = self.response(col)?;
        let mut ucall = CallArgs {
            options: call.options.clone(),
            ..CallArgs::default()
        };
        for arg in &def.args {
            let i = args
                .iter()
                .position(|a| a == arg)
                .or_else(|| {
                    def.aliases
                        .iter()
                        .filter(|(_, canonical)| *canonical == arg)
                        .find_map(|(alias, _)| args.iter().position(|a| a == alias))
                })
                .ok_or_else(|| {
                    DataKitError::invalid(
                        col,
                        format!("'{}' is a function of '{}', not provided in argument list", col, arg),
                    )
                })?;
            ucall.positional.push(values[i].clone());
        }
        self.evaluate(col, &ucall)
    }

    /// Evaluates `col` at the argument values stored (or derived) at `rows`.
    pub fn eval_from_index(&self, col: &str, rows: &[usize]) -> Result<Evaluation> {
        let def = self.response(col)?;
        let keywords = BTreeMap::new();
        let mut call = CallArgs::new();
        for arg in &def.args {
            call = call.arg(self.get_xvals(arg, Some(rows), &keywords)?);
        }
        self.evaluate(col, &call)
    }

    /// Finds the stored rows matching the inputs of `call` on `col`'s declared
    /// arguments, and returns `col`'s values there.
    ///
    /// Stored values are returned directly; a column that is not stored (such
    /// as a `function` response) is evaluated at the matched arguments.
    pub fn eval_at_matches(&self, col: &str, call: &CallArgs) -> Result<MatchedValues> {
        let def = self.response(col)?;
        let opts = call.options.as_ref().unwrap_or(&def.options);
        let find_opts = FindOptions {
            tol: opts.tol,
            tols: opts.tols.clone(),
            ..FindOptions::default()
        };
        let keywords = call.canonical_keywords(&def.aliases);
        let found = self.find(
            &def.args,
            &CallArgs {
                positional: call.positional.clone(),
                keywords: keywords.clone(),
                options: None,
                mode: call.mode,
            },
            &find_opts,
        )?;
        let rows = found.rows.rows();

        let mut args = BTreeMap::new();
        for (i, k) in def.args.iter().enumerate() {
            let xk = match self.get_all_values(k) {
                Some(v) => rows.iter().map(|&r| v[r]).collect(),
                None => {
                    let v = resolve_arg(
                        &self.store,
                        &self.meta,
                        col,
                        i,
                        k,
                        &call.positional,
                        &keywords,
                        call.mode,
                    )?;
                    let x = v.as_scalar().ok_or_else(|| {
                        DataKitError::invalid(k.as_str(), "could not generate fixed scalar for test values")
                    })?;
                    vec![x; rows.len()]
                }
            };
            args.insert(k.clone(), xk);
        }

        let values = match self.store.try_get(col) {
            Some(column) => rows
                .iter()
                .map(|&r| {
                    column
                        .value(r)
                        .ok_or_else(|| DataKitError::invalid(col, "column has no numeric value to return"))
                })
                .collect::<Result<Vec<_>>>()?,
            None => {
                let mut ecall = CallArgs::new();
                for k in &def.args {
                    ecall = ecall.arg(args[k].clone());
                }
                self.evaluate(col, &ecall)?.values
            }
        };

        Ok(MatchedValues {
            values,
            rows,
            found: found.found,
            args,
        })
    }

    // ----------------------------------------------------------------------
    // Value access
    // ----------------------------------------------------------------------

    /// Every row's value of `k`: a numeric column, or a converter applied over
    /// the store. `None` when neither yields numbers.
    pub fn get_all_values(&self, k: &str) -> Option<Vec<f64>> {
        if let Some(column) = self.store.try_get(k) {
            return column.as_f64().map(|v| v.into_owned());
        }
        let keywords = BTreeMap::new();
        let view = ArgView::new(&keywords, Some(&self.store));
        self.meta.converter(k)?.convert(&view)?.to_vec()
    }

    /// Values of `k` at the rows selected by `mask`.
    pub fn get_values(&self, k: &str, mask: &RowMask) -> Result<Vec<f64>> {
        let values = self
            .get_all_values(k)
            .ok_or_else(|| DataKitError::missing_column(k))?;
        let rows = mask.resolve(values.len())?;
        Ok(rows.into_iter().map(|i| values[i]).collect())
    }

    /// Values of argument `k` taken from `keywords`, the store, or a converter
    /// applied over both, optionally restricted to `rows`. Keyword values are
    /// returned as given.
    pub fn get_xvals(&self, k: &str, rows: Option<&[usize]>, keywords: &BTreeMap<String, ArgValue>) -> Result<Vec<f64>> {
        if let Some(v) = keywords.get(k) {
            return v
                .to_vec()
                .ok_or_else(|| DataKitError::invalid(k, "value is not numeric"));
        }
        let values = match self.store.try_get(k) {
            Some(column) => column
                .as_f64()
                .map(|v| v.into_owned())
                .ok_or_else(|| DataKitError::invalid(k, "column is not numeric"))?,
            None => {
                let converter = self
                    .meta
                    .converter(k)
                    .ok_or_else(|| DataKitError::invalid(k, "no converter"))?;
                converter
                    .convert(&ArgView::new(keywords, Some(&self.store)))
                    .and_then(|v| v.to_vec())
                    .ok_or_else(|| DataKitError::invalid(k, "conversion function failed"))?
            }
        };
        match rows {
            Some(rows) if values.len() > 1 => rows
                .iter()
                .map(|&i| {
                    values.get(i).copied().ok_or_else(|| {
                        DataKitError::invalid(
                            k,
                            format!("cannot access element {} of array with length {}", i, values.len()),
                        )
                    })
                })
                .collect(),
            _ => Ok(values),
        }
    }

    // ----------------------------------------------------------------------
    // Breakpoints
    // ----------------------------------------------------------------------

    pub fn breakpoints(&self) -> &BreakpointTable {
        &self.bkpts
    }

    /// Replaces the breakpoints of `col`, e.g. with a grid chosen by hand.
    pub fn set_bkpts(&mut self, col: impl Into<String>, bkpts: Breakpoints) {
        self.bkpts.set(col, bkpts);
    }

    /// Derives breakpoints of each column from the stored data.
    pub fn get_bkpts<I, S>(&mut self, cols: I, params: &BreakpointParams) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bkpts.derive(&self.store, &to_strings(cols), params)
    }

    /// Orders each column's breakpoints by the breakpoints of `scol`.
    pub fn map_bkpts<I, S>(&mut self, cols: I, scol: &str, tol: f64) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bkpts.map(&self.store, &to_strings(cols), scol, tol)
    }

    /// Derives per-slice breakpoints of each column, one array per breakpoint of `scol`.
    pub fn schedule_bkpts<I, S>(&mut self, cols: I, scol: &str, params: &BreakpointParams) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bkpts.schedule(&self.store, &to_strings(cols), scol, params)
    }

    pub fn get_bkpt(&self, col: &str, path: &[usize]) -> Result<f64> {
        self.bkpts.get_bkpt(col, path)
    }

    /// Brackets `v` in the breakpoints of `col`.
    pub fn bkpt_index(&self, col: &str, v: f64) -> Result<Bracket> {
        self.bkpts.bracket(col, v, EvalOptions::default().bracket_tol)
    }

    /// Breakpoints of `col` in slice `j` (any slice, for unscheduled breakpoints).
    pub fn scheduled_bkpts(&self, col: &str, j: Option<usize>) -> Result<&[f64]> {
        self.bkpts.slice(col, j)
    }

    pub fn full_factorial(&self, cols: Option<&[String]>, slice_cols: &[String]) -> Result<FullFactorial> {
        self.bkpts.full_factorial(cols, slice_cols)
    }

    // ----------------------------------------------------------------------
    // Radial basis functions
    // ----------------------------------------------------------------------

    pub fn get_rbf(&self, col: &str, path: &[usize]) -> Result<&Arc<dyn Interpolant>> {
        self.rbfs.get_rbf(col, path)
    }

    /// Fits one interpolant per column over all of `args`.
    pub fn create_global_rbfs(&mut self, cols: &[String], args: &[String], params: &RbfParams) -> Result<()> {
        for col in cols {
            let node = rbf::fit_global(&self.store, self.fitter.as_ref(), col, args, params, &self.progress)?;
            self.rbfs.insert(col.clone(), node);
        }
        Ok(())
    }

    /// Fits one interpolant per column and breakpoint of `args[0]`.
    pub fn create_slice_rbfs(&mut self, cols: &[String], args: &[String], params: &RbfParams) -> Result<()> {
        for col in cols {
            let node = rbf::fit_slices(
                &self.store,
                &self.bkpts,
                self.fitter.as_ref(),
                col,
                args,
                params,
                &self.progress,
            )?;
            self.rbfs.insert(col.clone(), node);
        }
        Ok(())
    }

    // ----------------------------------------------------------------------
    // Matching
    // ----------------------------------------------------------------------

    /// Finds stored rows matching the test points given in `call` for `args`.
    ///
    /// Arguments with no stored or derivable values are resolved for the
    /// broadcast but not searched on.
    pub fn find(&self, args: &[String], call: &CallArgs, opts: &FindOptions) -> Result<FindOutput> {
        let values = resolve_args(
            &self.store,
            &self.meta,
            "find",
            args,
            &call.positional,
            &call.keywords,
            call.mode,
        )?;
        let norm = normalize_args(args, &values, true)?;

        let stored: Vec<Option<Vec<f64>>> = args.iter().map(|k| self.get_all_values(k)).collect();
        let search: Vec<SearchArg<'_>> = args
            .iter()
            .zip(&stored)
            .zip(&norm.columns)
            .filter_map(|((name, stored), test)| {
                stored.as_ref().map(|stored| SearchArg {
                    name,
                    stored,
                    test,
                })
            })
            .collect();
        if search.is_empty() {
            return Err(DataKitError::invalid(
                "args",
                format!("cannot find matches for argument list {:?}", args),
            ));
        }

        find_rows(&search, self.store.nrows(), opts)
    }

    /// Matches the rows of `other` against this kit, using every float column
    /// of this kit (or `opts.search_cols`) that `other` also has.
    ///
    /// `found` holds row indices of `other`.
    pub fn find_pairwise(&self, other: &DataKit, opts: &PairwiseOptions) -> Result<FindOutput> {
        let cols: Vec<String> = match &opts.search_cols {
            Some(cols) => cols.clone(),
            None => self
                .cols()
                .iter()
                .filter(|c| matches!(self.store.try_get(c), Some(Column::Float(_))))
                .cloned()
                .collect(),
        };
        if cols.is_empty() {
            return Err(DataKitError::invalid("cols", "empty column list"));
        }
        let target = match &opts.target_mask {
            Some(mask) => Some(mask.resolve(other.nrows())?),
            None => None,
        };

        let mut args = Vec::new();
        let mut call = CallArgs::new();
        for col in cols {
            let Some(values) = other.get_all_values(&col) else {
                continue;
            };
            if values.is_empty() {
                continue;
            }
            let values = match &target {
                Some(rows) => rows.iter().map(|&i| values[i]).collect(),
                None => values,
            };
            call = call.kw(col.clone(), values);
            args.push(col);
        }

        let mut out = self.find(&args, &call, &opts.find)?;
        if let Some(rows) = &target {
            out.found = out.found.iter().map(|&j| rows[j]).collect();
        }
        Ok(out)
    }

    /// Differences `other[col] - self[col]` over rows paired one-to-one.
    fn paired_deltas(&self, other: &DataKit, col: &str, opts: &PairwiseOptions) -> Result<Vec<f64>> {
        let mut opts = opts.clone();
        opts.find.mode = MatchMode::Once;
        let out = self.find_pairwise(other, &opts)?;
        let rows = out.rows.rows();
        if rows.is_empty() {
            return Err(DataKitError::EmptyMatch {
                col: col.to_string(),
                context: "no matches between databases".into(),
            });
        }
        let v1 = self.get_values(col, &RowMask::Indices(rows))?;
        let v2 = other.get_values(col, &RowMask::Indices(out.found))?;
        Ok(v2.iter().zip(&v1).map(|(b, a)| b - a).collect())
    }

    fn check_cov(cov: f64) -> Result<()> {
        match (0.0..=1.0).contains(&cov) {
            true => Ok(()),
            false => Err(DataKitError::invalid("cov", format!("coverage {} is not in [0, 1]", cov))),
        }
    }

    /// Magnitude below which a fraction `cov` of the paired differences of
    /// `col` between this kit and `other` fall, as an empirical quantile
    /// (see [`stats::range_at`](crate::stats::range_at)).
    pub fn est_range(&self, other: &DataKit, col: &str, cov: f64, opts: &PairwiseOptions) -> Result<f64> {
        Self::check_cov(cov)?;
        let dv = self.paired_deltas(other, col, opts)?;
        stats::range_at(&dv, cov).ok_or_else(|| DataKitError::EmptyMatch {
            col: col.to_string(),
            context: "no paired differences".into(),
        })
    }

    /// Central interval holding a fraction `cov` of the paired differences of
    /// `col` between this kit and `other`, from empirical quantiles.
    pub fn est_cov_interval(
        &self,
        other: &DataKit,
        col: &str,
        cov: f64,
        opts: &PairwiseOptions,
    ) -> Result<(f64, f64)> {
        Self::check_cov(cov)?;
        let dv = self.paired_deltas(other, col, opts)?;
        stats::cov_interval(&dv, cov).ok_or_else(|| DataKitError::EmptyMatch {
            col: col.to_string(),
            context: "no paired differences".into(),
        })
    }

    // ----------------------------------------------------------------------
    // Regularization
    // ----------------------------------------------------------------------

    /// Resamples `cols` onto the full-factorial grid of the breakpoints of
    /// `args` by fitting RBFs to the scattered data.
    ///
    /// `args` defaults to the declared arguments of the last column, then to
    /// every float column with breakpoints. With `opts.slice_col`, one fit per
    /// slice value is made over the remaining arguments. The result is a new
    /// kit holding the grid arguments and the regularized columns, renamed by
    /// [`RegularizeOptions::translate`], with breakpoints copied to the new
    /// argument names.
    pub fn regularize_by_rbf(
        &self,
        cols: &[String],
        args: Option<&[String]>,
        opts: &RegularizeOptions,
    ) -> Result<DataKit> {
        let last = cols
            .last()
            .ok_or_else(|| DataKitError::invalid("cols", "column list is empty"))?;
        for col in cols {
            if !matches!(self.store.get(col)?, Column::Float(_)) {
                return Err(DataKitError::invalid(col.as_str(), "non-numeric column"));
            }
        }

        let args: Vec<String> = match (args, self.meta.eval_args(last)) {
            (Some(args), _) => args.to_vec(),
            (None, Some(args)) => args.to_vec(),
            (None, None) => self
                .bkpts
                .cols()
                .filter(|k| !cols.iter().any(|c| c == k))
                .filter(|k| matches!(self.store.try_get(k), None | Some(Column::Float(_))))
                .map(str::to_string)
                .collect(),
        };
        for arg in &args {
            self.bkpts.get(arg)?;
        }

        let slice_cols: Vec<String> = opts.slice_col.iter().cloned().collect();
        let grid = self.bkpts.full_factorial(Some(&args), &slice_cols)?;
        let iargs: Vec<String> = args.iter().filter(|a| !slice_cols.contains(a)).cloned().collect();
        let npts = grid.len();

        let mut out = DataKit::builder(ColumnStore::new())
            .fitter(Arc::clone(&self.fitter))
            .build();
        out.progress = self.progress.clone();

        for arg in &grid.cols {
            let name = opts.translate(arg);
            out.store.set(name.clone(), Column::Float(grid.values[arg].clone()))?;
            out.store.set_definition(name.clone(), self.store.definition(arg));
            out.bkpts.set(name, self.bkpts.get(arg)?.clone());
        }

        let all_rows: Vec<usize> = (0..self.nrows()).collect();
        for col in cols {
            let values = match slice_cols.first() {
                None => {
                    report(
                        &self.progress,
                        ProgressMsg::RbfFit {
                            col: col.clone(),
                            args: iargs.clone(),
                            slice: None,
                            num_slices: 1,
                            num_points: all_rows.len(),
                        },
                    );
                    let f = rbf::fit_rows(&self.store, self.fitter.as_ref(), col, &iargs, &all_rows, &opts.settings)?;
                    let points = Mat::from_fn(npts, iargs.len(), |i, j| grid.values[&iargs[j]][i]);
                    f.evaluate_many(points.as_ref())
                }
                Some(maincol) => self.regularize_slices(col, &iargs, &slice_cols, maincol, &grid, opts)?,
            };
            out.store.set(opts.translate(col), Column::Float(values))?;
        }

        debug!(cols = ?cols, args = ?args, npts, "regularized columns");
        report(
            &self.progress,
            ProgressMsg::Message {
                message: format!("Regularized {} columns onto {} grid points", cols.len(), npts),
            },
        );
        Ok(out)
    }

    fn regularize_slices(
        &self,
        col: &str,
        iargs: &[String],
        slice_cols: &[String],
        maincol: &str,
        grid: &FullFactorial,
        opts: &RegularizeOptions,
    ) -> Result<Vec<f64>> {
        let nslice = grid.slices.get(maincol).map_or(0, Vec::len);
        let stored = slice_cols
            .iter()
            .map(|k| self.store.float(k))
            .collect::<Result<Vec<_>>>()?;

        let pieces = (0..nslice)
            .into_par_iter()
            .map(|i| {
                report(
                    &self.progress,
                    ProgressMsg::RegularizeSlice {
                        col: col.to_string(),
                        slice: i,
                        num_slices: nslice,
                    },
                );
                let key: Vec<f64> = slice_cols.iter().map(|k| grid.slices[k][i]).collect();

                let targets: Vec<usize> = (0..grid.len())
                    .filter(|&p| slice_cols.iter().zip(&key).all(|(k, v)| grid.values[k][p] == *v))
                    .collect();
                let sources: Vec<usize> = (0..self.nrows())
                    .filter(|&r| stored.iter().zip(&key).all(|(s, v)| (s[r] - v).abs() <= opts.slice_tol))
                    .collect();

                let f = rbf::fit_rows(&self.store, self.fitter.as_ref(), col, iargs, &sources, &opts.settings)?;
                let points = Mat::from_fn(targets.len(), iargs.len(), |p, j| grid.values[&iargs[j]][targets[p]]);
                Ok((targets, f.evaluate_many(points.as_ref())))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut values = vec![0.0; grid.len()];
        for (targets, piece) in pieces {
            targets.into_iter().zip(piece).for_each(|(p, v)| values[p] = v);
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::AeroAngle;
    use assert_approx_eq::assert_approx_eq;
    use equator::assert;
    use surfdb_rbf::{RbfKernelType, RbfSettings};

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    fn ca(mach: f64, alpha: f64) -> f64 {
        0.2 + 0.3 * mach - 0.01 * alpha + 0.02 * mach * alpha
    }

    fn grid_kit() -> DataKit {
        let mut mach = Vec::new();
        let mut alpha = Vec::new();
        let mut values = Vec::new();
        for &m in &[0.5, 0.8, 1.2] {
            for &a in &[-2.0, 0.0, 2.0, 4.0] {
                mach.push(m);
                alpha.push(a);
                values.push(ca(m, a));
            }
        }
        let store = ColumnStore::from_columns([
            ("mach", Column::Float(mach)),
            ("alpha", Column::Float(alpha)),
            ("CA", Column::Float(values)),
        ])
        .unwrap();
        let mut kit = DataKit::builder(store).build();
        kit.get_bkpts(["mach", "alpha"], &BreakpointParams::new(1, 1e-12)).unwrap();
        kit
    }

    #[test]
    fn declaration_lifecycle() {
        let mut kit = grid_kit();
        assert!(kit.response_state("CA") == ResponseState::Undeclared);
        assert!(matches!(
            kit.evaluate("CA", &CallArgs::new().arg(0.8).arg(0.0)),
            Err(DataKitError::Undeclared { .. })
        ));

        kit.declare("CA", Declaration::new("linear", ["mach", "alpha"])).unwrap();
        assert!(kit.response_state("CA") == ResponseState::Declared);
        assert!(kit.metadata().eval_method("CA") == Some(EvalMethod::Multilinear));

        let settings = RbfSettings::builder(RbfKernelType::Multiquadric).build();
        kit.declare(
            "CA",
            Declaration::new("rbf", ["mach", "alpha"]).rbf(RbfParams::new(settings)),
        )
        .unwrap();
        assert!(kit.response_state("CA") == ResponseState::Fitted);

        kit.declare("CA", Declaration::new("nearest", ["mach", "alpha"])).unwrap();
        assert!(kit.response_state("CA") == ResponseState::Declared);
        assert!(kit.get_rbf("CA", &[]).is_err());

        assert!(matches!(
            kit.declare("CA", Declaration::new("spline", ["mach"])),
            Err(DataKitError::InvalidMethod { .. })
        ));
    }

    #[test]
    fn vectorized_call_keeps_shape() {
        let mut kit = grid_kit();
        kit.declare("CA", Declaration::new("multilinear", ["mach", "alpha"]).alias("aoa", "alpha"))
            .unwrap();

        let call = CallArgs::new()
            .kw("mach", 0.8)
            .kw("aoa", crate::args::Array::new(vec![0.0, 1.0, 2.0, 3.0], vec![2, 2]).unwrap());
        let out = kit.evaluate("CA", &call).unwrap();
        assert!(out.shape == vec![2, 2]);
        let values = out.scalars().unwrap();
        assert_approx_eq!(values[3], ca(0.8, 3.0), 1e-12);

        let err = kit
            .evaluate("CA", &CallArgs::new().arg(vec![0.8, 0.9]).arg(vec![0.0, 1.0, 2.0]))
            .unwrap_err();
        assert!(matches!(err, DataKitError::ShapeMismatch { .. }));

        // The whole call fails on the first out-of-range point.
        let err = kit
            .evaluate("CA", &CallArgs::new().arg(vec![0.8, 2.0]).arg(0.0))
            .unwrap_err();
        assert!(matches!(err, DataKitError::OutOfBounds { .. }));
    }

    #[test]
    fn call_takes_column_from_arguments() {
        let mut kit = grid_kit();
        kit.declare("CA", Declaration::new("nearest", ["mach", "alpha"])).unwrap();
        let v = kit.call(&CallArgs::new().arg("CA").arg(1.2).arg(4.0)).unwrap();
        assert!(v.scalar() == Some(ca(1.2, 4.0)));
        let v = kit.call(&CallArgs::new().kw("col", "CA").arg(0.5).arg(-2.0)).unwrap();
        assert!(v.scalar() == Some(ca(0.5, -2.0)));
        assert!(kit.call(&CallArgs::new().arg(0.5)).is_err());
    }

    #[test]
    fn defaults_and_converters_fill_arguments() {
        let mut kit = grid_kit();
        kit.declare("CA", Declaration::new("multilinear", ["mach", "alpha"])).unwrap();
        kit.set_arg_default("alpha", 2.0);
        let v = kit.evaluate("CA", &CallArgs::new().kw("mach", 0.8)).unwrap();
        assert_approx_eq!(v.scalar().unwrap(), ca(0.8, 2.0), 1e-12);

        kit.set_converter("alpha", AeroAngle::Alpha);
        let v = kit
            .evaluate("CA", &CallArgs::new().kw("mach", 0.8).kw("aoap", 3.0).kw("phip", 0.0))
            .unwrap();
        assert_approx_eq!(v.scalar().unwrap(), ca(0.8, 3.0), 1e-10);

        let err = kit.evaluate("CA", &CallArgs::new().kw("alpha", 0.0)).unwrap_err();
        match err {
            DataKitError::MissingArgument { arg, col } => {
                assert!(arg == "mach");
                assert!(col == "CA");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn derive_all_takes_arguments_from_store() {
        let mut kit = grid_kit();
        kit.declare("CA", Declaration::new("multilinear", ["mach", "alpha"])).unwrap();

        let err = kit.evaluate("CA", &CallArgs::new().kw("mach", 0.8)).unwrap_err();
        assert!(matches!(err, DataKitError::MissingArgument { .. }));

        let v = kit.evaluate_all("CA", &CallArgs::new().kw("mach", 0.8)).unwrap();
        assert!(v.shape == vec![12]);
        let alpha = kit.get_all_values("alpha").unwrap();
        for (got, a) in v.scalars().unwrap().iter().zip(&alpha) {
            assert_approx_eq!(*got, ca(0.8, *a), 1e-12);
        }

        // A stored column outranks both the converter and the default.
        kit.set_arg_default("alpha", 2.0);
        kit.set_converter("alpha", |_: &ArgView<'_>| Some(ArgValue::from(3.0)));
        let v = kit.evaluate_all("CA", &CallArgs::new()).unwrap();
        let stored = kit.get_all_values("CA").unwrap();
        for (got, want) in v.scalars().unwrap().iter().zip(&stored) {
            assert_approx_eq!(*got, *want, 1e-12);
        }

        let v = kit.evaluate("CA", &CallArgs::new().kw("mach", 0.8)).unwrap();
        assert_approx_eq!(v.scalar().unwrap(), ca(0.8, 3.0), 1e-12);
    }

    #[test]
    fn default_declaration_covers_undeclared_columns() {
        let mut kit = grid_kit();
        let column = kit.get("CA").unwrap().clone();
        kit.set("CA2", column).unwrap();
        kit.declare_default(Declaration::new("nearest", ["mach", "alpha"])).unwrap();
        assert!(kit.response_state("CA2") == ResponseState::Declared);
        let v = kit.evaluate("CA2", &CallArgs::new().arg(0.5).arg(0.0)).unwrap();
        assert!(v.scalar() == Some(ca(0.5, 0.0)));

        assert!(kit.declare_default(Declaration::new("rbf", ["mach"])).is_err());
    }

    #[test]
    fn function_method_receives_kit() {
        let mut kit = grid_kit();
        kit.declare("CA", Declaration::new("linear", ["mach", "alpha"])).unwrap();
        let double = |kit: &DataKit, x: &[f64]| -> Result<Value> {
            let v = kit.evaluate("CA", &CallArgs::new().arg(x[0]).arg(x[1]))?;
            Ok(Value::Scalar(2.0 * v.scalar().unwrap_or(f64::NAN)))
        };
        kit.declare("CA2", Declaration::new("fn", ["mach", "alpha"]).function(double))
            .unwrap();
        let v = kit.evaluate("CA2", &CallArgs::new().arg(0.6).arg(1.0)).unwrap();
        assert_approx_eq!(v.scalar().unwrap(), 2.0 * ca(0.6, 1.0), 1e-12);

        assert!(kit.declare("CA3", Declaration::new("function", ["mach"])).is_err());
    }

    #[test]
    fn uq_columns_take_argument_subsets() {
        let mut kit = grid_kit();
        let mach = kit.get_all_values("mach").unwrap();
        kit.set("UCA", mach.iter().map(|m| 0.1 * m).collect::<Vec<f64>>()).unwrap();
        kit.declare("CA", Declaration::new("linear", ["mach", "alpha"])).unwrap();
        kit.declare("UCA", Declaration::new("nearest", ["mach"])).unwrap();
        kit.set_uq_cols("CA", ["UCA"]);

        let out = kit.eval_uq("CA", &CallArgs::new().arg(vec![0.5, 1.2]).arg(0.0)).unwrap();
        let uca = out["UCA"].scalars().unwrap();
        assert_approx_eq!(uca[1], 0.12, 1e-12);

        kit.declare("UCA", Declaration::new("nearest", ["beta"])).unwrap();
        assert!(kit.eval_uq("CA", &CallArgs::new().arg(0.5).arg(0.0)).is_err());
    }

    #[test]
    fn cross_argument_and_index_evaluation() {
        let mut kit = grid_kit();
        kit.declare("CA", Declaration::new("linear", ["mach", "alpha"]).alias("aoa", "alpha"))
            .unwrap();

        let v = kit
            .eval_from_arglist("CA", &s(&["aoa", "mach", "beta"]), &CallArgs::new().arg(2.0).arg(0.8).arg(0.0))
            .unwrap();
        assert_approx_eq!(v.scalar().unwrap(), ca(0.8, 2.0), 1e-12);
        assert!(kit.eval_from_arglist("CA", &s(&["mach"]), &CallArgs::new().arg(0.8)).is_err());

        let v = kit.eval_from_index("CA", &[0, 5, 11]).unwrap();
        let values = v.scalars().unwrap();
        assert_approx_eq!(values[1], ca(0.8, 0.0), 1e-12);
        assert_approx_eq!(values[2], ca(1.2, 4.0), 1e-12);

        let dict = kit
            .arg_value_dict("CA", &CallArgs::new().arg(vec![0.5, 0.8]).kw("aoa", 1.0))
            .unwrap();
        assert!(dict["alpha"].to_vec().unwrap() == vec![1.0, 1.0]);
    }

    #[test]
    fn matches_return_stored_rows() {
        let mut kit = grid_kit();
        kit.declare("CA", Declaration::new("exact", ["mach", "alpha"])).unwrap();
        let m = kit
            .eval_at_matches("CA", &CallArgs::new().arg(0.8).arg(vec![0.0, 1.0, 4.0]))
            .unwrap();
        assert!(m.rows == vec![5, 7]);
        assert!(m.found == vec![0, 2]);
        assert!(m.args["alpha"] == vec![0.0, 4.0]);
        assert!(m.values[1] == Value::Scalar(ca(0.8, 4.0)));

        assert!(matches!(
            kit.evaluate("CA", &CallArgs::new().arg(0.8).arg(1.0)),
            Err(DataKitError::EmptyMatch { .. })
        ));

        // Options given with the call replace the declared tolerance.
        let loose = EvalOptions::builder().arg_tol("alpha", 0.6).build();
        let v = kit
            .evaluate("CA", &CallArgs::new().arg(0.8).arg(0.5).with_options(loose))
            .unwrap();
        assert!(v.scalar() == Some(ca(0.8, 0.0)));
    }

    #[test]
    fn pairwise_statistics() {
        let kit = grid_kit();
        let mut other = grid_kit();
        let shifted: Vec<f64> = kit
            .get_all_values("CA")
            .unwrap()
            .iter()
            .enumerate()
            .map(|(i, v)| v + 0.01 * (i % 4) as f64)
            .collect();
        other.set("CA", shifted).unwrap();

        let opts = PairwiseOptions {
            search_cols: Some(s(&["mach", "alpha"])),
            ..PairwiseOptions::default()
        };
        let out = kit.find_pairwise(&other, &opts).unwrap();
        assert!(out.found.len() == 12);

        let r = kit.est_range(&other, "CA", 1.0, &opts).unwrap();
        assert_approx_eq!(r, 0.03, 1e-12);
        let (lo, hi) = kit.est_cov_interval(&other, "CA", 1.0, &opts).unwrap();
        assert_approx_eq!(lo, 0.0, 1e-12);
        assert_approx_eq!(hi, 0.03, 1e-12);
        assert!(kit.est_range(&other, "CA", 1.5, &opts).is_err());
    }

    #[test]
    fn breakpoint_access() {
        let kit = grid_kit();
        assert!(kit.get_bkpt("alpha", &[3]).unwrap() == 4.0);
        let b = kit.bkpt_index("mach", 1.0).unwrap();
        assert!(b.i0 == Some(1));
        assert_approx_eq!(b.f, 0.5);
        assert!(kit.scheduled_bkpts("mach", Some(4)).unwrap().len() == 3);
        assert!(kit.breakpoints().get("mach").unwrap() == &Breakpoints::Values(vec![0.5, 0.8, 1.2]));
        let ff = kit.full_factorial(None, &[]).unwrap();
        assert!(ff.len() == 12);
    }

    #[test]
    fn link_data_checks_lengths() {
        let mut kit = grid_kit();
        let other = grid_kit();
        let mut renamed = DataKit::new();
        renamed.set("CA_other", other.get("CA").unwrap().clone()).unwrap();
        kit.link_data(&renamed, None).unwrap();
        assert!(kit.has("CA_other"));

        let mut short = DataKit::new();
        short.set("x", vec![1.0, 2.0]).unwrap();
        assert!(matches!(kit.link_data(&short, None), Err(DataKitError::ShapeMismatch { .. })));
    }
}
