/////////////////////////////////////////////////////////////////////////////////////////////
//
// Builds, stores and evaluates the radial basis interpolants of RBF-declared columns.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # rbf
//!
//! Orchestration around an external [`RbfFit`] capability. A column gets
//! either one *global* interpolant over all of its arguments, or one
//! interpolant per breakpoint of its first argument (a *slice* fit) over the
//! remaining arguments. Slice interpolants are blended linearly in the first
//! argument, either directly (`rbf-linear`) or after rescaling the lookup
//! point into each slice's own ranges (`rbf-map`).

use std::{collections::HashMap, fmt, sync::Arc};

use faer::Mat;
use rayon::prelude::*;
use surfdb_rbf::{Interpolant, RbfFit, RbfSettings};
use tracing::debug;

use crate::{
    breakpoints::{BreakpointTable, ScheduleTolerances},
    config::{EvalOptions, RbfParams},
    error::{DataKitError, Result},
    progress::{report, ProgressMsg, ProgressSink},
    store::ColumnStore,
    value::Value,
};

/// Fitted interpolants of one column, nested by slice index.
#[derive(Clone)]
pub enum RbfNode {
    Leaf(Arc<dyn Interpolant>),
    Branch(Vec<RbfNode>),
}

impl RbfNode {
    /// Walks `path` down the branches to a leaf.
    pub fn get(&self, path: &[usize]) -> Option<&Arc<dyn Interpolant>> {
        match (self, path) {
            (RbfNode::Leaf(f), []) => Some(f),
            (RbfNode::Branch(nodes), [i, rest @ ..]) => nodes.get(*i)?.get(rest),
            _ => None,
        }
    }

    /// Nesting depth: `0` for a global interpolant, `1` for per-slice.
    pub fn depth(&self) -> usize {
        match self {
            RbfNode::Leaf(_) => 0,
            RbfNode::Branch(nodes) => 1 + nodes.first().map_or(0, RbfNode::depth),
        }
    }
}

impl fmt::Debug for RbfNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RbfNode::Leaf(rbf) => write!(f, "Leaf({}d)", rbf.dimensions()),
            RbfNode::Branch(nodes) => f.debug_list().entries(nodes).finish(),
        }
    }
}

/// Interpolants of every fitted column.
#[derive(Clone, Debug, Default)]
pub struct RbfTable {
    rbfs: HashMap<String, RbfNode>,
}

impl RbfTable {
    pub fn contains(&self, col: &str) -> bool {
        self.rbfs.contains_key(col)
    }

    pub fn node(&self, col: &str) -> Option<&RbfNode> {
        self.rbfs.get(col)
    }

    pub(crate) fn insert(&mut self, col: impl Into<String>, node: RbfNode) {
        self.rbfs.insert(col.into(), node);
    }

    pub(crate) fn remove(&mut self, col: &str) -> Option<RbfNode> {
        self.rbfs.remove(col)
    }

    /// The interpolant of `col` at `path` (empty for global fits, `[slice]` for
    /// slice fits).
    pub fn get_rbf(&self, col: &str, path: &[usize]) -> Result<&Arc<dyn Interpolant>> {
        let node = self
            .rbfs
            .get(col)
            .ok_or_else(|| DataKitError::invalid(col, "no radial basis function has been fitted"))?;
        node.get(path).ok_or_else(|| {
            DataKitError::invalid(
                col,
                format!(
                    "expecting a {}-level RBF index but got {:?}",
                    node.depth(),
                    path
                ),
            )
        })
    }
}

/// Fits `col` against `args` over `rows`.
pub(crate) fn fit_rows(
    store: &ColumnStore,
    fitter: &dyn RbfFit,
    col: &str,
    args: &[String],
    rows: &[usize],
    settings: &RbfSettings,
) -> Result<Arc<dyn Interpolant>> {
    let coords = args
        .iter()
        .map(|k| store.float(k))
        .collect::<Result<Vec<_>>>()?;
    let values = store.float(col)?;

    let points = Mat::from_fn(rows.len(), args.len(), |i, j| coords[j][rows[i]]);
    let values: Vec<f64> = rows.iter().map(|&i| values[i]).collect();

    fitter
        .fit(points.as_ref(), &values, settings)
        .map_err(|e| DataKitError::construction(col, e))
}

fn candidate_rows(store: &ColumnStore, params: &RbfParams) -> Result<Vec<usize>> {
    let n = store.nrows();
    match &params.rows {
        None => Ok((0..n).collect()),
        Some(rows) => match rows.iter().find(|&&i| i >= n) {
            Some(i) => Err(DataKitError::invalid(
                "rows",
                format!("row {} out of range for {} rows", i, n),
            )),
            None => Ok(rows.clone()),
        },
    }
}

/// One interpolant of `col` over every declared argument.
pub(crate) fn fit_global(
    store: &ColumnStore,
    fitter: &dyn RbfFit,
    col: &str,
    args: &[String],
    params: &RbfParams,
    progress: &Option<Arc<dyn ProgressSink>>,
) -> Result<RbfNode> {
    let rows = candidate_rows(store, params)?;
    report(
        progress,
        ProgressMsg::RbfFit {
            col: col.to_string(),
            args: args.to_vec(),
            slice: None,
            num_slices: 1,
            num_points: rows.len(),
        },
    );
    debug!(col, ?args, num_points = rows.len(), "fitting global rbf");
    Ok(RbfNode::Leaf(fit_rows(store, fitter, col, args, &rows, &params.settings)?))
}

/// One interpolant of `col` per breakpoint of `args[0]`, over `args[1..]`.
///
/// Slices are fitted in parallel and returned in breakpoint order; the first
/// failing slice aborts construction.
pub(crate) fn fit_slices(
    store: &ColumnStore,
    bkpts: &BreakpointTable,
    fitter: &dyn RbfFit,
    col: &str,
    args: &[String],
    params: &RbfParams,
    progress: &Option<Arc<dyn ProgressSink>>,
) -> Result<RbfNode> {
    let (skey, rest) = match args.split_first() {
        Some((skey, rest)) if !rest.is_empty() => (skey, rest),
        _ => {
            return Err(DataKitError::invalid(
                col,
                "slice RBFs need a slice key and at least one more argument",
            ))
        }
    };
    let keys = bkpts.slice(skey, None)?;
    let master = store.float(skey)?;
    let tol = params.slice_tol(skey);
    let candidates = candidate_rows(store, params)?;
    let num_slices = keys.len();

    let nodes = keys
        .par_iter()
        .enumerate()
        .map(|(j, &key)| {
            let rows: Vec<usize> = candidates
                .iter()
                .copied()
                .filter(|&i| (master[i] - key).abs() <= tol)
                .collect();

            let mut label = vec![format!("{}={}", skey, key)];
            label.extend(rest.iter().cloned());
            report(
                progress,
                ProgressMsg::RbfFit {
                    col: col.to_string(),
                    args: label,
                    slice: Some(j),
                    num_slices,
                    num_points: rows.len(),
                },
            );
            debug!(col, slice = j, key, num_points = rows.len(), "fitting slice rbf");

            fit_rows(store, fitter, col, rest, &rows, &params.settings).map(RbfNode::Leaf)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RbfNode::Branch(nodes))
}

fn call(rbf: &Arc<dyn Interpolant>, col: &str, x: &[f64]) -> Result<f64> {
    match rbf.dimensions() == x.len() {
        true => Ok(rbf.evaluate(x)),
        false => Err(DataKitError::ShapeMismatch {
            context: format!("RBF input for '{}'", col),
            expected: vec![rbf.dimensions()],
            found: vec![x.len()],
        }),
    }
}

/// Global interpolant of `col` at `x`.
pub fn eval_rbf(rbfs: &RbfTable, col: &str, x: &[f64]) -> Result<Value> {
    call(rbfs.get_rbf(col, &[])?, col, x).map(Value::Scalar)
}

/// Blends the slice interpolants bracketing `x[0]`, each evaluated at `x[1..]`.
pub fn eval_rbf_linear(
    rbfs: &RbfTable,
    bkpts: &BreakpointTable,
    col: &str,
    args: &[String],
    x: &[f64],
    opts: &EvalOptions,
) -> Result<Value> {
    let (skey, x0) = match (args.first(), x.first()) {
        (Some(k), Some(&v)) => (k, v),
        _ => return Err(DataKitError::invalid(col, "slice RBF lookup needs a slice key")),
    };
    let keys = bkpts.slice(skey, None)?;
    let b = bkpts.bracket(skey, x0, opts.bracket_tol)?;
    if b.is_extrapolated() && !opts.extrap {
        return Err(DataKitError::OutOfBounds {
            arg: skey.clone(),
            value: x0,
            min: keys[0],
            max: keys[keys.len() - 1],
        });
    }
    let (lo, hi) = b.interval(keys.len());

    let y0 = call(rbfs.get_rbf(col, &[lo])?, col, &x[1..])?;
    let y1 = call(rbfs.get_rbf(col, &[hi])?, col, &x[1..])?;
    Ok(Value::Scalar((1.0 - b.f) * y0 + b.f * y1))
}

/// Blends the slice interpolants bracketing `x[0]`, each evaluated at the
/// lookup point rescaled into its own slice ranges.
pub fn eval_rbf_schedule(
    rbfs: &RbfTable,
    bkpts: &BreakpointTable,
    col: &str,
    args: &[String],
    x: &[f64],
    opts: &EvalOptions,
) -> Result<Value> {
    let tols = ScheduleTolerances {
        bracket_tol: opts.bracket_tol,
        schedule_tol: opts.schedule_tol,
        extrap: opts.extrap,
    };
    let sb = bkpts.scheduled_bracket(args, x, tols)?;

    let y0 = call(rbfs.get_rbf(col, &[sb.lo])?, col, &sb.x0)?;
    let y1 = call(rbfs.get_rbf(col, &[sb.hi])?, col, &sb.x1)?;
    Ok(Value::Scalar((1.0 - sb.f) * y0 + sb.f * y1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::BreakpointParams, progress::closure_sink, store::Column};
    use assert_approx_eq::assert_approx_eq;
    use equator::assert;
    use std::sync::Mutex;
    use surfdb_rbf::{DirectRbfFitter, RbfKernelType};

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    fn cn(mach: f64, alpha: f64) -> f64 {
        0.5 + 2.0 * mach + 0.1 * alpha + 0.05 * alpha * mach
    }

    fn store() -> (ColumnStore, BreakpointTable) {
        let mut mach = Vec::new();
        let mut alpha = Vec::new();
        let mut values = Vec::new();
        for &m in &[0.5, 0.8, 1.2] {
            for i in 0..5 {
                let a = -2.0 + 1.5 * i as f64;
                mach.push(m);
                alpha.push(a);
                values.push(cn(m, a));
            }
        }
        let store = ColumnStore::from_columns([
            ("mach", Column::Float(mach)),
            ("alpha", Column::Float(alpha)),
            ("CN", Column::Float(values)),
        ])
        .unwrap();
        let mut bkpts = BreakpointTable::new();
        bkpts
            .derive(&store, &s(&["mach"]), &BreakpointParams::default())
            .unwrap();
        (store, bkpts)
    }

    fn params() -> RbfParams {
        RbfParams::new(RbfSettings::builder(RbfKernelType::Multiquadric).build())
    }

    #[test]
    fn global_fit_reproduces_samples() {
        let (store, _) = store();
        let args = s(&["mach", "alpha"]);
        let node = fit_global(&store, &DirectRbfFitter, "CN", &args, &params(), &None).unwrap();
        assert!(node.depth() == 0);

        let mut rbfs = RbfTable::default();
        rbfs.insert("CN", node);
        let v = eval_rbf(&rbfs, "CN", &[0.8, 1.0]).unwrap();
        assert_approx_eq!(v.as_scalar().unwrap(), cn(0.8, 1.0), 1e-6);

        assert!(matches!(
            eval_rbf(&rbfs, "CN", &[0.8]),
            Err(DataKitError::ShapeMismatch { .. })
        ));
        assert!(rbfs.get_rbf("CN", &[0]).is_err());
        assert!(rbfs.get_rbf("CA", &[]).is_err());
    }

    #[test]
    fn slice_fits_blend_linearly() {
        let (store, bkpts) = store();
        let args = s(&["mach", "alpha"]);
        let node = fit_slices(&store, &bkpts, &DirectRbfFitter, "CN", &args, &params(), &None).unwrap();
        assert!(node.depth() == 1);

        let mut rbfs = RbfTable::default();
        rbfs.insert("CN", node);
        assert!(rbfs.get_rbf("CN", &[2]).unwrap().dimensions() == 1);

        let opts = EvalOptions::default();
        let v = eval_rbf_linear(&rbfs, &bkpts, "CN", &args, &[0.8, 2.5], &opts).unwrap();
        assert_approx_eq!(v.as_scalar().unwrap(), cn(0.8, 2.5), 1e-6);

        // Linear in mach between the slices, so the blend is exact.
        let v = eval_rbf_linear(&rbfs, &bkpts, "CN", &args, &[1.0, -0.5], &opts).unwrap();
        assert_approx_eq!(v.as_scalar().unwrap(), cn(1.0, -0.5), 1e-6);

        let err = eval_rbf_linear(&rbfs, &bkpts, "CN", &args, &[1.5, 0.0], &opts).unwrap_err();
        assert!(matches!(err, DataKitError::OutOfBounds { .. }));

        let extrap = EvalOptions::builder().extrap(true).build();
        let v = eval_rbf_linear(&rbfs, &bkpts, "CN", &args, &[1.6, 1.0], &extrap).unwrap();
        assert_approx_eq!(v.as_scalar().unwrap(), cn(1.6, 1.0), 1e-6);
    }

    #[test]
    fn schedule_evaluation_matches_slice_at_breakpoint() {
        let (store, mut bkpts) = store();
        bkpts
            .schedule(&store, &s(&["alpha"]), "mach", &BreakpointParams::new(1, 1e-12))
            .unwrap();
        let args = s(&["mach", "alpha"]);
        let node = fit_slices(&store, &bkpts, &DirectRbfFitter, "CN", &args, &params(), &None).unwrap();
        let mut rbfs = RbfTable::default();
        rbfs.insert("CN", node);

        let opts = EvalOptions::default();
        let v = eval_rbf_schedule(&rbfs, &bkpts, "CN", &args, &[1.2, 2.5], &opts).unwrap();
        assert_approx_eq!(v.as_scalar().unwrap(), cn(1.2, 2.5), 1e-6);
    }

    #[test]
    fn too_few_points_fails_construction() {
        let (store, bkpts) = store();
        let args = s(&["mach", "alpha"]);
        let few = params().with_rows(vec![0, 5, 10]);
        let err = fit_slices(&store, &bkpts, &DirectRbfFitter, "CN", &args, &few, &None).unwrap_err();
        assert!(matches!(err, DataKitError::ConstructionFailure { .. }));

        let err = fit_slices(&store, &bkpts, &DirectRbfFitter, "CN", &s(&["mach"]), &params(), &None).unwrap_err();
        assert!(matches!(err, DataKitError::InvalidArgument { .. }));
    }

    #[test]
    fn slice_fits_report_progress() {
        let (store, bkpts) = store();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let (sink, handle) = closure_sink(16, move |msg| {
            if let ProgressMsg::RbfFit { slice, .. } = msg {
                sink_seen.lock().unwrap().push(slice);
            }
        });
        let progress: Option<Arc<dyn ProgressSink>> = Some(sink);
        fit_slices(&store, &bkpts, &DirectRbfFitter, "CN", &s(&["mach", "alpha"]), &params(), &progress).unwrap();
        drop(progress);
        handle.join().unwrap();

        let mut slices = seen.lock().unwrap().clone();
        slices.sort();
        assert!(slices == vec![Some(0), Some(1), Some(2)]);
    }
}
