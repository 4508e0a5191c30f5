/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements exact, nearest, multilinear and scheduled multilinear lookups.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # interp
//!
//! Lookup algorithms over the stored rows of a column. Each function
//! evaluates one point `x`, whose entries line up with `args`.

use tracing::trace;

use crate::{
    breakpoints::{bracket, BreakpointTable, ScheduleTolerances},
    config::EvalOptions,
    error::{DataKitError, Result},
    store::{Column, ColumnStore},
    value::Value,
};

fn check_point(col: &str, args: &[String], x: &[f64]) -> Result<()> {
    match args.len() == x.len() {
        true => Ok(()),
        false => Err(DataKitError::ShapeMismatch {
            context: format!("lookup point for '{}'", col),
            expected: vec![args.len()],
            found: vec![x.len()],
        }),
    }
}

fn row_value(column: &Column, col: &str, i: usize) -> Result<Value> {
    column
        .value(i)
        .ok_or_else(|| DataKitError::invalid(col, "column has no numeric value to return"))
}

/// Values of `col` at every row matching `x` within the per-argument tolerance.
///
/// Returns `None` when no row matches, the row's value for one match and
/// [`Value::Multiple`] for several.
pub fn eval_exact(
    store: &ColumnStore,
    col: &str,
    args: &[String],
    x: &[f64],
    opts: &EvalOptions,
) -> Result<Option<Value>> {
    check_point(col, args, x)?;
    let column = store.get(col)?;
    let mut rows: Vec<usize> = (0..column.len()).collect();

    for (k, &xk) in args.iter().zip(x) {
        let v = store.float(k)?;
        let tol = opts.tol_for(k);
        rows.retain(|&i| (v[i] - xk).abs() <= tol);
        if rows.is_empty() {
            return Ok(None);
        }
    }

    match rows.as_slice() {
        [i] => row_value(column, col, *i).map(Some),
        _ => {
            let values = rows
                .iter()
                .map(|&i| row_value(column, col, i))
                .collect::<Result<Vec<_>>>()?;
            Ok(Some(Value::Multiple(values)))
        }
    }
}

/// Value of `col` at the row minimizing `sum(w_k * (X_k - x_k)^2)`; the first
/// such row on ties.
pub fn eval_nearest(
    store: &ColumnStore,
    col: &str,
    args: &[String],
    x: &[f64],
    opts: &EvalOptions,
) -> Result<Value> {
    check_point(col, args, x)?;
    let column = store.get(col)?;
    let n = column.len();
    let mut dist = vec![0.0; n];

    for (k, &xk) in args.iter().zip(x) {
        let v = store.float(k)?;
        let w = opts.weight_for(k);
        dist.iter_mut().zip(v.iter()).for_each(|(d, vi)| *d += w * (vi - xk).powi(2));
    }

    let (best, _) = dist
        .iter()
        .enumerate()
        .fold((None, f64::INFINITY), |(best, dmin), (i, &d)| match d < dmin {
            true => (Some(i), d),
            false => (best, dmin),
        });
    let best = best.ok_or_else(|| DataKitError::EmptyMatch {
        col: col.to_string(),
        context: "no rows to search for a nearest match".into(),
    })?;
    trace!(col, row = best, "nearest row");
    row_value(column, col, best)
}

/// Multilinear interpolation of `col`, whose rows (or the subset `rows`) form a
/// flattened regular grid over `args` with `args[0]` varying slowest.
///
/// `slice` picks the slice of any scheduled breakpoints among `args`.
#[allow(clippy::too_many_arguments)]
pub fn eval_multilinear(
    store: &ColumnStore,
    bkpts: &BreakpointTable,
    col: &str,
    args: &[String],
    x: &[f64],
    rows: Option<&[usize]>,
    slice: Option<usize>,
    bracket_tol: f64,
) -> Result<Value> {
    check_point(col, args, x)?;
    let column = store.get(col)?;
    let n = rows.map_or(column.len(), <[usize]>::len);

    let grid = args
        .iter()
        .map(|k| bkpts.slice(k, slice))
        .collect::<Result<Vec<_>>>()?;
    let sizes: Vec<usize> = grid.iter().map(|v| v.len()).collect();
    if sizes.iter().product::<usize>() != n {
        return Err(DataKitError::ShapeMismatch {
            context: format!("column '{}' as a grid over {:?}", col, args),
            expected: sizes,
            found: vec![n],
        });
    }

    let nk = args.len();
    let mut lower = Vec::with_capacity(nk);
    let mut upper = Vec::with_capacity(nk);
    let mut frac = Vec::with_capacity(nk);
    for ((k, values), &xk) in args.iter().zip(&grid).zip(x) {
        let b = bracket(values, xk, bracket_tol).ok_or_else(|| {
            DataKitError::MissingBreakpoints {
                col: k.clone(),
                reason: "empty breakpoint array".into(),
            }
        })?;
        match (b.i0, b.i1) {
            (Some(i0), Some(i1)) => {
                lower.push(i0);
                upper.push(i1);
                frac.push(b.f);
            }
            _ => {
                return Err(DataKitError::OutOfBounds {
                    arg: k.clone(),
                    value: xk,
                    min: values[0],
                    max: values[values.len() - 1],
                })
            }
        }
    }

    // Stride of each dimension in the flattened grid.
    let strides: Vec<usize> = (0..nk).map(|i| sizes[i + 1..].iter().product()).collect();
    let j0: usize = lower.iter().zip(&strides).map(|(i0, s)| i0 * s).sum();

    let mut terms = Vec::with_capacity(1 << nk);
    for e in 0..(1usize << nk) {
        let mut j = j0;
        let mut w = 1.0;
        for i in 0..nk {
            let up = (e >> (nk - 1 - i)) & 1;
            j += up * (upper[i] - lower[i]) * strides[i];
            w *= match up {
                1 => frac[i],
                _ => 1.0 - frac[i],
            };
        }
        let row = rows.map_or(j, |r| r[j]);
        terms.push((w, row_value(column, col, row)?));
    }

    Value::weighted_sum(&terms)
}

/// Scheduled multilinear interpolation: `args[0]` is the master key and each
/// bracketing master slice is interpolated on its own grid before blending.
pub fn eval_multilinear_schedule(
    store: &ColumnStore,
    bkpts: &BreakpointTable,
    col: &str,
    args: &[String],
    x: &[f64],
    opts: &EvalOptions,
) -> Result<Value> {
    check_point(col, args, x)?;
    let tols = ScheduleTolerances {
        bracket_tol: opts.bracket_tol,
        schedule_tol: opts.schedule_tol,
        extrap: opts.extrap,
    };
    let sb = bkpts.scheduled_bracket(args, x, tols)?;

    let skey = &args[0];
    let keys = bkpts.slice(skey, None)?;
    let master = store.float(skey)?;
    let slice_rows = |j: usize| -> Vec<usize> {
        let key = keys[j];
        master
            .iter()
            .enumerate()
            .filter(|(_, v)| (*v - key).abs() <= opts.slice_tol)
            .map(|(i, _)| i)
            .collect()
    };

    let rows0 = slice_rows(sb.lo);
    let rows1 = slice_rows(sb.hi);
    let y0 = eval_multilinear(store, bkpts, col, &args[1..], &sb.x0, Some(&rows0), Some(sb.lo), opts.bracket_tol)?;
    let y1 = eval_multilinear(store, bkpts, col, &args[1..], &sb.x1, Some(&rows1), Some(sb.hi), opts.bracket_tol)?;

    y0.blend(&y1, sb.f)
}
