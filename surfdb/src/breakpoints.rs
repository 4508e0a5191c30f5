/////////////////////////////////////////////////////////////////////////////////////////////
//
// Derives, stores and searches the breakpoints of independent variables.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # breakpoints
//!
//! A breakpoint is a distinguished sample value of an independent variable,
//! used as a grid line by the multilinear methods and as a slice key by the
//! scheduled and sliced RBF methods.
//!
//! Breakpoints are either a single ascending array, or *scheduled*: one array
//! per breakpoint of a master key, used when the sampled grid changes from one
//! master-key value to the next.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::BreakpointParams,
    error::{DataKitError, Result},
    store::{Column, ColumnStore},
};

/// The breakpoints of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Breakpoints {
    /// Ascending unique values.
    Values(Vec<f64>),
    /// One ascending array per breakpoint of the schedule key.
    Scheduled(Vec<Vec<f64>>),
    /// Distinct labels of a text column.
    Labels(Vec<String>),
}

impl Breakpoints {
    /// Number of entries (slices, for scheduled breakpoints).
    pub fn len(&self) -> usize {
        match self {
            Breakpoints::Values(v) => v.len(),
            Breakpoints::Scheduled(v) => v.len(),
            Breakpoints::Labels(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self, Breakpoints::Scheduled(_))
    }

    pub fn as_values(&self) -> Option<&[f64]> {
        match self {
            Breakpoints::Values(v) => Some(v),
            _ => None,
        }
    }
}

/// Result of a bracket search. `None` on either side marks extrapolation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub i0: Option<usize>,
    pub i1: Option<usize>,
    /// `(v - V[lo]) / (V[hi] - V[lo])` over the bracketing (or end) interval.
    pub f: f64,
}

impl Bracket {
    pub fn is_extrapolated(&self) -> bool {
        self.i0.is_none() || self.i1.is_none()
    }

    /// Indices to blend between for an array of length `n`, using the end
    /// interval when extrapolated.
    pub fn interval(&self, n: usize) -> (usize, usize) {
        match (self.i0, self.i1) {
            (Some(i0), Some(i1)) => (i0, i1),
            (None, _) => (0, 1.min(n.saturating_sub(1))),
            (Some(_), None) => (n.saturating_sub(2), n.saturating_sub(1)),
        }
    }
}

/// Sorted unique values of `values`, merging values within `tol` of an
/// already accepted breakpoint and dropping values carried by fewer than
/// `min_support` rows.
pub fn unique_with_support(values: &[f64], min_support: usize, tol: f64) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();

    let mut out: Vec<f64> = Vec::new();
    for v in sorted {
        if out.iter().any(|b| (v - b).abs() <= tol) {
            continue;
        }
        let support = values.iter().filter(|x| (*x - v).abs() <= tol).count();
        if support >= min_support {
            out.push(v);
        }
    }
    out
}

/// Brackets `v` in the ascending array `values`.
///
/// Returns `None` for an empty array. Below the first value (by more than
/// `tol` times the range) gives `(None, 0, f < 0)`; above the last gives
/// `(n - 1, None, f > 1)`, with `f` measured along the first or last
/// interval. A single-entry array brackets only its own value.
pub fn bracket(values: &[f64], v: f64, tol: f64) -> Option<Bracket> {
    let n = values.len();
    match n {
        0 => None,
        1 => {
            let v0 = values[0];
            Some(match v {
                v if v < v0 - tol => Bracket { i0: None, i1: Some(0), f: 0.0 },
                v if v > v0 + tol => Bracket { i0: Some(0), i1: None, f: 0.0 },
                _ => Bracket { i0: Some(0), i1: Some(0), f: 0.0 },
            })
        }
        _ => {
            let vmin = values[0];
            let vmax = values[n - 1];
            let margin = tol * (vmax - vmin);

            if v < vmin - margin {
                return Some(Bracket {
                    i0: None,
                    i1: Some(0),
                    f: (v - values[0]) / (values[1] - values[0]),
                });
            }
            if v > vmax + margin {
                return Some(Bracket {
                    i0: Some(n - 1),
                    i1: None,
                    f: (v - values[n - 2]) / (values[n - 1] - values[n - 2]),
                });
            }

            let count = values[..n - 1].iter().filter(|&&x| x <= v).count();
            let i0 = count.saturating_sub(1);
            let i1 = i0 + 1;
            Some(Bracket {
                i0: Some(i0),
                i1: Some(i1),
                f: (v - values[i0]) / (values[i1] - values[i0]),
            })
        }
    }
}

/// Like [`bracket`] but fails instead of extrapolating.
pub fn bracket_strict(values: &[f64], v: f64, tol: f64, arg: &str) -> Result<Bracket> {
    let b = bracket(values, v, tol).ok_or_else(|| DataKitError::MissingBreakpoints {
        col: arg.to_string(),
        reason: "breakpoint array is empty".into(),
    })?;
    match b.is_extrapolated() {
        true => Err(DataKitError::OutOfBounds {
            arg: arg.to_string(),
            value: v,
            min: values[0],
            max: values[values.len() - 1],
        }),
        false => Ok(b),
    }
}

/// Master-key bracket plus the two rescaled lookup points of a scheduled lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledBracket {
    pub master: Bracket,
    /// Slice indices to blend between.
    pub lo: usize,
    pub hi: usize,
    /// Blend fraction between slices `lo` and `hi`.
    pub f: f64,
    /// Remaining coordinates expressed in slice `lo`.
    pub x0: Vec<f64>,
    /// Remaining coordinates expressed in slice `hi`.
    pub x1: Vec<f64>,
}

/// Tolerances for [`BreakpointTable::scheduled_bracket`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleTolerances {
    pub bracket_tol: f64,
    pub schedule_tol: f64,
    pub extrap: bool,
}

/// Full-factorial grid over a set of breakpoints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FullFactorial {
    /// Grid columns (slice key first when present, then the arguments).
    pub cols: Vec<String>,
    pub values: BTreeMap<String, Vec<f64>>,
    /// Slice-defining values, one entry per slice.
    pub slices: BTreeMap<String, Vec<f64>>,
}

impl FullFactorial {
    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.values.values().next().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Breakpoints of every column that has them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BreakpointTable {
    bkpts: BTreeMap<String, Breakpoints>,
}

impl BreakpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, col: &str) -> bool {
        self.bkpts.contains_key(col)
    }

    pub fn cols(&self) -> impl Iterator<Item = &str> {
        self.bkpts.keys().map(String::as_str)
    }

    pub fn get(&self, col: &str) -> Result<&Breakpoints> {
        self.bkpts.get(col).ok_or_else(|| DataKitError::MissingBreakpoints {
            col: col.to_string(),
            reason: "breakpoints have not been derived".into(),
        })
    }

    pub fn set(&mut self, col: impl Into<String>, bkpts: Breakpoints) {
        self.bkpts.insert(col.into(), bkpts);
    }

    /// The single ascending array of `col`.
    pub fn values(&self, col: &str) -> Result<&[f64]> {
        match self.get(col)? {
            Breakpoints::Values(v) => Ok(v),
            Breakpoints::Scheduled(_) => Err(DataKitError::invalid(
                col,
                "breakpoints are scheduled; a slice index is required",
            )),
            Breakpoints::Labels(_) => Err(DataKitError::invalid(col, "breakpoints are text labels")),
        }
    }

    /// The breakpoints of `col` in slice `j`; unscheduled breakpoints are the
    /// same in every slice. Fails when the array is empty.
    pub fn slice(&self, col: &str, j: Option<usize>) -> Result<&[f64]> {
        let values: &[f64] = match (self.get(col)?, j) {
            (Breakpoints::Values(v), _) => v,
            (Breakpoints::Scheduled(v), Some(j)) => v.get(j).map(Vec::as_slice).ok_or_else(|| {
                DataKitError::invalid(col, format!("slice {} out of range ({} slices)", j, v.len()))
            })?,
            (Breakpoints::Scheduled(_), None) => {
                return Err(DataKitError::invalid(
                    col,
                    "breakpoints are scheduled; a slice index is required",
                ))
            }
            (Breakpoints::Labels(_), _) => {
                return Err(DataKitError::invalid(col, "breakpoints are text labels"))
            }
        };
        if values.is_empty() {
            return Err(DataKitError::MissingBreakpoints {
                col: col.to_string(),
                reason: match j {
                    Some(j) => format!("empty breakpoint array at slice {}", j),
                    None => "empty breakpoint array".into(),
                },
            });
        }
        Ok(values)
    }

    /// One breakpoint value: `[i]` for plain breakpoints, `[j, i]` for scheduled.
    pub fn get_bkpt(&self, col: &str, path: &[usize]) -> Result<f64> {
        let found = match (self.get(col)?, path) {
            (Breakpoints::Values(v), [i]) => v.get(*i).copied(),
            (Breakpoints::Scheduled(v), [j, i]) => v.get(*j).and_then(|s| s.get(*i)).copied(),
            _ => {
                return Err(DataKitError::invalid(
                    col,
                    format!("breakpoint index {:?} has the wrong depth", path),
                ))
            }
        };
        found.ok_or_else(|| DataKitError::invalid(col, format!("breakpoint index {:?} out of range", path)))
    }

    /// Brackets `v` in the plain breakpoints of `col`.
    pub fn bracket(&self, col: &str, v: f64, tol: f64) -> Result<Bracket> {
        let values = self.slice(col, None)?;
        bracket(values, v, tol).ok_or_else(|| DataKitError::MissingBreakpoints {
            col: col.to_string(),
            reason: "empty breakpoint array".into(),
        })
    }

    /// Derives breakpoints for each column from the data in `store`.
    ///
    /// Float columns are deduplicated within `params.tol` and filtered by
    /// `params.min_support`; integer columns keep every unique value; text
    /// columns keep their distinct labels.
    pub fn derive(&mut self, store: &ColumnStore, cols: &[String], params: &BreakpointParams) -> Result<()> {
        for col in cols {
            let bkpts = match store.get(col)? {
                Column::Float(v) => Breakpoints::Values(unique_with_support(v, params.min_support, params.tol)),
                Column::Int(v) => {
                    let mut u = v.clone();
                    u.sort_unstable();
                    u.dedup();
                    Breakpoints::Values(u.into_iter().map(|x| x as f64).collect())
                }
                Column::Text(v) => {
                    let mut u = v.clone();
                    u.sort();
                    u.dedup();
                    Breakpoints::Labels(u)
                }
                Column::Vector(_) => {
                    return Err(DataKitError::invalid(col.as_str(), "cannot derive breakpoints of a vector column"))
                }
            };
            debug!(col = col.as_str(), count = bkpts.len(), "derived breakpoints");
            self.bkpts.insert(col.clone(), bkpts);
        }
        Ok(())
    }

    /// Numeric schedule key values and breakpoints.
    fn schedule_key<'a>(&'a self, store: &'a ColumnStore, scol: &str) -> Result<(Vec<f64>, &'a [f64])> {
        let keys = self.values(scol)?;
        let column = store.float(scol)?.into_owned();
        Ok((column, keys))
    }

    /// For each breakpoint of `scol`, copies each column's value at the first
    /// row matching that breakpoint, so the columns follow `scol`'s order.
    pub fn map(&mut self, store: &ColumnStore, cols: &[String], scol: &str, tol: f64) -> Result<()> {
        let (v0, keys) = self.schedule_key(store, scol)?;
        let keys = keys.to_vec();
        for col in cols {
            let v = store.float(col)?;
            let mut mapped = Vec::with_capacity(keys.len());
            for &b in &keys {
                let i = v0
                    .iter()
                    .position(|x| (x - b).abs() <= tol)
                    .ok_or_else(|| DataKitError::EmptyMatch {
                        col: scol.to_string(),
                        context: format!("no rows matching {} = {:.4e}", scol, b),
                    })?;
                mapped.push(v[i]);
            }
            self.bkpts.insert(col.clone(), Breakpoints::Values(mapped));
        }
        Ok(())
    }

    /// Derives per-slice breakpoints for each column, one array per breakpoint
    /// of `scol`. Slices with fewer than `min_support` rows get an empty array.
    pub fn schedule(
        &mut self,
        store: &ColumnStore,
        cols: &[String],
        scol: &str,
        params: &BreakpointParams,
    ) -> Result<()> {
        let (v0, keys) = self.schedule_key(store, scol)?;
        let keys = keys.to_vec();
        for col in cols {
            let v = store.float(col)?;
            let mut slices = Vec::with_capacity(keys.len());
            for &b in &keys {
                let rows: Vec<f64> = v0
                    .iter()
                    .zip(v.iter())
                    .filter(|(x, _)| (*x - b).abs() <= params.tol)
                    .map(|(_, y)| *y)
                    .collect();
                if rows.is_empty() {
                    return Err(DataKitError::EmptyMatch {
                        col: scol.to_string(),
                        context: format!("no points matching slice at {} = {:.2e}", scol, b),
                    });
                }
                slices.push(match rows.len() < params.min_support {
                    true => Vec::new(),
                    false => unique_with_support(&rows, params.min_support, params.tol),
                });
            }
            debug!(col = col.as_str(), scol, slices = slices.len(), "scheduled breakpoints");
            self.bkpts.insert(col.clone(), Breakpoints::Scheduled(slices));
        }
        Ok(())
    }

    /// Brackets the master key `args[0]`, then rescales each remaining
    /// coordinate into the slice-local ranges of the two bracketing slices.
    pub fn scheduled_bracket(&self, args: &[String], x: &[f64], tols: ScheduleTolerances) -> Result<ScheduledBracket> {
        if args.len() < 2 || x.len() != args.len() {
            return Err(DataKitError::ShapeMismatch {
                context: "scheduled lookup needs a master key and at least one more argument".into(),
                expected: vec![args.len().max(2)],
                found: vec![x.len()],
            });
        }
        let skey = &args[0];
        let keys = self.slice(skey, None)?;
        let master = self.bracket(skey, x[0], tols.bracket_tol)?;
        if master.is_extrapolated() && !tols.extrap {
            return Err(DataKitError::OutOfBounds {
                arg: skey.clone(),
                value: x[0],
                min: keys[0],
                max: keys[keys.len() - 1],
            });
        }
        let (lo, hi) = master.interval(keys.len());
        let f = master.f;

        let mut x0 = Vec::with_capacity(args.len() - 1);
        let mut x1 = Vec::with_capacity(args.len() - 1);
        for (k, &xk) in args[1..].iter().zip(&x[1..]) {
            let s0 = self.slice(k, Some(lo))?;
            let s1 = self.slice(k, Some(hi))?;
            let (xmin0, xmax0) = (s0[0], s0[s0.len() - 1]);
            let (xmin1, xmax1) = (s1[0], s1[s1.len() - 1]);

            let xmin = (1.0 - f) * xmin0 + f * xmin1;
            let xmax = (1.0 - f) * xmax0 + f * xmax1;
            let range = xmax - xmin;

            let (fj, outside) = match range == 0.0 {
                true => (0.0, (xk - xmin).abs() > tols.schedule_tol),
                false => {
                    let fj = (xk - xmin) / range;
                    (fj, fj < -tols.schedule_tol || fj - 1.0 > tols.schedule_tol)
                }
            };
            if outside && !tols.extrap {
                return Err(DataKitError::OutOfBounds {
                    arg: k.clone(),
                    value: xk,
                    min: xmin,
                    max: xmax,
                });
            }
            x0.push((1.0 - fj) * xmin0 + fj * xmax0);
            x1.push((1.0 - fj) * xmin1 + fj * xmax1);
        }

        Ok(ScheduledBracket { master, lo, hi, f, x0, x1 })
    }

    /// Cartesian product of the breakpoints of `cols`, with the first column
    /// varying slowest.
    ///
    /// With `slice_cols`, the product is built once per breakpoint of the first
    /// slice column (using that slice's scheduled breakpoints where present) and
    /// the slice-defining values are returned in `slices`. When `cols` is `None`
    /// every column with plain numeric breakpoints is used.
    pub fn full_factorial(&self, cols: Option<&[String]>, slice_cols: &[String]) -> Result<FullFactorial> {
        let maincol = slice_cols.first();

        let mut cols: Vec<String> = match cols {
            Some(cols) => {
                for col in cols {
                    if self.get(col)?.is_empty() {
                        return Err(DataKitError::MissingBreakpoints {
                            col: col.clone(),
                            reason: "empty breakpoint array".into(),
                        });
                    }
                    if let Breakpoints::Labels(_) = self.get(col)? {
                        return Err(DataKitError::invalid(col.as_str(), "non-numeric breakpoints"));
                    }
                }
                cols.to_vec()
            }
            None => self
                .bkpts
                .iter()
                .filter(|(_, b)| matches!(b, Breakpoints::Values(v) if !v.is_empty()))
                .map(|(k, _)| k.clone())
                .collect(),
        };
        if let Some(m) = maincol {
            cols.retain(|c| c != m);
        }

        let masters: Vec<Option<f64>> = match maincol {
            Some(m) => self.slice(m, None)?.iter().map(|&v| Some(v)).collect(),
            None => vec![None],
        };

        let mut out = FullFactorial::default();
        if let Some(m) = maincol {
            out.cols.push(m.clone());
            out.values.insert(m.clone(), Vec::new());
            for s in slice_cols {
                out.slices.insert(s.clone(), Vec::new());
            }
        }
        for col in &cols {
            out.cols.push(col.clone());
            out.values.insert(col.clone(), Vec::new());
        }

        for (im, m) in masters.iter().enumerate() {
            let j = m.map(|_| im);
            let mut xm: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
            for col in &cols {
                xm.insert(col.as_str(), self.slice(col, j)?.to_vec());
            }
            let mut xs: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
            if let (Some(mcol), Some(mv)) = (maincol, m) {
                xs.insert(mcol.as_str(), vec![*mv]);
                for sub in &slice_cols[1..] {
                    xs.insert(sub.as_str(), xm.get(sub.as_str()).cloned().unwrap_or_default());
                }
            }

            pairwise_product(&mut xm, &cols);
            pairwise_product(&mut xs, slice_cols);

            let npts = cols.last().and_then(|c| xm.get(c.as_str())).map_or(1, Vec::len);
            for col in &cols {
                if let (Some(dst), Some(src)) = (out.values.get_mut(col), xm.get(col.as_str())) {
                    dst.extend_from_slice(src);
                }
            }
            if let (Some(mcol), Some(mv)) = (maincol, m) {
                if let Some(dst) = out.values.get_mut(mcol) {
                    dst.extend(std::iter::repeat(*mv).take(npts));
                }
                for s in slice_cols {
                    if let (Some(dst), Some(src)) = (out.slices.get_mut(s), xs.get(s.as_str())) {
                        dst.extend_from_slice(src);
                    }
                }
            }
        }

        Ok(out)
    }
}

/// Iterative pairwise broadcast-and-flatten: after step `i`, columns
/// `0..=i` all have length `prod(N[0..=i])` with column 0 varying slowest.
fn pairwise_product<'a>(x: &mut BTreeMap<&'a str, Vec<f64>>, cols: &'a [String]) {
    for i in 1..cols.len() {
        let col1 = cols[i].as_str();
        for j in 0..i {
            let col2 = cols[j].as_str();
            let (a, b) = match (x.get(col1), x.get(col2)) {
                (Some(a), Some(b)) => (a.clone(), b.clone()),
                _ => continue,
            };
            let repeated: Vec<f64> = b.iter().flat_map(|&bv| std::iter::repeat(bv).take(a.len())).collect();
            x.insert(col2, repeated);
            if j == i - 1 {
                let tiled: Vec<f64> = (0..b.len()).flat_map(|_| a.iter().copied()).collect();
                x.insert(col1, tiled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use equator::assert;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn bracket_below_range_extrapolates() {
        let b = bracket(&[1.0, 2.0, 3.0], 0.0, 1e-8).unwrap();
        assert!(b.i0.is_none());
        assert!(b.i1 == Some(0));
        assert!(b.f == -1.0);
    }

    #[test]
    fn bracket_above_range_extrapolates() {
        let b = bracket(&[1.0, 2.0, 3.0], 3.5, 1e-8).unwrap();
        assert!(b.i0 == Some(2));
        assert!(b.i1.is_none());
        assert!(b.f == 1.5);
        assert!(b.interval(3) == (1, 2));
    }

    #[test]
    fn bracket_at_ends_and_breakpoints() {
        let v = [0.5, 0.8, 1.2];
        assert!(bracket(&v, 0.5, 1e-8).unwrap() == Bracket { i0: Some(0), i1: Some(1), f: 0.0 });
        assert!(bracket(&v, 0.8, 1e-8).unwrap() == Bracket { i0: Some(1), i1: Some(2), f: 0.0 });
        assert!(bracket(&v, 1.2, 1e-8).unwrap() == Bracket { i0: Some(1), i1: Some(2), f: 1.0 });

        // Within tolerance just below the minimum.
        let b = bracket(&v, 0.5 - 1e-10, 1e-8).unwrap();
        assert!(b.i0 == Some(0));
        assert!(b.f < 0.0);

        assert!(bracket(&[], 1.0, 1e-8).is_none());
        assert!(bracket(&[2.0], 2.0, 1e-8).unwrap() == Bracket { i0: Some(0), i1: Some(0), f: 0.0 });
        assert!(bracket(&[2.0], 3.0, 1e-8).unwrap().i1.is_none());
    }

    #[test]
    fn bracket_interior_property() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let n = rng.random_range(2..12);
            let mut v: Vec<f64> = Vec::with_capacity(n);
            let mut x = rng.random_range(-10.0..10.0);
            for _ in 0..n {
                v.push(x);
                x += rng.random_range(0.01..3.0);
            }
            let target = rng.random_range(v[0]..v[n - 1]);
            if target <= v[0] {
                continue;
            }
            let b = bracket(&v, target, 1e-8).unwrap();
            let i0 = b.i0.unwrap();
            assert!(b.i1 == Some(i0 + 1));
            assert!(v[i0] <= target);
            assert!(target <= v[i0 + 1]);
            assert!(0.0 <= b.f);
            assert!(b.f <= 1.0);
        }
    }

    #[test]
    fn strict_bracket_reports_bounds() {
        let err = bracket_strict(&[0.0, 1.0], 2.0, 1e-8, "alpha").unwrap_err();
        match err {
            DataKitError::OutOfBounds { arg, value, min, max } => {
                assert!(arg == "alpha");
                assert!(value == 2.0);
                assert!(min == 0.0);
                assert!(max == 1.0);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unique_values_merge_and_filter_support() {
        let v = [1.0, 1.0 + 1e-14, 1.0, 2.0, 2.0, 3.0];
        assert!(unique_with_support(&v, 1, 1e-12) == vec![1.0, 2.0, 3.0]);
        assert!(unique_with_support(&v, 2, 1e-12) == vec![1.0, 2.0]);
        assert!(unique_with_support(&v, 3, 1e-12) == vec![1.0]);
    }

    fn sched_store() -> ColumnStore {
        // mach 0.5: alpha -2..2 ; mach 1.0: alpha 0..4
        let mut mach = Vec::new();
        let mut alpha = Vec::new();
        for (m, a0) in [(0.5, -2.0), (1.0, 0.0)] {
            for i in 0..5 {
                mach.push(m);
                alpha.push(a0 + i as f64);
            }
        }
        ColumnStore::from_columns([("mach", Column::Float(mach)), ("alpha", Column::Float(alpha))]).unwrap()
    }

    #[test]
    fn derive_map_and_schedule() {
        let store = sched_store();
        let mut table = BreakpointTable::new();
        table.derive(&store, &s(&["mach"]), &BreakpointParams::default()).unwrap();
        assert!(table.values("mach").unwrap().to_vec() == vec![0.5, 1.0]);

        table.schedule(&store, &s(&["alpha"]), "mach", &BreakpointParams::new(1, 1e-12)).unwrap();
        assert!(table.slice("alpha", Some(0)).unwrap().to_vec() == vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
        assert!(table.slice("alpha", Some(1)).unwrap().to_vec() == vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert!(table.get_bkpt("alpha", &[1, 4]).unwrap() == 4.0);
        assert!(table.get_bkpt("alpha", &[4]).is_err());

        table.map(&store, &s(&["alpha"]), "mach", 1e-12).unwrap();
        assert!(table.values("alpha").unwrap().to_vec() == vec![-2.0, 0.0]);
    }

    #[test]
    fn sparse_slices_get_empty_breakpoints() {
        let store = sched_store();
        let mut table = BreakpointTable::new();
        table.derive(&store, &s(&["mach"]), &BreakpointParams::new(1, 1e-12)).unwrap();
        table.schedule(&store, &s(&["alpha"]), "mach", &BreakpointParams::new(6, 1e-12)).unwrap();
        assert!(matches!(
            table.slice("alpha", Some(0)),
            Err(DataKitError::MissingBreakpoints { .. })
        ));
    }

    #[test]
    fn scheduled_bracket_rescales_into_slices() {
        let store = sched_store();
        let mut table = BreakpointTable::new();
        table.derive(&store, &s(&["mach"]), &BreakpointParams::new(1, 1e-12)).unwrap();
        table.schedule(&store, &s(&["alpha"]), "mach", &BreakpointParams::new(1, 1e-12)).unwrap();
        let tols = ScheduleTolerances { bracket_tol: 1e-8, schedule_tol: 1e-3, extrap: false };

        // Halfway in mach: alpha range is [-1, 3]; alpha=1 is the midpoint.
        let sb = table.scheduled_bracket(&s(&["mach", "alpha"]), &[0.75, 1.0], tols).unwrap();
        assert!((sb.lo, sb.hi) == (0, 1));
        assert_approx_eq!(sb.f, 0.5);
        assert_approx_eq!(sb.x0[0], 0.0);
        assert_approx_eq!(sb.x1[0], 2.0);

        // At a master breakpoint the lookup is unchanged.
        let sb = table.scheduled_bracket(&s(&["mach", "alpha"]), &[0.5, -1.5], tols).unwrap();
        assert!(sb.f == 0.0);
        assert_approx_eq!(sb.x0[0], -1.5);

        let err = table.scheduled_bracket(&s(&["mach", "alpha"]), &[0.75, 3.5], tols).unwrap_err();
        assert!(matches!(err, DataKitError::OutOfBounds { .. }));

        let err = table.scheduled_bracket(&s(&["mach", "alpha"]), &[1.5, 0.0], tols).unwrap_err();
        assert!(matches!(err, DataKitError::OutOfBounds { .. }));

        let loose = ScheduleTolerances { extrap: true, ..tols };
        let sb = table.scheduled_bracket(&s(&["mach", "alpha"]), &[1.5, 0.0], loose).unwrap();
        assert!((sb.lo, sb.hi) == (0, 1));
        assert_approx_eq!(sb.f, 2.0);
    }

    #[test]
    fn full_factorial_first_column_slowest() {
        let mut table = BreakpointTable::new();
        table.set("a", Breakpoints::Values(vec![1.0, 2.0]));
        table.set("b", Breakpoints::Values(vec![10.0, 20.0, 30.0]));
        table.set("c", Breakpoints::Values(vec![0.0, 1.0]));

        let ff = table.full_factorial(Some(&s(&["a", "b", "c"])), &[]).unwrap();
        assert!(ff.len() == 12);
        assert!(ff.values["a"] == vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0]);
        assert!(ff.values["b"][..6].to_vec() == vec![10.0, 10.0, 20.0, 20.0, 30.0, 30.0]);
        assert!(ff.values["c"][..4].to_vec() == vec![0.0, 1.0, 0.0, 1.0]);
        assert!(ff.slices.is_empty());
    }

    #[test]
    fn full_factorial_with_schedule() {
        let store = sched_store();
        let mut table = BreakpointTable::new();
        table.derive(&store, &s(&["mach"]), &BreakpointParams::new(1, 1e-12)).unwrap();
        table.schedule(&store, &s(&["alpha"]), "mach", &BreakpointParams::new(1, 1e-12)).unwrap();
        table.set("beta", Breakpoints::Values(vec![0.0, 5.0]));

        let ff = table
            .full_factorial(Some(&s(&["mach", "alpha", "beta"])), &s(&["mach"]))
            .unwrap();
        assert!(ff.cols == s(&["mach", "alpha", "beta"]));
        assert!(ff.len() == 20);
        assert!(ff.values["mach"][9] == 0.5);
        assert!(ff.values["mach"][10] == 1.0);
        assert!(ff.values["alpha"][0] == -2.0);
        assert!(ff.values["alpha"][10] == 0.0);
        assert!(ff.values["beta"][..4].to_vec() == vec![0.0, 5.0, 0.0, 5.0]);
        assert!(ff.slices["mach"] == vec![0.5, 1.0]);
    }
}
