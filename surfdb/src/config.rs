/////////////////////////////////////////////////////////////////////////////////////////////
//
// Declares option types for evaluation, breakpoint derivation, RBF construction and search.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Declares option types for evaluation, breakpoint derivation, RBF construction and search.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use surfdb_rbf::RbfSettings;

use crate::error::{DataKitError, Result};

/// Keyword options forwarded to the evaluation algorithms.
///
/// ### Default Values
/// - `tol`: `1e-4` (exact match)
/// - `slice_tol`: `1e-6` (rows belonging to a schedule slice)
/// - `bracket_tol`: `1e-8` (relative to the breakpoint range)
/// - `schedule_tol`: `1e-3` (on the rescaled scheduled fraction)
/// - `extrap`: `false`
///
/// The bracket and schedule tolerances act on different quantities and are kept
/// separate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalOptions {
    /// Default absolute tolerance for exact matching.
    pub tol: f64,

    /// Per-argument overrides of `tol`.
    pub tols: BTreeMap<String, f64>,

    /// Per-argument weights for the nearest-neighbour distance (default `1.0`).
    pub weights: BTreeMap<String, f64>,

    /// Tolerance used to collect the rows of one schedule slice.
    pub slice_tol: f64,

    /// Relative tolerance before a bracket search reports extrapolation.
    pub bracket_tol: f64,

    /// Tolerance on the rescaled fraction of a scheduled lookup.
    pub schedule_tol: f64,

    /// Allow scheduled and sliced lookups beyond the breakpoint range.
    pub extrap: bool,
}

impl Default for EvalOptions {
    fn default() -> Self {
        EvalOptions {
            tol: 1e-4,
            tols: BTreeMap::new(),
            weights: BTreeMap::new(),
            slice_tol: 1e-6,
            bracket_tol: 1e-8,
            schedule_tol: 1e-3,
            extrap: false,
        }
    }
}

impl EvalOptions {
    pub fn builder() -> EvalOptionsBuilder {
        EvalOptionsBuilder::default()
    }

    pub fn tol_for(&self, arg: &str) -> f64 {
        self.tols.get(arg).copied().unwrap_or(self.tol)
    }

    pub fn weight_for(&self, arg: &str) -> f64 {
        self.weights.get(arg).copied().unwrap_or(1.0)
    }
}

/// Builder for [`EvalOptions`].
#[derive(Clone, Debug, Default)]
pub struct EvalOptionsBuilder {
    options: EvalOptions,
}

impl EvalOptionsBuilder {
    pub fn tol(mut self, tol: f64) -> Self {
        self.options.tol = tol;
        self
    }

    pub fn arg_tol(mut self, arg: impl Into<String>, tol: f64) -> Self {
        self.options.tols.insert(arg.into(), tol);
        self
    }

    pub fn weight(mut self, arg: impl Into<String>, weight: f64) -> Self {
        self.options.weights.insert(arg.into(), weight);
        self
    }

    pub fn slice_tol(mut self, tol: f64) -> Self {
        self.options.slice_tol = tol;
        self
    }

    pub fn bracket_tol(mut self, tol: f64) -> Self {
        self.options.bracket_tol = tol;
        self
    }

    pub fn schedule_tol(mut self, tol: f64) -> Self {
        self.options.schedule_tol = tol;
        self
    }

    pub fn extrap(mut self, extrap: bool) -> Self {
        self.options.extrap = extrap;
        self
    }

    pub fn build(self) -> EvalOptions {
        self.options
    }
}

/// Parameters for deriving breakpoints from data.
///
/// ### Default Values
/// - `min_support`: `5`
/// - `tol`: `1e-12`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakpointParams {
    /// Minimum number of rows that must carry a value for it to become a breakpoint.
    pub min_support: usize,

    /// Values closer than this are merged into one breakpoint.
    pub tol: f64,
}

impl Default for BreakpointParams {
    fn default() -> Self {
        BreakpointParams { min_support: 5, tol: 1e-12 }
    }
}

impl BreakpointParams {
    pub fn new(min_support: usize, tol: f64) -> Self {
        BreakpointParams { min_support, tol }
    }
}

/// Parameters for building RBF interpolants for a column.
///
/// ### Default Values
/// - `settings`: cubic kernel, no smoothing
/// - `tol`: `1e-6` (rows belonging to a slice of the first argument)
/// - `rows`: all rows
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RbfParams {
    pub settings: RbfSettings,

    /// Default slice-matching tolerance.
    pub tol: f64,

    /// Per-key overrides of `tol`.
    pub tols: BTreeMap<String, f64>,

    /// Restrict the fit to these rows.
    pub rows: Option<Vec<usize>>,
}

impl Default for RbfParams {
    fn default() -> Self {
        RbfParams {
            settings: RbfSettings::default(),
            tol: 1e-6,
            tols: BTreeMap::new(),
            rows: None,
        }
    }
}

impl RbfParams {
    pub fn new(settings: RbfSettings) -> Self {
        RbfParams { settings, ..RbfParams::default() }
    }

    pub fn with_rows(mut self, rows: Vec<usize>) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn with_slice_tol(mut self, key: impl Into<String>, tol: f64) -> Self {
        self.tols.insert(key.into(), tol);
        self
    }

    pub fn slice_tol(&self, key: &str) -> f64 {
        self.tols.get(key).copied().unwrap_or(self.tol)
    }
}

/// How [`DataKit::find`](crate::DataKit::find) combines matches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Union of all rows matching any test point.
    #[default]
    All,
    /// The matching rows of each test point that found any.
    Mapped,
    /// At most one previously unused row per test point.
    Once,
}

/// A subset of rows, given either as indices or as one flag per row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowMask {
    Indices(Vec<usize>),
    Flags(Vec<bool>),
}

impl RowMask {
    /// The selected row indices, checked against a table of `n` rows.
    pub fn resolve(&self, n: usize) -> Result<Vec<usize>> {
        match self {
            RowMask::Indices(idx) => {
                if idx.is_empty() {
                    return Err(DataKitError::invalid("mask", "index mask cannot be empty"));
                }
                match idx.iter().max() {
                    Some(&imax) if imax >= n => Err(DataKitError::invalid(
                        "mask",
                        format!("cannot access element {} of array with length {}", imax, n),
                    )),
                    _ => Ok(idx.clone()),
                }
            }
            RowMask::Flags(flags) => {
                if flags.is_empty() {
                    return Err(DataKitError::invalid("mask", "index mask cannot be empty"));
                }
                if flags.len() != n {
                    return Err(DataKitError::ShapeMismatch {
                        context: "bool index mask".into(),
                        expected: vec![n],
                        found: vec![flags.len()],
                    });
                }
                Ok(flags
                    .iter()
                    .enumerate()
                    .filter_map(|(i, &keep)| keep.then_some(i))
                    .collect())
            }
        }
    }
}

/// Options for [`DataKit::find`](crate::DataKit::find).
///
/// ### Default Values
/// - `tol`: `1e-4`
/// - `mode`: [`MatchMode::All`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindOptions {
    pub tol: f64,
    pub tols: BTreeMap<String, f64>,
    pub mode: MatchMode,

    /// Only search these rows of the store.
    pub mask: Option<RowMask>,
}

impl Default for FindOptions {
    fn default() -> Self {
        FindOptions {
            tol: 1e-4,
            tols: BTreeMap::new(),
            mode: MatchMode::All,
            mask: None,
        }
    }
}

impl FindOptions {
    pub fn tol_for(&self, arg: &str) -> f64 {
        self.tols.get(arg).copied().unwrap_or(self.tol)
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_mask(mut self, mask: RowMask) -> Self {
        self.mask = Some(mask);
        self
    }
}

/// Options for comparing two kits row by row (coverage and range estimates).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairwiseOptions {
    /// Tolerances and mask applied to this kit's rows.
    pub find: FindOptions,

    /// Rows of the other kit to consider.
    pub target_mask: Option<RowMask>,

    /// Columns used to pair rows; defaults to every float column of this kit.
    pub search_cols: Option<Vec<String>>,
}

/// Options for [`DataKit::regularize_by_rbf`](crate::DataKit::regularize_by_rbf).
///
/// ### Default Values
/// - `settings`: cubic kernel, no smoothing
/// - `slice_col`: none (one global fit per column)
/// - `slice_tol`: `1e-6`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegularizeOptions {
    pub settings: RbfSettings,

    /// Fit one interpolant per breakpoint of this column instead of a global one.
    pub slice_col: Option<String>,

    /// Tolerance used to collect the source rows of one slice.
    pub slice_tol: f64,

    pub prefix: Option<String>,
    pub suffix: Option<String>,

    /// Explicit renames, applied before `prefix` and `suffix`.
    pub translators: BTreeMap<String, String>,
}

impl Default for RegularizeOptions {
    fn default() -> Self {
        RegularizeOptions {
            settings: RbfSettings::default(),
            slice_col: None,
            slice_tol: 1e-6,
            prefix: None,
            suffix: None,
            translators: BTreeMap::new(),
        }
    }
}

impl RegularizeOptions {
    /// The name a source column takes in the regularized kit.
    pub fn translate(&self, col: &str) -> String {
        let base = self.translators.get(col).map_or(col, String::as_str);
        format!(
            "{}{}{}",
            self.prefix.as_deref().unwrap_or(""),
            base,
            self.suffix.as_deref().unwrap_or("")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equator::assert;
    use surfdb_rbf::RbfKernelType;

    #[test]
    fn eval_options_defaults_and_overrides() {
        let opts = EvalOptions::builder().arg_tol("mach", 0.01).weight("alpha", 4.0).build();
        assert!(opts.tol_for("mach") == 0.01);
        assert!(opts.tol_for("alpha") == 1e-4);
        assert!(opts.weight_for("alpha") == 4.0);
        assert!(opts.weight_for("beta") == 1.0);
        assert!(opts.bracket_tol == 1e-8);
        assert!(opts.schedule_tol == 1e-3);
        assert!(!opts.extrap);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let opts: EvalOptions = serde_json::from_str(r#"{"extrap": true, "tols": {"q": 2.0}}"#).unwrap();
        assert!(opts.extrap);
        assert!(opts.tol_for("q") == 2.0);
        assert!(opts.slice_tol == 1e-6);

        let params: RbfParams =
            serde_json::from_str(r#"{"settings": {"kernel_type": "linear"}, "tol": 0.5}"#).unwrap();
        assert!(params.settings.kernel_type == RbfKernelType::Linear);
        assert!(params.slice_tol("mach") == 0.5);

        let find: FindOptions = serde_json::from_str(r#"{"mode": "once"}"#).unwrap();
        assert!(find.mode == MatchMode::Once);
        assert!(find.tol == 1e-4);
    }

    #[test]
    fn row_mask_resolution() {
        assert!(RowMask::Flags(vec![true, false, true]).resolve(3).unwrap() == vec![0, 2]);
        assert!(RowMask::Flags(vec![true]).resolve(3).is_err());
        assert!(RowMask::Indices(vec![4, 1]).resolve(5).unwrap() == vec![4, 1]);
        assert!(RowMask::Indices(vec![5]).resolve(5).is_err());
        assert!(RowMask::Indices(vec![]).resolve(5).is_err());
    }

    #[test]
    fn regularize_names() {
        let mut opts = RegularizeOptions {
            prefix: Some("reg.".into()),
            ..RegularizeOptions::default()
        };
        opts.translators.insert("CN".into(), "CLN".into());
        assert!(opts.translate("CN") == "reg.CLN");
        assert!(opts.translate("mach") == "reg.mach");
    }
}
