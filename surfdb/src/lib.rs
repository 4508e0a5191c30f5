/////////////////////////////////////////////////////////////////////////////////////////////
//
// Exposes the public API and high-level documentation for the response-surface database.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # In-memory response-surface database.
//!
//! A [`DataKit`] stores sampled responses (aerodynamic coefficients, for
//! example) as named columns alongside the conditions they were sampled at.
//! Each response column can be declared with an evaluation method and an
//! ordered argument list, after which it can be called like a function:
//!
//! - **exact** - stored rows matching every argument within tolerance
//! - **nearest** - the stored row closest in weighted Euclidean distance
//! - **multilinear** - interpolation on a full-factorial grid of breakpoints
//! - **multilinear-schedule** - interpolation where the breakpoints of the
//!   secondary arguments vary with a master argument
//! - **rbf**, **rbf-linear**, **rbf-map** - radial basis function surrogates,
//!   global or per slice of the first argument
//! - **function** - a user callback receiving the kit and the lookup point
//!
//! Argument values come from positional or keyword inputs, registered
//! converters, or registered defaults, and are broadcast to a common shape
//! before evaluation.
//!
//! The scattered-data fitting itself lives behind the [`RbfFit`] and
//! [`Interpolant`] traits of the `surfdb_rbf` crate.
//!
//! # Examples
//!
//! ```
//! use surfdb::{BreakpointParams, CallArgs, Column, ColumnStore, DataKit, Declaration};
//!
//! let mut mach = Vec::new();
//! let mut alpha = Vec::new();
//! let mut ca = Vec::new();
//! for m in [0.5, 0.8, 1.2] {
//!     for a in [-2.0, 0.0, 2.0, 4.0] {
//!         mach.push(m);
//!         alpha.push(a);
//!         ca.push(0.2 + 0.3 * m - 0.01 * a);
//!     }
//! }
//!
//! let store = ColumnStore::from_columns([
//!     ("mach", Column::Float(mach)),
//!     ("alpha", Column::Float(alpha)),
//!     ("CA", Column::Float(ca)),
//! ])
//! .unwrap();
//!
//! let mut kit = DataKit::builder(store).build();
//! kit.get_bkpts(["mach", "alpha"], &BreakpointParams::new(1, 1e-8)).unwrap();
//! kit.declare("CA", Declaration::new("linear", ["mach", "alpha"])).unwrap();
//!
//! // Scalar call
//! let v = kit.evaluate("CA", &CallArgs::new().arg(0.8).arg(1.0)).unwrap();
//! assert!((v.scalar().unwrap() - 0.43).abs() < 1e-12);
//!
//! // Vectorized call, with the column name as the first positional value
//! let v = kit
//!     .call(&CallArgs::for_col("CA").arg(1.2).arg(vec![0.0, 3.0]))
//!     .unwrap();
//! assert_eq!(v.shape, vec![2]);
//! ```
mod args;
mod breakpoints;
mod config;
pub mod convert;
mod datakit;
mod dispatch;
mod error;
mod find;
pub mod interp;
mod metadata;
mod progress;
pub mod rbf;
pub mod stats;
mod store;
mod value;

pub use {
    args::{
        normalize_args, prep_colname, ArgValue, ArgView, Array, CallArgs, NormalizedArgs,
        ResolveMode,
    },
    breakpoints::{
        bracket, bracket_strict, unique_with_support, Bracket, BreakpointTable, Breakpoints,
        FullFactorial, ScheduleTolerances, ScheduledBracket,
    },
    config::{
        BreakpointParams, EvalOptions, EvalOptionsBuilder, FindOptions, MatchMode, PairwiseOptions,
        RbfParams, RegularizeOptions, RowMask,
    },
    datakit::{DataKit, DataKitBuilder, MatchedValues},
    error::{DataKitError, Result},
    find::{FindOutput, RowMatches},
    metadata::{
        Converter, Declaration, EvalFunction, EvalMethod, Metadata, ResponseDef, ResponseState,
    },
    progress::{closure_sink, ClosureSink, ProgressMsg, ProgressSink},
    rbf::{RbfNode, RbfTable},
    store::{Column, ColumnKind, ColumnStore, Definition},
    value::{Evaluation, Value},
};

pub use surfdb_rbf::{DirectRbfFitter, FitError, Interpolant, RbfFit, RbfKernelType, RbfSettings};
