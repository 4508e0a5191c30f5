/////////////////////////////////////////////////////////////////////////////////////////////
//
// Re-exports the RBF fitting capability, kernels and settings used by the surfdb crate.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # surfdb_rbf
//!
//! The scattered-data fitting capability that the `surfdb` response-surface
//! database delegates to when a column is declared with one of the RBF methods.
//!
//! The database only ever talks to the [`RbfFit`] and [`Interpolant`] traits, so
//! the dense solver provided here ([`DirectRbfFitter`]) can be swapped for any
//! other implementation.
//!
//! ```
//! use faer::Mat;
//! use surfdb_rbf::{DirectRbfFitter, RbfFit, RbfKernelType, RbfSettings};
//!
//! let points = Mat::from_fn(5, 1, |i, _| i as f64);
//! let values: Vec<f64> = (0..5).map(|i| (i * i) as f64).collect();
//! let settings = RbfSettings::builder(RbfKernelType::Cubic).build();
//!
//! let rbf = DirectRbfFitter.fit(points.as_ref(), &values, &settings).unwrap();
//! assert!((rbf.evaluate(&[2.0]) - 4.0).abs() < 1e-8);
//! ```
mod error;
mod fit;
mod kernels;
mod settings;

pub use {
    error::FitError,
    fit::{DirectRbfFitter, Interpolant, RbfFit, ScatteredRbf, default_epsilon, get_distance},
    kernels::RbfKernelType,
    settings::{RbfSettings, RbfSettingsBuilder},
};
