/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines the error type returned when an RBF interpolant cannot be fitted.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

use std::fmt;

/// Errors raised by an [`RbfFit`](crate::RbfFit) implementation.
#[derive(Debug, Clone, PartialEq)]
pub enum FitError {
    /// Fewer source points than the kernel system needs.
    TooFewPoints { found: usize, required: usize },

    /// Point and value arrays disagree in length, or the points have no columns.
    DimensionMismatch { points: usize, values: usize, dims: usize },

    /// The kernel system could not be solved to a finite set of weights.
    SingularSystem { num_points: usize },

    /// A settings value was out of range (e.g. a negative or non-finite epsilon).
    InvalidSettings { reason: String },
}

impl fmt::Display for FitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitError::TooFewPoints { found, required } => {
                write!(f, "RBF fit needs at least {} points, found {}", required, found)
            }
            FitError::DimensionMismatch { points, values, dims } => write!(
                f,
                "RBF fit given {} points in {} dimensions but {} values",
                points, dims, values
            ),
            FitError::SingularSystem { num_points } => write!(
                f,
                "RBF system with {} points is singular or produced non-finite weights",
                num_points
            ),
            FitError::InvalidSettings { reason } => write!(f, "invalid RBF settings: {}", reason),
        }
    }
}

impl std::error::Error for FitError {}
