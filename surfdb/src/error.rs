/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines the error type shared by every response-surface database operation.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

use std::fmt;

use surfdb_rbf::FitError;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DataKitError>;

/// Errors raised by [`DataKit`](crate::DataKit) and its components.
///
/// Every variant carries the offending column or argument name and, where
/// relevant, the violated bound or shape.
#[derive(Debug)]
pub enum DataKitError {
    /// A requested column is absent and cannot be derived.
    MissingColumn { col: String },

    /// A declared argument could not be resolved from any source.
    MissingArgument { arg: String, col: String },

    /// Breakpoints for `col` were never derived, or are empty where values are needed.
    MissingBreakpoints { col: String, reason: String },

    /// Inputs or stored data do not have compatible shapes.
    ShapeMismatch {
        context: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// A lookup value fell outside the breakpoint range of an argument.
    OutOfBounds {
        arg: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// The method name is not one of the evaluation methods for this output size.
    InvalidMethod {
        method: String,
        ndim: usize,
        valid: Vec<&'static str>,
    },

    /// A column was evaluated before any method was declared for it.
    Undeclared { col: String },

    /// A value had the wrong type or an index was out of range.
    InvalidArgument { name: String, reason: String },

    /// An RBF interpolant could not be built.
    ConstructionFailure {
        col: String,
        reason: String,
        source: Option<FitError>,
    },

    /// An exact-match lookup or search found no rows.
    EmptyMatch { col: String, context: String },
}

impl DataKitError {
    pub(crate) fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        DataKitError::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing_column(col: impl Into<String>) -> Self {
        DataKitError::MissingColumn { col: col.into() }
    }

    pub(crate) fn construction(col: &str, err: FitError) -> Self {
        DataKitError::ConstructionFailure {
            col: col.to_string(),
            reason: err.to_string(),
            source: Some(err),
        }
    }
}

impl fmt::Display for DataKitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataKitError::MissingColumn { col } => write!(f, "column '{}' is not present", col),
            DataKitError::MissingArgument { arg, col } => write!(
                f,
                "could not determine value for argument '{}' of column '{}'",
                arg, col
            ),
            DataKitError::MissingBreakpoints { col, reason } => {
                write!(f, "no usable breakpoints for column '{}': {}", col, reason)
            }
            DataKitError::ShapeMismatch {
                context,
                expected,
                found,
            } => write!(
                f,
                "{}: expected shape {:?}, found {:?}",
                context, expected, found
            ),
            DataKitError::OutOfBounds {
                arg,
                value,
                min,
                max,
            } => write!(
                f,
                "value {}={:.4e} is outside bounds [{:.4e}, {:.4e}]",
                arg, value, min, max
            ),
            DataKitError::InvalidMethod { method, ndim, valid } => write!(
                f,
                "no {}-D eval method '{}'; valid methods are: {}",
                ndim,
                method,
                valid.join(", ")
            ),
            DataKitError::Undeclared { col } => {
                write!(f, "no evaluation method declared for column '{}'", col)
            }
            DataKitError::InvalidArgument { name, reason } => {
                write!(f, "invalid argument '{}': {}", name, reason)
            }
            DataKitError::ConstructionFailure { col, reason, .. } => {
                write!(f, "failed to construct RBF for '{}': {}", col, reason)
            }
            DataKitError::EmptyMatch { col, context } => {
                write!(f, "no matches for '{}': {}", col, context)
            }
        }
    }
}

impl std::error::Error for DataKitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataKitError::ConstructionFailure {
                source: Some(source),
                ..
            } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equator::assert;
    use std::error::Error;

    #[test]
    fn messages_name_the_offender() {
        let err = DataKitError::OutOfBounds {
            arg: "mach".into(),
            value: 2.0,
            min: 0.5,
            max: 1.2,
        };
        let msg = err.to_string();
        assert!(msg.contains("mach"));
        assert!(msg.contains("1.2000e0"));

        let err = DataKitError::MissingArgument {
            arg: "alpha".into(),
            col: "CA".into(),
        };
        assert!(err.to_string().contains("'alpha'"));
    }

    #[test]
    fn construction_failure_exposes_fit_error() {
        let err = DataKitError::construction("CN", FitError::TooFewPoints { found: 1, required: 2 });
        assert!(err.source().is_some());
        assert!(err.to_string().contains("CN"));
    }
}
