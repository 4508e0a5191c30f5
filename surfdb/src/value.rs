/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines the values returned by column evaluation.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

use serde::{Deserialize, Serialize};

use crate::error::{DataKitError, Result};

/// The value of a column at one lookup point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Scalar output.
    Scalar(f64),
    /// Vector output (one entry per output station).
    Vector(Vec<f64>),
    /// Several stored rows matched an exact lookup.
    Multiple(Vec<Value>),
}

impl Value {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            Value::Vector(v) => Some(v),
            _ => None,
        }
    }

    /// Linear blend `(1 - f) * self + f * other`.
    pub fn blend(&self, other: &Value, f: f64) -> Result<Value> {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar((1.0 - f) * a + f * b)),
            (Value::Vector(a), Value::Vector(b)) if a.len() == b.len() => Ok(Value::Vector(
                a.iter().zip(b).map(|(a, b)| (1.0 - f) * a + f * b).collect(),
            )),
            (Value::Vector(a), Value::Vector(b)) => Err(DataKitError::ShapeMismatch {
                context: "blending vector outputs".into(),
                expected: vec![a.len()],
                found: vec![b.len()],
            }),
            _ => Err(DataKitError::invalid(
                "value",
                "only matching scalar or vector outputs can be blended",
            )),
        }
    }

    /// Weighted combination `sum(w_i * v_i)` of scalar or vector values.
    pub(crate) fn weighted_sum(terms: &[(f64, Value)]) -> Result<Value> {
        let mut acc: Option<Value> = None;
        for (w, v) in terms {
            acc = Some(match (acc, v) {
                (None, Value::Scalar(x)) => Value::Scalar(w * x),
                (None, Value::Vector(x)) => Value::Vector(x.iter().map(|x| w * x).collect()),
                (Some(Value::Scalar(a)), Value::Scalar(x)) => Value::Scalar(a + w * x),
                (Some(Value::Vector(mut a)), Value::Vector(x)) if a.len() == x.len() => {
                    a.iter_mut().zip(x).for_each(|(a, x)| *a += w * x);
                    Value::Vector(a)
                }
                _ => {
                    return Err(DataKitError::invalid(
                        "value",
                        "cannot combine outputs of different kinds",
                    ))
                }
            });
        }
        acc.ok_or_else(|| DataKitError::invalid("value", "empty combination"))
    }
}

/// The result of evaluating a column, reshaped to the broadcast input shape.
///
/// An empty `shape` means the call was scalar and `values` holds exactly one entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub values: Vec<Value>,
    pub shape: Vec<usize>,
}

impl Evaluation {
    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The single value of a scalar call.
    pub fn single(&self) -> Option<&Value> {
        match self.is_scalar() {
            true => self.values.first(),
            false => None,
        }
    }

    /// Shortcut for a scalar call with a scalar output.
    pub fn scalar(&self) -> Option<f64> {
        self.single().and_then(Value::as_scalar)
    }

    /// All values as plain floats, when every element is a scalar.
    pub fn scalars(&self) -> Option<Vec<f64>> {
        self.values.iter().map(Value::as_scalar).collect()
    }
}
