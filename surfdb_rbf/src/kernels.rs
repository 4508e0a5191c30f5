/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements the radial kernel functions available to the scattered RBF fit.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::FitError;

/// The radial kernel `phi(r)` used to build an interpolant.
///
/// Shape-parameterised kernels (`Multiquadric`, `InverseMultiquadric`,
/// `Gaussian`) scale the distance by `epsilon`; the others ignore it.
#[derive(Clone, Debug, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RbfKernelType {
    /// `sqrt((r/eps)^2 + 1)`
    Multiquadric,
    /// `1 / sqrt((r/eps)^2 + 1)`
    InverseMultiquadric,
    /// `exp(-(r/eps)^2)`
    Gaussian,
    /// `r`
    Linear,
    /// `r^3`
    Cubic,
    /// `r^5`
    Quintic,
    /// `r^2 log r`
    ThinPlate,
}

impl RbfKernelType {
    /// All kernels, in the order they are listed by name.
    pub const ALL: [RbfKernelType; 7] = [
        RbfKernelType::Multiquadric,
        RbfKernelType::InverseMultiquadric,
        RbfKernelType::Gaussian,
        RbfKernelType::Linear,
        RbfKernelType::Cubic,
        RbfKernelType::Quintic,
        RbfKernelType::ThinPlate,
    ];

    /// Evaluates the kernel at distance `r`.
    #[inline(always)]
    pub fn phi(&self, r: f64, epsilon: f64) -> f64 {
        match self {
            RbfKernelType::Multiquadric => ((r / epsilon).powi(2) + 1.0).sqrt(),
            RbfKernelType::InverseMultiquadric => 1.0 / ((r / epsilon).powi(2) + 1.0).sqrt(),
            RbfKernelType::Gaussian => (-(r / epsilon).powi(2)).exp(),
            RbfKernelType::Linear => r,
            RbfKernelType::Cubic => r.powi(3),
            RbfKernelType::Quintic => r.powi(5),
            RbfKernelType::ThinPlate => match r.abs() < f64::EPSILON {
                true => 0.0,
                false => r.powi(2) * r.ln(),
            },
        }
    }

    /// Whether `epsilon` changes the kernel.
    pub fn uses_epsilon(&self) -> bool {
        matches!(
            self,
            RbfKernelType::Multiquadric | RbfKernelType::InverseMultiquadric | RbfKernelType::Gaussian
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            RbfKernelType::Multiquadric => "multiquadric",
            RbfKernelType::InverseMultiquadric => "inverse_multiquadric",
            RbfKernelType::Gaussian => "gaussian",
            RbfKernelType::Linear => "linear",
            RbfKernelType::Cubic => "cubic",
            RbfKernelType::Quintic => "quintic",
            RbfKernelType::ThinPlate => "thin_plate",
        }
    }
}

impl Default for RbfKernelType {
    fn default() -> Self {
        RbfKernelType::Cubic
    }
}

impl fmt::Display for RbfKernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RbfKernelType {
    type Err = FitError;

    /// Parses a kernel name, accepting `-` in place of `_` and any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        RbfKernelType::ALL
            .into_iter()
            .find(|k| k.name() == key)
            .ok_or_else(|| FitError::InvalidSettings {
                reason: format!("unknown RBF kernel '{}'", s),
            })
    }
}
