/////////////////////////////////////////////////////////////////////////////////////////////
//
// Specifies kernel, smoothing and shape options for configuring scattered RBF fits.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Specifies kernel, smoothing and shape options for configuring scattered RBF fits.
use serde::{Deserialize, Serialize};

use crate::{FitError, RbfKernelType};

/// A convenience builder for constructing a [`RbfSettings`] instance.
///
/// The builder should be called via the [`RbfSettings::builder`] method.
///
/// See [`RbfSettings`] for details on each field.
#[derive(Debug, Clone, Copy)]
pub struct RbfSettingsBuilder {
    pub kernel_type: RbfKernelType,
    pub smoothing: f64,
    pub epsilon: Option<f64>,
}

impl RbfSettingsBuilder {
    fn new(kernel_type: RbfKernelType) -> Self {
        Self {
            kernel_type,
            smoothing: 0.0,
            epsilon: None,
        }
    }

    /// Sets the smoothing value.
    pub fn smoothing(mut self, smoothing: f64) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// Fixes the kernel shape parameter instead of deriving it from the data.
    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = Some(epsilon);
        self
    }

    /// Builds and returns an instance of [`RbfSettings`] from the values
    /// defined in the builder.
    pub fn build(self) -> RbfSettings {
        RbfSettings {
            kernel_type: self.kernel_type,
            smoothing: self.smoothing,
            epsilon: self.epsilon,
        }
    }
}

/// Tunables passed to an [`RbfFit`](crate::RbfFit) capability.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RbfSettings {
    /// The radial kernel.
    pub kernel_type: RbfKernelType,

    /// Optional smoothing parameter. A value of `0.0` (default) enforces an exact
    /// fit to all input data. Larger values soften the fit, which can reduce
    /// sensitivity to noisy data.
    pub smoothing: f64,

    /// Shape parameter for the multiquadric, inverse multiquadric and gaussian
    /// kernels. When `None` it is set to the average spacing of the source points.
    pub epsilon: Option<f64>,
}

impl Default for RbfSettings {
    fn default() -> Self {
        RbfSettingsBuilder::new(RbfKernelType::default()).build()
    }
}

impl RbfSettings {
    /// Starts building settings for the given kernel.
    pub fn builder(kernel_type: RbfKernelType) -> RbfSettingsBuilder {
        RbfSettingsBuilder::new(kernel_type)
    }

    /// Checks the numeric fields are usable.
    pub fn validate(&self) -> Result<(), FitError> {
        if !self.smoothing.is_finite() {
            return Err(FitError::InvalidSettings {
                reason: format!("smoothing must be finite, got {}", self.smoothing),
            });
        }
        match self.epsilon {
            Some(eps) if !(eps.is_finite() && eps > 0.0) => Err(FitError::InvalidSettings {
                reason: format!("epsilon must be positive and finite, got {}", eps),
            }),
            _ => Ok(()),
        }
    }
}
