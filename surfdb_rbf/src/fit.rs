/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines the RBF fitting capability traits and a dense direct-solve implementation.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # fit
//!
//! The capability boundary between the response-surface database and the
//! numerical RBF solve. An [`RbfFit`] turns `N` scattered `D`-dimensional
//! points and their values into an [`Interpolant`], a callable of `D` floats.
//!
//! [`DirectRbfFitter`] assembles the full `N x N` kernel matrix
//! `A_ij = phi(|x_i - x_j|) - smoothing * delta_ij` and solves `A w = y` with a
//! partial-pivot LU factorisation. No polynomial drift is appended, so the
//! interpolant is `s(x) = sum_j w_j phi(|x - x_j|)`.

use std::{fmt::Debug, sync::Arc};

use faer::{linalg::solvers::Solve, Mat, MatRef, RowRef};
use rayon::prelude::*;
use tracing::debug;

use crate::{FitError, RbfKernelType, RbfSettings};

/// A fitted scattered-data interpolant.
pub trait Interpolant: Send + Sync + Debug {
    /// Number of input coordinates expected by [`Interpolant::evaluate`].
    fn dimensions(&self) -> usize;

    /// Evaluates the interpolant at a single point.
    fn evaluate(&self, x: &[f64]) -> f64;

    /// Evaluates the interpolant at every row of `targets` in parallel.
    fn evaluate_many(&self, targets: MatRef<'_, f64>) -> Vec<f64> {
        (0..targets.nrows())
            .into_par_iter()
            .map(|i| {
                let x: Vec<f64> = targets.row(i).iter().copied().collect();
                self.evaluate(&x)
            })
            .collect()
    }
}

/// The external capability used to build interpolants.
pub trait RbfFit: Send + Sync + Debug {
    fn fit(
        &self,
        points: MatRef<'_, f64>,
        values: &[f64],
        settings: &RbfSettings,
    ) -> Result<Arc<dyn Interpolant>, FitError>;
}

/// Euclidean distance between two points.
#[inline(always)]
pub fn get_distance(target: RowRef<f64>, source: RowRef<f64>) -> f64 {
    let mut dist = 0.0;
    for (t, s) in target.iter().zip(source.iter()) {
        let diff = t - s;
        dist += diff * diff;
    }
    dist.sqrt()
}

/// Average spacing of the source points: `(prod(edges) / N)^(1 / len(edges))`,
/// where `edges` are the non-zero extents of the bounding box. Returns `1.0`
/// when every coordinate is constant.
pub fn default_epsilon(points: MatRef<'_, f64>) -> f64 {
    let n = points.nrows();
    if n == 0 {
        return 1.0;
    }
    let edges: Vec<f64> = (0..points.ncols())
        .map(|j| {
            let col = points.col(j);
            let (lo, hi) = col
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            hi - lo
        })
        .filter(|e| *e > 0.0)
        .collect();

    if edges.is_empty() {
        return 1.0;
    }
    let prod: f64 = edges.iter().product();
    (prod / n as f64).powf(1.0 / edges.len() as f64)
}

/// An interpolant produced by [`DirectRbfFitter`].
#[derive(Debug, Clone)]
pub struct ScatteredRbf {
    points: Mat<f64>,
    weights: Vec<f64>,
    kernel_type: RbfKernelType,
    epsilon: f64,
}

impl ScatteredRbf {
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn kernel_type(&self) -> RbfKernelType {
        self.kernel_type
    }

    pub fn num_points(&self) -> usize {
        self.points.nrows()
    }
}

impl Interpolant for ScatteredRbf {
    fn dimensions(&self) -> usize {
        self.points.ncols()
    }

    fn evaluate(&self, x: &[f64]) -> f64 {
        let mut total = 0.0;
        for (i, w) in self.weights.iter().enumerate() {
            let mut dist = 0.0;
            for (t, s) in x.iter().zip(self.points.row(i).iter()) {
                let diff = t - s;
                dist += diff * diff;
            }
            total += w * self.kernel_type.phi(dist.sqrt(), self.epsilon);
        }
        total
    }
}

/// Dense direct solve of the RBF interpolation system.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectRbfFitter;

impl DirectRbfFitter {
    /// Minimum number of source points accepted by [`DirectRbfFitter::fit`].
    pub const MIN_POINTS: usize = 2;

    /// Fits and returns the concrete interpolant type.
    pub fn fit_scattered(
        &self,
        points: MatRef<'_, f64>,
        values: &[f64],
        settings: &RbfSettings,
    ) -> Result<ScatteredRbf, FitError> {
        let n = points.nrows();
        let dims = points.ncols();

        if values.len() != n || dims == 0 {
            return Err(FitError::DimensionMismatch { points: n, values: values.len(), dims });
        }
        if n < Self::MIN_POINTS {
            return Err(FitError::TooFewPoints { found: n, required: Self::MIN_POINTS });
        }
        settings.validate()?;

        let kernel = settings.kernel_type;
        let epsilon = settings.epsilon.unwrap_or_else(|| default_epsilon(points));

        let a_matrix = Mat::<f64>::from_fn(n, n, |i, j| {
            let phi = kernel.phi(get_distance(points.row(i), points.row(j)), epsilon);
            match i == j {
                true => phi - settings.smoothing,
                false => phi,
            }
        });
        let rhs = Mat::<f64>::from_fn(n, 1, |i, _| values[i]);

        let lu = a_matrix.partial_piv_lu();
        let solution = lu.solve(rhs);

        let weights: Vec<f64> = (0..n).map(|i| solution[(i, 0)]).collect();
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(FitError::SingularSystem { num_points: n });
        }

        debug!(num_points = n, dims, kernel = %kernel, epsilon, "fitted scattered RBF");

        Ok(ScatteredRbf {
            points: points.to_owned(),
            weights,
            kernel_type: kernel,
            epsilon,
        })
    }
}

impl RbfFit for DirectRbfFitter {
    fn fit(
        &self,
        points: MatRef<'_, f64>,
        values: &[f64],
        settings: &RbfSettings,
    ) -> Result<Arc<dyn Interpolant>, FitError> {
        let rbf = self.fit_scattered(points, values, settings)?;
        Ok(Arc::new(rbf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use equator::assert;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_points(n: usize, dim: usize, seed: u64) -> Mat<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        Mat::from_fn(n, dim, |_, _| rng.random_range(0.0..1.0))
    }

    #[test]
    fn reproduces_source_values_1d() {
        let points = Mat::from_fn(6, 1, |i, _| i as f64);
        let values: Vec<f64> = (0..6).map(|i| (i as f64 * 0.7).sin()).collect();

        for kernel in [
            RbfKernelType::Linear,
            RbfKernelType::Cubic,
            RbfKernelType::Multiquadric,
            RbfKernelType::InverseMultiquadric,
            RbfKernelType::Gaussian,
        ] {
            let settings = RbfSettings::builder(kernel).build();
            let rbf = DirectRbfFitter.fit(points.as_ref(), &values, &settings).unwrap();
            for (i, v) in values.iter().enumerate() {
                assert_approx_eq!(rbf.evaluate(&[i as f64]), *v, 1e-8);
            }
        }
    }

    #[test]
    fn reproduces_source_values_scattered_3d() {
        let points = random_points(40, 3, 7);
        let values: Vec<f64> = (0..40)
            .map(|i| points[(i, 0)] + 2.0 * points[(i, 1)] - points[(i, 2)].powi(2))
            .collect();
        let settings = RbfSettings::builder(RbfKernelType::Multiquadric).build();
        let rbf = DirectRbfFitter.fit_scattered(points.as_ref(), &values, &settings).unwrap();

        assert!(rbf.dimensions() == 3);
        for i in 0..40 {
            let x = [points[(i, 0)], points[(i, 1)], points[(i, 2)]];
            assert_approx_eq!(rbf.evaluate(&x), values[i], 1e-6);
        }
    }

    #[test]
    fn evaluate_many_matches_single_evaluations() {
        let points = random_points(25, 2, 11);
        let values: Vec<f64> = (0..25).map(|i| points[(i, 0)] * points[(i, 1)]).collect();
        let settings = RbfSettings::builder(RbfKernelType::ThinPlate).build();
        let rbf = DirectRbfFitter.fit(points.as_ref(), &values, &settings).unwrap();

        let targets = random_points(10, 2, 12);
        let many = rbf.evaluate_many(targets.as_ref());
        assert!(many.len() == 10);
        for i in 0..10 {
            let single = rbf.evaluate(&[targets[(i, 0)], targets[(i, 1)]]);
            assert!(many[i] == single);
        }
    }

    #[test]
    fn smoothing_relaxes_exact_fit() {
        let points = Mat::from_fn(8, 1, |i, _| i as f64);
        let values: Vec<f64> = (0..8).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let settings = RbfSettings::builder(RbfKernelType::Multiquadric).smoothing(5.0).build();
        let rbf = DirectRbfFitter.fit(points.as_ref(), &values, &settings).unwrap();

        let misfit: f64 = (0..8).map(|i| (rbf.evaluate(&[i as f64]) - values[i]).abs()).sum();
        assert!(misfit > 1e-3);
    }

    #[test]
    fn rejects_too_few_points_and_mismatched_values() {
        let settings = RbfSettings::default();
        let one = Mat::from_fn(1, 2, |_, j| j as f64);
        assert!(
            DirectRbfFitter.fit(one.as_ref(), &[1.0], &settings).unwrap_err()
                == FitError::TooFewPoints { found: 1, required: 2 }
        );

        let three = Mat::from_fn(3, 2, |i, j| (i + j) as f64);
        assert!(matches!(
            DirectRbfFitter.fit(three.as_ref(), &[1.0, 2.0], &settings),
            Err(FitError::DimensionMismatch { points: 3, values: 2, dims: 2 })
        ));
    }

    #[test]
    fn duplicate_points_are_singular() {
        let points = Mat::from_fn(3, 1, |_, _| 1.0);
        let settings = RbfSettings::builder(RbfKernelType::Linear).build();
        assert!(matches!(
            DirectRbfFitter.fit(points.as_ref(), &[1.0, 2.0, 3.0], &settings),
            Err(FitError::SingularSystem { num_points: 3 })
        ));
    }

    #[test]
    fn default_epsilon_is_average_spacing() {
        // Extents 4 x 2 over 8 points: (8 / 8)^(1/2).
        let points = Mat::from_fn(8, 2, |i, j| match j {
            0 => (i % 5) as f64,
            _ => (i % 3) as f64,
        });
        assert_approx_eq!(default_epsilon(points.as_ref()), 1.0);

        // A constant coordinate is ignored.
        let flat = Mat::from_fn(4, 2, |i, j| if j == 0 { 2.0 * i as f64 } else { 3.0 });
        assert_approx_eq!(default_epsilon(flat.as_ref()), 1.5);

        let constant = Mat::from_fn(4, 2, |_, _| 3.0);
        assert!(default_epsilon(constant.as_ref()) == 1.0);
    }
}
