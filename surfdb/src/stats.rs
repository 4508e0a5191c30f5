/////////////////////////////////////////////////////////////////////////////////////////////
//
// Empirical quantiles used for range and coverage-interval estimates.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

/// Quantile `q` in `[0, 1]` of `values`, linearly interpolating between order
/// statistics. `None` for an empty input.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let i = pos.floor() as usize;
    let j = (i + 1).min(sorted.len() - 1);
    let f = pos - i as f64;
    Some((1.0 - f) * sorted[i] + f * sorted[j])
}

/// Value below which a fraction `cov` of `|values|` falls.
///
/// This is an empirical quantile with no Student-t widening for small samples.
pub fn range_at(values: &[f64], cov: f64) -> Option<f64> {
    let abs: Vec<f64> = values.iter().map(|v| v.abs()).collect();
    quantile(&abs, cov)
}

/// Central interval holding a fraction `cov` of `values`.
///
/// The bounds are empirical quantiles with no Student-t widening for small samples.
pub fn cov_interval(values: &[f64], cov: f64) -> Option<(f64, f64)> {
    let lo = quantile(values, 0.5 * (1.0 - cov))?;
    let hi = quantile(values, 0.5 * (1.0 + cov))?;
    Some((lo, hi))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use equator::assert;

    #[test]
    fn quantile_interpolates() {
        let v = [3.0, 1.0, 4.0, 2.0, 5.0];
        assert!(quantile(&v, 0.0) == Some(1.0));
        assert!(quantile(&v, 1.0) == Some(5.0));
        assert!(quantile(&v, 0.5) == Some(3.0));
        assert_approx_eq!(quantile(&v, 0.9).unwrap(), 4.6);
        assert!(quantile(&[], 0.5).is_none());
    }

    #[test]
    fn range_and_interval() {
        let v: Vec<f64> = (-50..=50).map(|i| i as f64 / 10.0).collect();
        assert_approx_eq!(range_at(&v, 1.0).unwrap(), 5.0);
        let (lo, hi) = cov_interval(&v, 0.8).unwrap();
        assert_approx_eq!(lo, -4.0);
        assert_approx_eq!(hi, 4.0);
    }
}
