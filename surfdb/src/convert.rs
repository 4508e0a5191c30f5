/////////////////////////////////////////////////////////////////////////////////////////////
//
// Converts between total angle of attack/roll and angle of attack/sideslip.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # convert
//!
//! Aerodynamic angle conversions, in degrees, and ready-made [`Converter`]s
//! that derive one pair of angles from the other when a call supplies only
//! one of them.
//!
//! ```
//! use surfdb::convert::{aoap_phip_to_alpha_beta, AeroAngle};
//! use surfdb::{Column, ColumnStore, DataKit, Declaration};
//!
//! let (alpha, beta) = aoap_phip_to_alpha_beta(4.0, 0.0);
//! assert!((alpha - 4.0).abs() < 1e-12 && beta.abs() < 1e-12);
//!
//! let mut kit = DataKit::new();
//! kit.set_converter("alpha", AeroAngle::Alpha);
//! ```

use serde::{Deserialize, Serialize};

use crate::{
    args::{ArgValue, ArgView},
    metadata::Converter,
};

/// Angle of attack and sideslip from total angle of attack `aoap` and roll `phip`.
pub fn aoap_phip_to_alpha_beta(aoap: f64, phip: f64) -> (f64, f64) {
    let (a, p) = (aoap.to_radians(), phip.to_radians());
    let alpha = (a.tan() * p.cos()).atan();
    let beta = (a.sin() * p.sin()).clamp(-1.0, 1.0).asin();
    (alpha.to_degrees(), beta.to_degrees())
}

/// Total angle of attack and roll from angle of attack `alpha` and sideslip `beta`.
pub fn alpha_beta_to_aoap_phip(alpha: f64, beta: f64) -> (f64, f64) {
    let (a, b) = (alpha.to_radians(), beta.to_radians());
    let u = a.cos() * b.cos();
    let v = b.sin();
    let w = a.sin() * b.cos();
    let aoap = u.clamp(-1.0, 1.0).acos();
    let phip = v.atan2(w);
    (aoap.to_degrees(), phip.to_degrees())
}

/// A derivable aerodynamic angle. Registered as a converter, it computes its
/// value from the complementary pair found among the call's keywords (or the
/// store's columns).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AeroAngle {
    /// From `aoap` and `phip`.
    Alpha,
    /// From `aoap` and `phip`.
    Beta,
    /// From `alpha` and `beta`.
    Aoap,
    /// From `alpha` and `beta`.
    Phip,
}

impl Converter for AeroAngle {
    fn convert(&self, view: &ArgView<'_>) -> Option<ArgValue> {
        match self {
            AeroAngle::Alpha | AeroAngle::Beta => {
                let aoap = view.get("aoap")?;
                let phip = view.get("phip")?;
                let pick = *self == AeroAngle::Alpha;
                aoap.map2(&phip, |a, p| {
                    let (alpha, beta) = aoap_phip_to_alpha_beta(a, p);
                    if pick { alpha } else { beta }
                })
            }
            AeroAngle::Aoap | AeroAngle::Phip => {
                let alpha = view.get("alpha")?;
                let beta = view.get("beta")?;
                let pick = *self == AeroAngle::Aoap;
                alpha.map2(&beta, |a, b| {
                    let (aoap, phip) = alpha_beta_to_aoap_phip(a, b);
                    if pick { aoap } else { phip }
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use equator::assert;
    use std::collections::BTreeMap;

    #[test]
    fn pure_pitch_and_pure_yaw() {
        let (alpha, beta) = aoap_phip_to_alpha_beta(10.0, 0.0);
        assert_approx_eq!(alpha, 10.0);
        assert_approx_eq!(beta, 0.0);

        let (alpha, beta) = aoap_phip_to_alpha_beta(10.0, 90.0);
        assert_approx_eq!(alpha, 0.0);
        assert_approx_eq!(beta, 10.0);

        let (aoap, phip) = alpha_beta_to_aoap_phip(0.0, -5.0);
        assert_approx_eq!(aoap, 5.0);
        assert_approx_eq!(phip, -90.0);
    }

    #[test]
    fn inverse_recovers_total_angles() {
        let (alpha, beta) = aoap_phip_to_alpha_beta(8.0, 30.0);
        let (aoap, phip) = alpha_beta_to_aoap_phip(alpha, beta);
        assert_approx_eq!(aoap, 8.0, 1e-10);
        assert_approx_eq!(phip, 30.0, 1e-10);
    }

    #[test]
    fn converters_read_keywords() {
        let mut kw = BTreeMap::new();
        kw.insert("aoap".to_string(), ArgValue::from(vec![4.0, 4.0]));
        kw.insert("phip".to_string(), ArgValue::from(0.0));
        let view = ArgView::new(&kw, None);

        let alpha = AeroAngle::Alpha.convert(&view).unwrap().to_vec().unwrap();
        assert!(alpha.len() == 2);
        assert_approx_eq!(alpha[1], 4.0);
        assert!(AeroAngle::Aoap.convert(&view).is_none());
    }
}
