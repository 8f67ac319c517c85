//! Two-region intensity-homogeneity force.

use serde::{Deserialize, Serialize};

use super::evolve::Narrowband;
use super::{check_shape, LevelSetError};
use crate::field::{masked_mean, Field, Mask};

/// Weights of the Chan–Vese energy terms.
///
/// `mu` (length) and `nu` (area) are carried for completeness of the
/// functional but contribute no force: only the region terms drive the
/// contour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyWeights {
    /// Length (surface tension) weight.
    pub mu: f64,
    /// Area (stiffness) weight.
    pub nu: f64,
    /// Foreground homogeneity weight.
    pub lambda_inside: f64,
    /// Background homogeneity weight.
    pub lambda_outside: f64,
}

impl EnergyWeights {
    /// Region-competition weights with inert length and area terms.
    pub fn region(lambda_inside: f64, lambda_outside: f64) -> Self {
        Self {
            mu: 0.0,
            nu: 0.0,
            lambda_inside,
            lambda_outside,
        }
    }

    /// Same weights with a different background term.
    pub fn with_background(self, lambda_outside: f64) -> Self {
        Self {
            lambda_outside,
            ..self
        }
    }
}

impl Default for EnergyWeights {
    fn default() -> Self {
        Self::region(1.0, 1.0 / 50.0)
    }
}

/// Mean intensity inside and outside the current contour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionMeans {
    pub inside: f64,
    pub outside: f64,
}

impl RegionMeans {
    /// Means over `phi <= 0` (inside) and `phi > 0` (outside).
    pub fn from_level_set(image: &Field, phi: &Field) -> Result<Self, LevelSetError> {
        check_shape(image.dimensions(), phi.dimensions())?;
        let phi = phi.as_raw();
        Self::from_selector(image.as_raw(), |i| phi[i] <= 0.0)
    }

    /// Means over the mask foreground and its complement.
    pub fn from_mask(image: &Field, mask: &Mask) -> Result<Self, LevelSetError> {
        check_shape(image.dimensions(), mask.dimensions())?;
        let m = mask.as_slice();
        Self::from_selector(image.as_raw(), |i| m[i])
    }

    fn from_selector(values: &[f64], inside: impl Fn(usize) -> bool) -> Result<Self, LevelSetError> {
        let inside_mean = masked_mean(values, &inside).ok_or(LevelSetError::EmptyInterior)?;
        let outside_mean = masked_mean(values, |i| !inside(i)).ok_or(LevelSetError::EmptyExterior)?;
        Ok(Self {
            inside: inside_mean,
            outside: outside_mean,
        })
    }
}

/// Region force over the narrowband, in band order:
///
/// `F = -lambda_inside (I - c_in)² + lambda_outside (I - c_out)²`
///
/// Positive force pulls a pixel into the foreground.
pub fn region_force(
    image: &Field,
    band: &Narrowband,
    means: RegionMeans,
    weights: &EnergyWeights,
) -> Vec<f64> {
    let raw = image.as_raw();
    band.indices()
        .iter()
        .map(|&i| {
            let v = raw[i];
            let d_in = v - means.inside;
            let d_out = v - means.outside;
            -weights.lambda_inside * d_in * d_in + weights.lambda_outside * d_out * d_out
        })
        .collect()
}
