//! Explicit Euler step restricted to the narrowband.

use super::gradient::gradient_magnitude_at;
use super::LevelSetError;
use crate::field::Field;

/// Safety factor below the theoretical CFL limit of 0.5.
pub const CFL_SAFETY: f64 = 0.49;

/// Row-major indices of the pixels with `|phi| <= radius`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narrowband {
    radius: u32,
    indices: Vec<usize>,
}

impl Narrowband {
    pub fn new(phi: &Field, radius: u32) -> Result<Self, LevelSetError> {
        if radius < 1 {
            return Err(LevelSetError::InvalidNarrowband(radius));
        }
        let r = radius as f64;
        let indices = phi
            .as_raw()
            .iter()
            .enumerate()
            .filter(|(_, v)| v.abs() <= r)
            .map(|(i, _)| i)
            .collect();
        Ok(Self { radius, indices })
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// `dt = CFL_SAFETY / max(F)`.
///
/// The bound uses the signed maximum, not `max(|F|)`: a band where every pixel
/// wants to shrink has no valid step and is reported as an error.
pub fn cfl_timestep(force: &[f64]) -> Result<f64, LevelSetError> {
    if force.is_empty() {
        return Err(LevelSetError::EmptyNarrowband);
    }
    let max_force = force.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(max_force > 0.0) || !max_force.is_finite() {
        return Err(LevelSetError::NonPositiveMaxForce { max_force });
    }
    Ok(CFL_SAFETY / max_force)
}

/// Advance `phi` by one step: `phi -= dt * F * |∇phi|` on the band.
///
/// `force` is in band order and must hold one value per band pixel. Pixels
/// outside the band are left untouched. Returns the timestep used.
pub fn evolve(force: &[f64], phi: &mut Field, band: &Narrowband) -> Result<f64, LevelSetError> {
    if force.len() != band.len() {
        return Err(LevelSetError::ForceLengthMismatch {
            expected: band.len(),
            got: force.len(),
        });
    }
    let dt = cfl_timestep(force)?;
    let grad = gradient_magnitude_at(phi, band.indices());
    let data: &mut [f64] = phi;
    for ((&i, &f), &g) in band.indices().iter().zip(force).zip(&grad) {
        data[i] -= dt * f * g;
    }
    Ok(dt)
}
