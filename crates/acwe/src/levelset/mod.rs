//! Narrowband level-set engine.
//!
//! The contour is the zero level of a signed distance function `phi`:
//! foreground pixels sit at `phi <= -0.5`, background pixels at
//! `phi >= +0.5`, and the segmentation is recovered as `phi <= 0`.
//!
//! One explicit Euler step ([`evolve`]) moves `phi` under a speed field
//! restricted to the narrowband `|phi| <= radius`. [`acwe()`] chains a bounded
//! number of steps under the two-region Chan–Vese force and [`acwe_batch`]
//! also reports how many ran and why the batch ended; convergence is
//! decided one level up in [`crate::segment`].

mod acwe;
mod evolve;
mod force;
mod gradient;
mod sdf;

pub use acwe::{acwe, acwe_batch, BatchResult, BatchStop};
pub use evolve::{cfl_timestep, evolve, Narrowband, CFL_SAFETY};
pub use force::{region_force, EnergyWeights, RegionMeans};
pub use gradient::{gradient_magnitude, gradient_magnitude_at};
pub use sdf::to_sdf;

/// Failures of a single evolution batch.
#[derive(Debug, Clone, PartialEq)]
pub enum LevelSetError {
    /// Image, mask or phi dimensions disagree.
    ShapeMismatch {
        /// Expected `[width, height]`.
        expected: [u32; 2],
        /// Offending `[width, height]`.
        got: [u32; 2],
    },
    /// Narrowband radius must be at least one pixel.
    InvalidNarrowband(u32),
    /// The force slice does not have one value per narrowband pixel.
    ForceLengthMismatch {
        /// Narrowband length.
        expected: usize,
        /// Length of the force slice.
        got: usize,
    },
    /// No pixel lies inside the narrowband, nothing can move.
    EmptyNarrowband,
    /// The CFL timestep divides by `max(F)`; a non-positive maximum has no
    /// stable step.
    NonPositiveMaxForce {
        /// Largest force value in the narrowband.
        max_force: f64,
    },
    /// The interior region has no pixels, its mean is undefined.
    EmptyInterior,
    /// The exterior region has no pixels, its mean is undefined.
    EmptyExterior,
}

impl std::fmt::Display for LevelSetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShapeMismatch { expected, got } => write!(
                f,
                "shape mismatch: expected {}x{}, got {}x{}",
                expected[0], expected[1], got[0], got[1]
            ),
            Self::InvalidNarrowband(r) => write!(f, "narrowband radius must be >= 1, got {}", r),
            Self::ForceLengthMismatch { expected, got } => write!(
                f,
                "force has {} values, narrowband has {} pixels",
                got, expected
            ),
            Self::EmptyNarrowband => write!(f, "narrowband contains no pixels"),
            Self::NonPositiveMaxForce { max_force } => {
                write!(f, "non-positive maximum force {} in narrowband", max_force)
            }
            Self::EmptyInterior => write!(f, "degenerate mask: empty interior"),
            Self::EmptyExterior => write!(f, "degenerate mask: empty exterior"),
        }
    }
}

impl std::error::Error for LevelSetError {}

pub(crate) fn check_shape(
    expected: (u32, u32),
    got: (u32, u32),
) -> Result<(), LevelSetError> {
    if expected == got {
        Ok(())
    } else {
        Err(LevelSetError::ShapeMismatch {
            expected: [expected.0, expected.1],
            got: [got.0, got.1],
        })
    }
}
