use serde::{Deserialize, Serialize};

use super::evolve::{evolve, Narrowband};
use super::force::{region_force, EnergyWeights, RegionMeans};
use super::sdf::to_sdf;
use super::{check_shape, LevelSetError};
use crate::field::{Field, Mask};
use crate::observer::{EvolutionObserver, StepView};

/// Why a batch of steps ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStop {
    /// All requested steps ran.
    Completed,
    /// No pixel satisfies `phi <= 0` any more.
    InteriorVanished,
    /// The drifted narrowband holds no pixel.
    BandDrained,
    /// No band pixel has a positive force after the first step.
    ForceStalled,
}

/// Result of one [`acwe_batch`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    /// `phi <= 0` after the last step.
    pub mask: Mask,
    /// Steps actually taken, at most the requested count.
    pub steps: usize,
    pub stop: BatchStop,
}

/// Run up to `steps` explicit steps of the region-competition evolution,
/// starting from `mask`, and return the resulting mask `phi <= 0`.
///
/// Same as [`acwe_batch`] with the step count and stop reason dropped.
pub fn acwe(
    image: &Field,
    mask: &Mask,
    steps: usize,
    weights: &EnergyWeights,
    narrowband: u32,
    observer: &mut dyn EvolutionObserver,
) -> Result<Mask, LevelSetError> {
    acwe_batch(image, mask, steps, weights, narrowband, observer).map(|b| b.mask)
}

/// Run up to `steps` explicit steps and report how the batch ended.
///
/// The signed distance function is built once from `mask` and then drifts
/// freely for the whole call; region means and the narrowband are refreshed
/// at every step. The call stops early when the interior vanishes (an empty
/// mask is returned), or when the drifted band holds no pixel or no pixel
/// with positive force (the front is frozen until the caller rebuilds `phi`).
///
/// On the first step `phi` is a true signed distance function and a
/// non-positive maximum force is reported as
/// [`LevelSetError::NonPositiveMaxForce`].
pub fn acwe_batch(
    image: &Field,
    mask: &Mask,
    steps: usize,
    weights: &EnergyWeights,
    narrowband: u32,
    observer: &mut dyn EvolutionObserver,
) -> Result<BatchResult, LevelSetError> {
    check_shape(image.dimensions(), mask.dimensions())?;
    if narrowband < 1 {
        return Err(LevelSetError::InvalidNarrowband(narrowband));
    }

    let mut phi = to_sdf(mask);
    let mut stop = BatchStop::Completed;
    let mut taken = 0usize;
    for step in 0..steps {
        let means = match RegionMeans::from_level_set(image, &phi) {
            Ok(m) => m,
            Err(LevelSetError::EmptyInterior) => {
                tracing::debug!("interior vanished at step {}/{}", step, steps);
                stop = BatchStop::InteriorVanished;
                break;
            }
            Err(e) => return Err(e),
        };
        let band = Narrowband::new(&phi, narrowband)?;
        if band.is_empty() {
            tracing::debug!("narrowband drained at step {}/{}", step, steps);
            stop = BatchStop::BandDrained;
            break;
        }
        let force = region_force(image, &band, means, weights);
        let dt = match evolve(&force, &mut phi, &band) {
            Ok(dt) => dt,
            // Only drift leftovers remain in the band; nothing can advance.
            Err(LevelSetError::NonPositiveMaxForce { max_force }) if step > 0 => {
                tracing::debug!(
                    "band stalled at step {}/{} (max force {})",
                    step,
                    steps,
                    max_force
                );
                stop = BatchStop::ForceStalled;
                break;
            }
            Err(e) => return Err(e),
        };
        taken += 1;
        observer.on_step(&StepView {
            step,
            phi: &phi,
            means,
            dt,
            band_len: band.len(),
        });
    }

    Ok(BatchResult {
        mask: Mask::from_field(&phi, |v| v <= 0.0),
        steps: taken,
        stop,
    })
}
