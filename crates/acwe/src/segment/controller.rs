use crate::field::{masked_mean, Field, Mask};
use crate::levelset::{acwe_batch, check_shape, BatchStop, EnergyWeights};
use crate::morphology::fill_holes;
use crate::observer::{BatchReport, EvolutionObserver};

use super::config::SegmentConfig;
use super::tracker::ChangeTracker;
use super::{SegmentError, SegmentOutcome, Segmentation};

/// Batched evolution with the novelty-ratio stopping rule.
///
/// Owns a working copy of the image; off-domain pixels of that copy are
/// overwritten with the current background mean before every batch, the
/// caller's image is never touched.
#[derive(Debug)]
pub struct ConvergenceController<'a> {
    image: &'a Field,
    domain: Option<&'a Mask>,
    config: &'a SegmentConfig,
    work: Field,
}

impl<'a> ConvergenceController<'a> {
    pub fn new(
        image: &'a Field,
        domain: Option<&'a Mask>,
        config: &'a SegmentConfig,
    ) -> Result<Self, SegmentError> {
        config.validate()?;
        if let Some(d) = domain {
            check_shape(image.dimensions(), d.dimensions())?;
        }
        Ok(Self {
            image,
            domain,
            config,
            work: image.clone(),
        })
    }

    pub fn config(&self) -> &SegmentConfig {
        self.config
    }

    /// Seed as the first batch sees it: hole-filled when configured.
    pub fn prepare_seed(&self, seed: &Mask) -> Mask {
        if self.config.fill_init_holes {
            fill_holes(seed)
        } else {
            seed.clone()
        }
    }

    /// Evolve from `start` until the stopping rule fires.
    ///
    /// `start` is used as given: hole filling is the caller's business (see
    /// [`Self::prepare_seed`]), so warm starts from a previous result are not
    /// altered. An empty `start` returns immediately with
    /// [`SegmentOutcome::EmptySeed`].
    pub fn run(
        &mut self,
        start: &Mask,
        weights: &EnergyWeights,
        observer: &mut dyn EvolutionObserver,
    ) -> Result<Segmentation, SegmentError> {
        check_shape(self.image.dimensions(), start.dimensions())?;
        if start.area() == 0 {
            return Ok(Segmentation {
                mask: start.clone(),
                outcome: SegmentOutcome::EmptySeed,
            });
        }

        let steps = self.config.iters_between_checks;
        let narrowband = self.config.narrowband;
        let mut tracker = ChangeTracker::new(start.len());
        let mut current = start.clone();
        let mut batch = 0usize;

        loop {
            if self.config.max_batches.is_some_and(|cap| batch >= cap) {
                tracing::warn!(
                    "no convergence after {} batches (lambda_out={})",
                    batch,
                    weights.lambda_outside
                );
                return Ok(Segmentation {
                    mask: current,
                    outcome: SegmentOutcome::NotConverged { batches: batch },
                });
            }

            self.substitute_background(&current)?;
            let result = acwe_batch(&self.work, &current, steps, weights, narrowband, observer)?;
            let next = result.mask;
            let stats = tracker.update(&current, &next);
            let report = BatchReport {
                batch,
                changed: stats.changed,
                percent_diff: stats.percent_diff(),
                percent_new_diff: stats.percent_new_diff(),
                area: stats.area,
                steps: result.steps,
                stop: result.stop,
            };
            tracing::debug!(
                "batch {}: area={} changed={} diff={:.3}% new={:.3}%",
                batch,
                report.area,
                report.changed,
                report.percent_diff,
                report.percent_new_diff
            );
            if report.stop != BatchStop::Completed {
                tracing::debug!(
                    "batch {} ran {}/{} steps ({:?})",
                    batch,
                    report.steps,
                    steps,
                    report.stop
                );
            }
            observer.on_batch(&report);
            current = next;
            batch += 1;

            if stats.area == 0 {
                tracing::warn!("segmentation collapsed after {} batches", batch);
                return Ok(Segmentation {
                    mask: current,
                    outcome: SegmentOutcome::Collapsed { batches: batch },
                });
            }
            if stats.novel == 0 {
                tracing::debug!("converged after {} batches, area={}", batch, stats.area);
                return Ok(Segmentation {
                    mask: current,
                    outcome: SegmentOutcome::Converged { batches: batch },
                });
            }
        }
    }

    /// Set off-domain pixels of the working image to the mean of the
    /// on-domain background under `mask`.
    fn substitute_background(&mut self, mask: &Mask) -> Result<(), SegmentError> {
        let Some(domain) = self.domain else {
            return Ok(());
        };
        let d = domain.as_slice();
        let m = mask.as_slice();
        let fill = masked_mean(self.image.as_raw(), |i| d[i] && !m[i])
            .ok_or(SegmentError::EmptyBackground)?;
        let work: &mut [f64] = &mut self.work;
        for (v, &inside) in work.iter_mut().zip(d) {
            if !inside {
                *v = fill;
            }
        }
        Ok(())
    }
}
