//! Convergence-controlled single-weight segmentation.
//!
//! The controller alternates fixed-length batches of [`crate::levelset::acwe()`]
//! with a convergence check. Each batch starts from a freshly built signed
//! distance function of the previous batch's mask. A pixel-level flip counter
//! accumulates over the run; the loop stops once a batch contains no flip of a
//! pixel that had never flipped before, so contours that oscillate over a
//! known set of boundary pixels still terminate.

mod config;
mod controller;
mod tracker;

pub use config::SegmentConfig;
pub use controller::ConvergenceController;

use serde::{Deserialize, Serialize};

use crate::field::{Field, Mask};
use crate::levelset::LevelSetError;
use crate::observer::EvolutionObserver;

/// How a controller run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmentOutcome {
    /// The seed had no foreground; nothing was evolved.
    EmptySeed,
    /// A batch produced no novel flips.
    Converged { batches: usize },
    /// The foreground vanished.
    Collapsed { batches: usize },
    /// `max_batches` was reached first.
    NotConverged { batches: usize },
}

impl SegmentOutcome {
    pub fn batches(&self) -> usize {
        match *self {
            Self::EmptySeed => 0,
            Self::Converged { batches }
            | Self::Collapsed { batches }
            | Self::NotConverged { batches } => batches,
        }
    }

    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }
}

/// Final mask of one controller run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segmentation {
    pub mask: Mask,
    pub outcome: SegmentOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SegmentError {
    LevelSet(LevelSetError),
    /// No on-domain background pixel is left to estimate the fill value for
    /// off-domain pixels.
    EmptyBackground,
    InvalidConfig(String),
}

impl std::fmt::Display for SegmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LevelSet(e) => write!(f, "level-set evolution failed: {}", e),
            Self::EmptyBackground => {
                write!(f, "segmentation covers the whole valid domain, no background left")
            }
            Self::InvalidConfig(msg) => write!(f, "invalid segmentation config: {}", msg),
        }
    }
}

impl std::error::Error for SegmentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::LevelSet(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LevelSetError> for SegmentError {
    fn from(e: LevelSetError) -> Self {
        Self::LevelSet(e)
    }
}

/// Segment `image` starting from `seed` under `config.weights`.
///
/// Pixels outside `domain` (e.g. off-disk) are replaced by the current
/// background mean before each batch. An empty seed is returned unchanged.
pub fn segment(
    image: &Field,
    domain: Option<&Mask>,
    seed: &Mask,
    config: &SegmentConfig,
    observer: &mut dyn EvolutionObserver,
) -> Result<Segmentation, SegmentError> {
    let mut controller = ConvergenceController::new(image, domain, config)?;
    if seed.area() == 0 {
        crate::levelset::check_shape(image.dimensions(), seed.dimensions())?;
        tracing::info!("empty seed, skipping evolution");
        return Ok(Segmentation {
            mask: seed.clone(),
            outcome: SegmentOutcome::EmptySeed,
        });
    }
    let start = controller.prepare_seed(seed);
    let result = controller.run(&start, &config.weights, observer)?;
    tracing::info!(
        "segmentation finished: {:?}, area={}",
        result.outcome,
        result.mask.area()
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levelset::BatchStop;
    use crate::metrics::iou;
    use crate::observer::{BatchLog, NoopObserver};
    use crate::test_utils::{disk_image, noisy};

    #[test]
    fn bright_disk_is_recovered() {
        let image = disk_image(64, 64, [32.0, 32.0], 10.0, 500.0, 100.0);
        let truth = Mask::disk(64, 64, [32.0, 32.0], 10.0);
        let seed = Mask::disk(64, 64, [32.0, 32.0], 5.0);
        let config = SegmentConfig::default();

        let mut log = BatchLog::default();
        let seg = segment(&image, None, &seed, &config, &mut log).unwrap();

        assert!(seg.outcome.is_converged(), "{:?}", seg.outcome);
        assert!(seg.outcome.batches() <= 20);
        let score = iou(&seg.mask, &truth).unwrap();
        assert!(score >= 0.9, "iou {score}");
        assert_eq!(log.batches.len(), seg.outcome.batches());
        assert_eq!(log.batches.last().map(|b| b.percent_new_diff), Some(0.0));
    }

    #[test]
    fn batch_reports_carry_steps_and_stop_reason() {
        let config = SegmentConfig::default();
        let iters = config.iters_between_checks;
        for scene in 0..4u64 {
            let image = noisy(
                &disk_image(48, 48, [24.0, 24.0], 8.0 + scene as f64, 500.0, 100.0),
                25.0,
                scene,
            );
            let seed = Mask::disk(48, 48, [24.0, 24.0], 4.0);
            let mut log = BatchLog::default();
            segment(&image, None, &seed, &config, &mut log).unwrap();
            assert!(!log.batches.is_empty());
            for report in &log.batches {
                assert!(report.steps <= iters, "scene {scene}: {report:?}");
                assert_eq!(
                    report.stop == BatchStop::Completed,
                    report.steps == iters,
                    "scene {scene}: {report:?}"
                );
            }
            let total: usize = log.batches.iter().map(|b| b.steps).sum();
            assert_eq!(total, log.steps, "scene {scene}");
        }
    }

    #[test]
    fn noisy_disk_with_off_disk_domain() {
        let clean = disk_image(64, 64, [30.0, 33.0], 9.0, 500.0, 100.0);
        let image = noisy(&clean, 30.0, 11);
        let truth = Mask::disk(64, 64, [30.0, 33.0], 9.0);
        let domain = Mask::disk(64, 64, [32.0, 32.0], 28.0);
        let seed = Mask::disk(64, 64, [30.0, 33.0], 4.0);
        let seg = segment(
            &image,
            Some(&domain),
            &seed,
            &SegmentConfig::default(),
            &mut NoopObserver,
        )
        .unwrap();
        assert!(seg.outcome.is_converged(), "{:?}", seg.outcome);
        assert!(iou(&seg.mask, &truth).unwrap() >= 0.85);
    }

    #[test]
    fn empty_seed_is_returned_unchanged() {
        let image = disk_image(16, 16, [8.0, 8.0], 4.0, 500.0, 100.0);
        let seed = Mask::new(16, 16);
        let mut log = BatchLog::default();
        let seg = segment(&image, None, &seed, &SegmentConfig::default(), &mut log).unwrap();
        assert_eq!(seg.outcome, SegmentOutcome::EmptySeed);
        assert_eq!(seg.mask, seed);
        assert!(log.batches.is_empty());
    }

    #[test]
    fn batch_cap_reports_not_converged() {
        let image = disk_image(64, 64, [32.0, 32.0], 20.0, 500.0, 100.0);
        let seed = Mask::disk(64, 64, [32.0, 32.0], 3.0);
        let config = SegmentConfig {
            max_batches: Some(1),
            ..SegmentConfig::default()
        };
        let seg = segment(&image, None, &seed, &config, &mut NoopObserver).unwrap();
        assert_eq!(seg.outcome, SegmentOutcome::NotConverged { batches: 1 });
        assert!(seg.mask.area() > seed.area());
    }

    #[test]
    fn seed_holes_are_filled_before_evolving() {
        let image = disk_image(40, 40, [20.0, 20.0], 8.0, 500.0, 100.0);
        let outer = Mask::disk(40, 40, [20.0, 20.0], 6.0);
        let inner = Mask::disk(40, 40, [20.0, 20.0], 2.0);
        let ring = Mask::from_fn(40, 40, |x, y| outer.get(x, y) && !inner.get(x, y));
        let config = SegmentConfig {
            max_batches: Some(1),
            iters_between_checks: 1,
            ..SegmentConfig::default()
        };
        let seg = segment(&image, None, &ring, &config, &mut NoopObserver).unwrap();
        assert!(seg.mask.get(20, 20));
    }
}
