//! Background-weight sweep producing a stack of segmentations.
//!
//! Weights are visited once per unique value in ascending order, each run
//! warm-started from the previous converged mask: for this energy the
//! foreground only grows as the background weight increases. Results are
//! reported back in the caller's order, duplicates sharing one run.

use serde::{Deserialize, Serialize};

use crate::field::{Field, Mask};
use crate::observer::EvolutionObserver;
use crate::segment::{ConvergenceController, SegmentConfig, SegmentError, SegmentOutcome};

/// Background weights of a confidence sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Background (`lambda_outside`) values to evaluate, any order.
    pub background_weights: Vec<f64>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            background_weights: (10..=100).map(|k| 1.0 / k as f64).collect(),
        }
    }
}

/// One requested weight and what the sweep produced for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackEntry {
    pub weight: f64,
    /// `None` when the run for this weight failed.
    pub segmentation: Option<Mask>,
    pub outcome: Option<SegmentOutcome>,
    /// Error message of a failed run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// Segmentations indexed like the requested weights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentationStack {
    pub entries: Vec<StackEntry>,
}

impl SegmentationStack {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn weights(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.weight).collect()
    }

    /// Entry indices by ascending weight; equal weights keep their order.
    pub fn ascending_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        order.sort_by(|&a, &b| self.entries[a].weight.total_cmp(&self.entries[b].weight));
        order
    }

    /// Number of entries whose run failed.
    pub fn n_failed(&self) -> usize {
        self.entries.iter().filter(|e| e.segmentation.is_none()).count()
    }
}

/// Stack plus the seed it started from (before hole filling).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub stack: SegmentationStack,
    pub init_mask: Mask,
}

/// Sorted unique values of `weights`.
pub fn unique_ascending(weights: &[f64]) -> Vec<f64> {
    let mut w = weights.to_vec();
    w.sort_by(f64::total_cmp);
    w.dedup();
    w
}

/// Run the controller for every background weight, smallest first.
///
/// The foreground weight and every other setting come from `config`. A weight
/// whose run fails is recorded as a failure and the sweep goes on from the
/// last successful mask. An empty seed yields all-empty masks without
/// evolving anything.
pub fn confidence_sweep(
    image: &Field,
    domain: Option<&Mask>,
    seed: &Mask,
    config: &SegmentConfig,
    background_weights: &[f64],
    observer: &mut dyn EvolutionObserver,
) -> Result<SweepResult, SegmentError> {
    let mut controller = ConvergenceController::new(image, domain, config)?;
    crate::levelset::check_shape(image.dimensions(), seed.dimensions())?;
    if let Some(bad) = background_weights.iter().find(|w| !w.is_finite()) {
        return Err(SegmentError::InvalidConfig(format!(
            "background weight {} is not finite",
            bad
        )));
    }

    let mut entries: Vec<StackEntry> = background_weights
        .iter()
        .map(|&weight| StackEntry {
            weight,
            segmentation: None,
            outcome: None,
            failure: None,
        })
        .collect();

    if seed.area() == 0 {
        tracing::info!("empty seed, sweep yields empty masks");
        for e in &mut entries {
            e.segmentation = Some(Mask::new(seed.width(), seed.height()));
            e.outcome = Some(SegmentOutcome::EmptySeed);
        }
        return Ok(SweepResult {
            stack: SegmentationStack { entries },
            init_mask: seed.clone(),
        });
    }

    let unique = unique_ascending(background_weights);
    tracing::info!(
        "sweeping {} background weights ({} requested)",
        unique.len(),
        background_weights.len()
    );

    let mut current = controller.prepare_seed(seed);
    for &w in &unique {
        let weights = config.weights.with_background(w);
        let result = controller.run(&current, &weights, observer);
        match &result {
            Ok(seg) => tracing::info!(
                "lambda_out={:.5}: {:?}, area={}",
                w,
                seg.outcome,
                seg.mask.area()
            ),
            Err(e) => tracing::warn!("lambda_out={:.5} failed: {}", w, e),
        }

        for e in entries.iter_mut().filter(|e| e.weight == w) {
            match &result {
                Ok(seg) => {
                    e.segmentation = Some(seg.mask.clone());
                    e.outcome = Some(seg.outcome);
                }
                Err(err) => e.failure = Some(err.to_string()),
            }
        }
        if let Ok(seg) = result {
            current = seg.mask;
        }
    }

    Ok(SweepResult {
        stack: SegmentationStack { entries },
        init_mask: seed.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{BatchLog, NoopObserver};
    use crate::segment::segment;
    use crate::test_utils::{core_halo_image, noisy};

    fn halo_scene() -> (Field, Mask) {
        let image = core_halo_image(64, 64, [32.0, 32.0], 6.0, 12.0, [500.0, 300.0, 100.0]);
        let seed = Mask::disk(64, 64, [32.0, 32.0], 4.0);
        (image, seed)
    }

    #[test]
    fn area_grows_with_background_weight() {
        let (image, seed) = halo_scene();
        let weights = [2.0, 1.0 / 50.0, 0.5];
        let r = confidence_sweep(
            &image,
            None,
            &seed,
            &SegmentConfig::default(),
            &weights,
            &mut NoopObserver,
        )
        .unwrap();

        let area = |i: usize| r.stack.entries[i].segmentation.as_ref().unwrap().area();
        assert!(area(1) <= area(2));
        assert!(area(2) <= area(0));

        let core = Mask::disk(64, 64, [32.0, 32.0], 6.0);
        let halo = Mask::disk(64, 64, [32.0, 32.0], 12.0);
        assert_eq!(r.stack.entries[1].segmentation.as_ref(), Some(&core));
        assert_eq!(r.stack.entries[0].segmentation.as_ref(), Some(&halo));
        assert_eq!(r.init_mask, seed);
    }

    #[test]
    fn later_weight_resumes_from_previous_mask() {
        let (image, seed) = halo_scene();
        let config = SegmentConfig::default();
        let core = Mask::disk(64, 64, [32.0, 32.0], 6.0);
        let mut log = BatchLog::default();
        let r = confidence_sweep(&image, None, &seed, &config, &[0.02, 0.5], &mut log).unwrap();

        // At 0.5 the core is already stable, so a warm start changes nothing.
        assert_eq!(r.stack.entries[1].segmentation.as_ref(), Some(&core));
        assert_eq!(
            r.stack.entries[1].outcome,
            Some(SegmentOutcome::Converged { batches: 1 })
        );
        let first_of_second_run = log.batches.iter().filter(|b| b.batch == 0).nth(1).unwrap();
        assert_eq!(first_of_second_run.changed, 0);
        assert_eq!(first_of_second_run.area, core.area());

        let cold_config = SegmentConfig {
            weights: config.weights.with_background(0.5),
            ..SegmentConfig::default()
        };
        let cold = segment(&image, None, &seed, &cold_config, &mut NoopObserver).unwrap();
        assert!(cold.outcome.batches() > 1, "{:?}", cold.outcome);
    }

    #[test]
    fn area_is_monotone_over_noisy_scenes() {
        let weights = [0.02, 0.1, 0.5, 2.0];
        for scene in 0..6u64 {
            let core_r = 5.0 + (scene % 3) as f64;
            let halo_r = 11.0 + (scene % 3) as f64;
            let center = [31.0 + (scene % 2) as f64, 32.0];
            let clean = core_halo_image(64, 64, center, core_r, halo_r, [500.0, 300.0, 100.0]);
            let image = noisy(&clean, 20.0, scene);
            let seed = Mask::disk(64, 64, center, 3.0);
            let r = confidence_sweep(
                &image,
                None,
                &seed,
                &SegmentConfig::default(),
                &weights,
                &mut NoopObserver,
            )
            .unwrap();

            assert_eq!(r.stack.n_failed(), 0, "scene {scene}");
            let areas: Vec<usize> = r
                .stack
                .entries
                .iter()
                .map(|e| e.segmentation.as_ref().unwrap().area())
                .collect();
            for pair in areas.windows(2) {
                assert!(pair[0] <= pair[1], "scene {scene}: areas {areas:?}");
            }
            assert!(areas[0] < areas[3], "scene {scene}: areas {areas:?}");
        }
    }

    #[test]
    fn duplicates_share_one_result_in_caller_order() {
        let (image, seed) = halo_scene();
        let weights = [0.1, 0.02, 0.1];
        let r = confidence_sweep(
            &image,
            None,
            &seed,
            &SegmentConfig::default(),
            &weights,
            &mut NoopObserver,
        )
        .unwrap();
        assert_eq!(r.stack.weights(), weights.to_vec());
        assert_eq!(r.stack.entries[0], r.stack.entries[2]);
        assert_eq!(r.stack.ascending_order(), vec![1, 0, 2]);
    }

    #[test]
    fn empty_seed_gives_empty_stack_entries() {
        let (image, _) = halo_scene();
        let seed = Mask::new(64, 64);
        let r = confidence_sweep(
            &image,
            None,
            &seed,
            &SegmentConfig::default(),
            &[0.02, 0.05],
            &mut NoopObserver,
        )
        .unwrap();
        for e in &r.stack.entries {
            assert_eq!(e.segmentation.as_ref().map(Mask::area), Some(0));
            assert_eq!(e.outcome, Some(SegmentOutcome::EmptySeed));
        }
    }

    #[test]
    fn failing_weight_is_recorded_and_sweep_continues() {
        // Without a background term the force is never positive.
        let (image, seed) = halo_scene();
        let r = confidence_sweep(
            &image,
            None,
            &seed,
            &SegmentConfig::default(),
            &[1.0 / 50.0, 0.0],
            &mut NoopObserver,
        )
        .unwrap();
        assert_eq!(r.stack.n_failed(), 1);
        assert!(r.stack.entries[1].failure.is_some());
        assert_eq!(
            r.stack.entries[0].segmentation.as_ref(),
            Some(&Mask::disk(64, 64, [32.0, 32.0], 6.0))
        );
    }

    #[test]
    fn default_weights_cover_one_over_ten_to_hundred() {
        let w = SweepConfig::default().background_weights;
        assert_eq!(w.len(), 91);
        assert_eq!(w[0], 0.1);
        assert_eq!(w[90], 0.01);
    }
}
