//! End-to-end runs on native-resolution frames.
//!
//! Both entry points follow the same preparation: downsample by
//! `resize_param`, optionally correct limb brightening, threshold a seed on
//! the scaled disk, then evolve with the disk as the valid domain. Returned
//! masks stay at working resolution; the header carries what is needed to
//! map them back.

use serde::{Deserialize, Serialize};

use crate::field::{Field, Mask};
use crate::header::AcweHeader;
use crate::observer::EvolutionObserver;
use crate::preprocess::{
    correct_limb_brightening, disk_mask, resize_image, PreprocessConfig, SolarDisk,
};
use crate::seed::{initial_mask, SeedConfig, SeedError, SeedResult};
use crate::segment::{segment, SegmentConfig, SegmentError, SegmentOutcome};
use crate::sweep::{confidence_sweep, SegmentationStack};

const INIT_MASK_METHOD: &str = "alpha*qs";

/// Full run configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AcweConfig {
    pub preprocess: PreprocessConfig,
    pub seed: SeedConfig,
    pub segment: SegmentConfig,
    /// Label of preprocessing done upstream, copied into the header.
    pub image_preprocess: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AcweError {
    Seed(SeedError),
    Segment(SegmentError),
}

impl std::fmt::Display for AcweError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Seed(e) => write!(f, "seeding failed: {}", e),
            Self::Segment(e) => write!(f, "segmentation failed: {}", e),
        }
    }
}

impl std::error::Error for AcweError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Seed(e) => Some(e),
            Self::Segment(e) => Some(e),
        }
    }
}

impl From<SeedError> for AcweError {
    fn from(e: SeedError) -> Self {
        Self::Seed(e)
    }
}

impl From<SegmentError> for AcweError {
    fn from(e: SegmentError) -> Self {
        Self::Segment(e)
    }
}

/// Single-weight segmentation of one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcweRun {
    /// Final mask at working resolution.
    pub mask: Mask,
    pub alpha: f64,
    pub init_mask: Mask,
    pub outcome: SegmentOutcome,
    pub header: AcweHeader,
}

/// Background-weight sweep of one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceRun {
    pub stack: SegmentationStack,
    pub alpha: f64,
    pub init_mask: Mask,
    pub header: AcweHeader,
}

struct Prepared {
    image: Field,
    disk: Mask,
    seed: SeedResult,
}

fn prepare(image: &Field, disk: &SolarDisk, config: &AcweConfig) -> Result<Prepared, AcweError> {
    let pre = &config.preprocess;
    let mut working = resize_image(image, pre.resize_param, pre.downsample);
    let scaled = disk.scaled(pre.resize_param);
    if pre.correct_limb_brightening {
        working = correct_limb_brightening(&working, &scaled);
    }
    let (w, h) = working.dimensions();
    tracing::info!(
        "working image {}x{} (resize_param={}), disk r={:.1}px",
        w,
        h,
        pre.resize_param,
        scaled.radius_px
    );
    let disk = disk_mask(w, h, &scaled);
    let seed = initial_mask(&working, &disk, &config.seed)?;
    Ok(Prepared {
        image: working,
        disk,
        seed,
    })
}

fn header(config: &AcweConfig, seed: &SeedResult, background_weights: Vec<f64>) -> AcweHeader {
    AcweHeader {
        correct_limb_brightening: config.preprocess.correct_limb_brightening,
        image_preprocess: config.image_preprocess.clone(),
        resize_param: config.preprocess.resize_param.max(1),
        foreground_weight: config.segment.weights.lambda_inside,
        background_weights,
        init_mask: seed.mask.clone(),
        init_mask_method: INIT_MASK_METHOD.to_string(),
        fill_init_holes: config.segment.fill_init_holes,
        init_alpha: config.seed.alpha,
        alpha: seed.alpha,
        narrowband: config.segment.narrowband,
        iters_between_checks: config.segment.iters_between_checks,
    }
}

/// Segment coronal holes in a native-resolution frame with the weights of
/// `config.segment`.
pub fn run_acwe(
    image: &Field,
    disk: &SolarDisk,
    config: &AcweConfig,
    observer: &mut dyn EvolutionObserver,
) -> Result<AcweRun, AcweError> {
    let prepared = prepare(image, disk, config)?;
    let result = segment(
        &prepared.image,
        Some(&prepared.disk),
        &prepared.seed.mask,
        &config.segment,
        observer,
    )?;
    let header = header(
        config,
        &prepared.seed,
        vec![config.segment.weights.lambda_outside],
    );
    Ok(AcweRun {
        mask: result.mask,
        alpha: prepared.seed.alpha,
        init_mask: prepared.seed.mask,
        outcome: result.outcome,
        header,
    })
}

/// Sweep `background_weights` over a native-resolution frame.
///
/// The stack is ordered like `background_weights`; failed weights are kept as
/// entries without a mask.
pub fn run_acwe_confidence_map(
    image: &Field,
    disk: &SolarDisk,
    config: &AcweConfig,
    background_weights: &[f64],
    observer: &mut dyn EvolutionObserver,
) -> Result<ConfidenceRun, AcweError> {
    let prepared = prepare(image, disk, config)?;
    let sweep = confidence_sweep(
        &prepared.image,
        Some(&prepared.disk),
        &prepared.seed.mask,
        &config.segment,
        background_weights,
        observer,
    )?;
    if sweep.stack.n_failed() > 0 {
        tracing::warn!(
            "{} of {} background weights failed",
            sweep.stack.n_failed(),
            sweep.stack.len()
        );
    }
    let header = header(config, &prepared.seed, background_weights.to_vec());
    Ok(ConfidenceRun {
        stack: sweep.stack,
        alpha: prepared.seed.alpha,
        init_mask: sweep.init_mask,
        header,
    })
}
