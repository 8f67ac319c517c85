//! acwe: active contours without edges for coronal hole segmentation.
//!
//! Segments dark regions of full-disk EUV frames with a Chan–Vese level set
//! evolved in a narrow band. The stages are:
//!
//! 1. **Preprocess** – downsampling to working resolution, limb-brightening
//!    correction, solar disk mask.
//! 2. **Seed** – threshold at a fraction of the quiet-sun level.
//! 3. **Level set** – signed distance reinitialization, region force,
//!    CFL-limited explicit steps.
//! 4. **Segment** – batches of steps under a convergence controller that
//!    stops once no pixel flips for the first time.
//! 5. **Sweep** – one warm-started run per background weight.
//! 6. **Confidence** – reduction of the sweep stack into a per-pixel
//!    confidence map, optionally stopping at a change of target.
//!
//! # Public API
//! - [`run_acwe`] and [`run_acwe_confidence_map`] for native frames
//! - [`segment()`], [`confidence_sweep`] and [`reduce_confidence_map`] for
//!   prepared working images
//! - [`EvolutionObserver`] to watch steps and batches
//! - [`SegmentationRecord`] to persist a sweep as JSON

mod confidence;
mod field;
mod header;
pub mod levelset;
pub mod metrics;
pub mod morphology;
mod observer;
mod pipeline;
pub mod preprocess;
pub mod resample;
mod seed;
mod segment;
mod sweep;

#[cfg(test)]
mod test_utils;

pub use confidence::{
    change_of_target_prefix, combine, reduce_confidence_map, smart_combine, CombineMode,
    ConfidenceMap, ReduceConfig, ReduceError,
};
pub use field::{field_filled, field_from_fn, Field, Mask};
pub use header::{AcweHeader, RecordError, SegmentationRecord};
pub use levelset::{BatchStop, EnergyWeights, LevelSetError};
pub use observer::{BatchLog, BatchReport, EvolutionObserver, NoopObserver, StepView};
pub use pipeline::{run_acwe, run_acwe_confidence_map, AcweConfig, AcweError, AcweRun, ConfidenceRun};
pub use preprocess::{PreprocessConfig, SolarDisk};
pub use resample::Interpolation;
pub use seed::{initial_mask, quiet_sun_level, SeedConfig, SeedError, SeedResult};
pub use segment::{
    segment, ConvergenceController, SegmentConfig, SegmentError, SegmentOutcome, Segmentation,
};
pub use sweep::{
    confidence_sweep, unique_ascending, SegmentationStack, StackEntry, SweepConfig, SweepResult,
};
