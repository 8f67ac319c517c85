//! Progress hooks for the evolution loop.

use serde::{Deserialize, Serialize};

use crate::field::Field;
use crate::levelset::{BatchStop, RegionMeans};

/// State of one explicit step, borrowed from the running evolution.
#[derive(Debug, Clone, Copy)]
pub struct StepView<'a> {
    /// Step index within the current batch.
    pub step: usize,
    /// Level set after the step.
    pub phi: &'a Field,
    /// Region means the step was driven by.
    pub means: RegionMeans,
    /// Timestep used.
    pub dt: f64,
    /// Number of narrowband pixels updated.
    pub band_len: usize,
}

/// Summary of one batch of the convergence loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Zero-based batch index.
    pub batch: usize,
    /// Pixels that changed class in this batch.
    pub changed: usize,
    /// `changed / area * 100`.
    pub percent_diff: f64,
    /// Share of this batch's changes that were never seen before, in percent.
    pub percent_new_diff: f64,
    /// Foreground area after the batch.
    pub area: usize,
    /// Explicit steps the batch actually ran.
    pub steps: usize,
    /// Why the batch ended; anything but `Completed` means it ran short.
    pub stop: BatchStop,
}

/// Receives evolution progress. Both hooks default to no-ops.
///
/// Rendering, progress bars and live plots belong in an implementation of
/// this trait, never in the numerical loop itself.
///
/// # Example
///
/// ```
/// use acwe::{BatchReport, EvolutionObserver};
///
/// #[derive(Default)]
/// struct Areas(Vec<usize>);
///
/// impl EvolutionObserver for Areas {
///     fn on_batch(&mut self, report: &BatchReport) {
///         self.0.push(report.area);
///     }
/// }
/// ```
pub trait EvolutionObserver {
    /// Called after every explicit step.
    fn on_step(&mut self, _view: &StepView<'_>) {}
    /// Called after every batch, once the convergence metrics are known.
    fn on_batch(&mut self, _report: &BatchReport) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl EvolutionObserver for NoopObserver {}

/// Collects every batch report; handy for diagnostics dumps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchLog {
    pub batches: Vec<BatchReport>,
    pub steps: usize,
}

impl EvolutionObserver for BatchLog {
    fn on_step(&mut self, _view: &StepView<'_>) {
        self.steps += 1;
    }

    fn on_batch(&mut self, report: &BatchReport) {
        self.batches.push(*report);
    }
}
