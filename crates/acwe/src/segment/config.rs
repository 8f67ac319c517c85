use serde::{Deserialize, Serialize};

use super::SegmentError;
use crate::levelset::EnergyWeights;

/// Configuration of a convergence-controlled segmentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Energy weights. For sweeps only `lambda_outside` is replaced per run.
    pub weights: EnergyWeights,
    /// Narrowband half-width in pixels; must be at least 1.
    pub narrowband: u32,
    /// Explicit steps per batch between convergence checks.
    pub iters_between_checks: usize,
    /// Fill topological holes of the seed before evolving.
    pub fill_init_holes: bool,
    /// Safety cap on the number of batches. `None` runs until the stopping
    /// criterion fires, which is not guaranteed for adversarial inputs.
    pub max_batches: Option<usize>,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            weights: EnergyWeights::default(),
            narrowband: 2,
            iters_between_checks: 10,
            fill_init_holes: true,
            max_batches: Some(500),
        }
    }
}

impl SegmentConfig {
    pub fn validate(&self) -> Result<(), SegmentError> {
        if self.narrowband < 1 {
            return Err(SegmentError::InvalidConfig(format!(
                "narrowband must be >= 1, got {}",
                self.narrowband
            )));
        }
        if self.iters_between_checks < 1 {
            return Err(SegmentError::InvalidConfig(
                "iters_between_checks must be >= 1".to_string(),
            ));
        }
        if self.max_batches == Some(0) {
            return Err(SegmentError::InvalidConfig(
                "max_batches must be >= 1 when set".to_string(),
            ));
        }
        let w = &self.weights;
        if !(w.lambda_inside.is_finite() && w.lambda_outside.is_finite()) {
            return Err(SegmentError::InvalidConfig(
                "region weights must be finite".to_string(),
            ));
        }
        Ok(())
    }
}
