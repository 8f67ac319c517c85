//! Threshold seed for the active contour.
//!
//! The quiet-sun level is the centre of the fullest bin of a 100-bin
//! histogram of on-disk intensities; the seed is every on-disk pixel at or
//! below `alpha` times that level.

use serde::{Deserialize, Serialize};

use crate::field::{Field, Mask};

const HISTOGRAM_BINS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Threshold as a fraction of the quiet-sun level.
    pub alpha: f64,
    /// Increment applied to `alpha` while the seed is empty; `0` disables it.
    pub rolling_alpha: f64,
    /// Maximum number of increments before giving up.
    pub max_alpha_steps: usize,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            rolling_alpha: 0.0,
            max_alpha_steps: 1000,
        }
    }
}

/// Seed mask (holes not filled) and the alpha that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedResult {
    pub mask: Mask,
    pub alpha: f64,
    pub quiet_sun_level: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SeedError {
    /// No pixel of the image lies on the disk.
    EmptyDisk,
    /// The rolling alpha reached its step limit with the seed still empty.
    AlphaExhausted { alpha: f64, steps: usize },
    ShapeMismatch,
}

impl std::fmt::Display for SeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyDisk => write!(f, "solar disk mask is empty"),
            Self::AlphaExhausted { alpha, steps } => write!(
                f,
                "seed still empty after {} alpha increments (alpha = {})",
                steps, alpha
            ),
            Self::ShapeMismatch => write!(f, "image and disk mask shapes differ"),
        }
    }
}

impl std::error::Error for SeedError {}

/// Centre of the fullest bin of an equal-width histogram over `[min, max]`.
/// Ties go to the lowest bin.
pub fn quiet_sun_level(values: &[f64], bins: usize) -> Option<f64> {
    if values.is_empty() || bins == 0 {
        return None;
    }
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(lo.is_finite() && hi.is_finite()) {
        return None;
    }
    // A flat sample is spread over [v - 0.5, v + 0.5].
    let (lo, hi) = if hi > lo { (lo, hi) } else { (lo - 0.5, hi + 0.5) };
    let width = (hi - lo) / bins as f64;

    let mut counts = vec![0usize; bins];
    for &v in values {
        let k = (((v - lo) / width) as usize).min(bins - 1);
        counts[k] += 1;
    }
    let mut best = 0;
    for (k, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = k;
        }
    }
    Some(lo + (best as f64 + 0.5) * width)
}

fn threshold_mask(image: &Field, disk: &Mask, threshold: f64) -> Mask {
    let data = image
        .as_raw()
        .iter()
        .zip(disk.as_slice())
        .map(|(&v, &on)| on && v <= threshold)
        .collect();
    Mask::from_vec(disk.width(), disk.height(), data)
        .unwrap_or_else(|| Mask::new(disk.width(), disk.height()))
}

/// Threshold seed inside `disk`.
///
/// With `rolling_alpha > 0`, an empty seed is retried with alpha raised by
/// `rolling_alpha` until a pixel is selected.
pub fn initial_mask(image: &Field, disk: &Mask, config: &SeedConfig) -> Result<SeedResult, SeedError> {
    if !disk.matches_field(image) {
        return Err(SeedError::ShapeMismatch);
    }
    let on_disk: Vec<f64> = image
        .as_raw()
        .iter()
        .zip(disk.as_slice())
        .filter(|&(_, &on)| on)
        .map(|(&v, _)| v)
        .collect();
    let qs = quiet_sun_level(&on_disk, HISTOGRAM_BINS).ok_or(SeedError::EmptyDisk)?;

    let mut alpha = config.alpha;
    let mut mask = threshold_mask(image, disk, alpha * qs);
    if config.rolling_alpha > 0.0 {
        let mut steps = 0;
        while mask.area() == 0 {
            if steps >= config.max_alpha_steps {
                return Err(SeedError::AlphaExhausted { alpha, steps });
            }
            alpha += config.rolling_alpha;
            steps += 1;
            mask = threshold_mask(image, disk, alpha * qs);
        }
        if steps > 0 {
            tracing::warn!("empty seed at alpha {}, rolled to {}", config.alpha, alpha);
        }
    }
    tracing::debug!("seed: qs={:.3} alpha={} area={}", qs, alpha, mask.area());

    Ok(SeedResult {
        mask,
        alpha,
        quiet_sun_level: qs,
    })
}
