//! Reduction of a segmentation stack into a confidence map.
//!
//! Two modes:
//! - **simple**: every layer counts, normalized by the stack size;
//! - **smart**: layers are walked by ascending background weight and the walk
//!   stops at the first layer whose coverage of the seed region drops sharply
//!   (change of target). Only that accepted prefix is combined and the map is
//!   normalized by the number of accepted layers.

use serde::{Deserialize, Serialize};

use crate::field::{field_filled, Field, Mask};
use crate::header::AcweHeader;
use crate::metrics::intersection_over_original;
use crate::resample::{upscale_mask, Interpolation};
use crate::sweep::SegmentationStack;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineMode {
    Simple,
    #[default]
    Smart,
}

impl std::str::FromStr for CombineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "smart" => Ok(Self::Smart),
            other => Err(format!("unknown combine mode '{}'", other)),
        }
    }
}

/// Confidence-map reduction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReduceConfig {
    pub mode: CombineMode,
    /// Divide the summed layers by the number of combined layers.
    pub normalize: bool,
    /// Upscale every layer by the header's resize factor before summing.
    pub restore_scale: bool,
    pub interpolation: Interpolation,
    /// Upscaled layers are foreground where the interpolated value exceeds
    /// this threshold.
    pub split: f64,
    /// Tolerated drop of intersection-over-original between consecutive
    /// accepted layers (smart mode).
    pub buffer: f64,
}

impl Default for ReduceConfig {
    fn default() -> Self {
        Self {
            mode: CombineMode::Smart,
            normalize: true,
            restore_scale: true,
            interpolation: Interpolation::Bilinear,
            split: 0.5,
            buffer: 0.05,
        }
    }
}

/// Combined map and the layers that went into it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceMap {
    /// Per-pixel count (or fraction, when normalized) of foreground layers.
    pub map: Field,
    /// Seed mask at the resolution of `map`.
    pub init_mask: Mask,
    /// Stack indices that were combined, in combination order.
    pub accepted_indices: Vec<usize>,
    pub accepted_weights: Vec<f64>,
    pub normalized: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReduceError {
    EmptyStack,
    /// Intersection-over-original is undefined for an empty seed.
    EmptyInitialMask,
    NoAcceptedSegmentations,
    /// A layer needed for the combination failed during the sweep.
    MissingSegmentation { index: usize },
    ShapeMismatch { expected: [u32; 2], got: [u32; 2] },
    InvalidResizeParam(u32),
}

impl std::fmt::Display for ReduceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyStack => write!(f, "segmentation stack is empty"),
            Self::EmptyInitialMask => write!(f, "initial mask has no foreground"),
            Self::NoAcceptedSegmentations => write!(f, "no segmentation accepted for the map"),
            Self::MissingSegmentation { index } => {
                write!(f, "stack entry {} has no segmentation", index)
            }
            Self::ShapeMismatch { expected, got } => write!(
                f,
                "shape mismatch: expected {}x{}, got {}x{}",
                expected[0], expected[1], got[0], got[1]
            ),
            Self::InvalidResizeParam(v) => write!(
                f,
                "resize parameter {} is zero or scales the map beyond u32 pixels",
                v
            ),
        }
    }
}

impl std::error::Error for ReduceError {}

fn check_shape(expected: &Mask, got: &Mask) -> Result<(), ReduceError> {
    if expected.same_shape(got) {
        Ok(())
    } else {
        Err(ReduceError::ShapeMismatch {
            expected: [expected.width(), expected.height()],
            got: [got.width(), got.height()],
        })
    }
}

/// Walk the stack by ascending weight and return the accepted prefix.
///
/// A layer is rejected when `ioo + buffer <= ioo_last`, where `ioo_last` is
/// the intersection-over-original of the last accepted layer (initially 0).
/// The first rejection, or a layer missing from the stack, ends the walk.
pub fn change_of_target_prefix(
    stack: &SegmentationStack,
    init_mask: &Mask,
    buffer: f64,
) -> Result<Vec<usize>, ReduceError> {
    if init_mask.area() == 0 {
        return Err(ReduceError::EmptyInitialMask);
    }
    let mut accepted = Vec::new();
    let mut ioo_last = 0.0;
    for idx in stack.ascending_order() {
        let entry = &stack.entries[idx];
        let Some(seg) = entry.segmentation.as_ref() else {
            tracing::warn!("stack entry {} (weight {}) missing, ending walk", idx, entry.weight);
            break;
        };
        check_shape(init_mask, seg)?;
        let ioo = intersection_over_original(seg, init_mask).unwrap_or(0.0);
        if ioo + buffer <= ioo_last {
            tracing::info!(
                "change of target at weight {} (ioo {:.3} after {:.3})",
                entry.weight,
                ioo,
                ioo_last
            );
            break;
        }
        accepted.push(idx);
        ioo_last = ioo;
    }
    Ok(accepted)
}

fn sum_layers(
    stack: &SegmentationStack,
    indices: &[usize],
    init_mask: &Mask,
    scale: Option<(u32, Interpolation, f64)>,
) -> Result<(Field, Mask), ReduceError> {
    let rescale = |mask: &Mask| -> Result<Mask, ReduceError> {
        match scale {
            Some((factor, interp, split)) => upscale_mask(mask, factor, interp, split)
                .ok_or(ReduceError::InvalidResizeParam(factor)),
            None => Ok(mask.clone()),
        }
    };
    let init = rescale(init_mask)?;
    let mut map = field_filled(init.width(), init.height(), 0.0);
    for &idx in indices {
        let seg = stack.entries[idx]
            .segmentation
            .as_ref()
            .ok_or(ReduceError::MissingSegmentation { index: idx })?;
        check_shape(init_mask, seg)?;
        let layer = rescale(seg)?;
        let acc: &mut [f64] = &mut map;
        for (v, &m) in acc.iter_mut().zip(layer.as_slice()) {
            if m {
                *v += 1.0;
            }
        }
    }
    Ok((map, init))
}

fn finish(
    stack: &SegmentationStack,
    indices: Vec<usize>,
    init_mask: &Mask,
    resize_param: u32,
    config: &ReduceConfig,
    n_norm: usize,
) -> Result<ConfidenceMap, ReduceError> {
    if resize_param < 1 {
        return Err(ReduceError::InvalidResizeParam(resize_param));
    }
    let scale = config
        .restore_scale
        .then_some((resize_param, config.interpolation, config.split));
    let (mut map, init) = sum_layers(stack, &indices, init_mask, scale)?;
    if config.normalize {
        if n_norm == 0 {
            return Err(ReduceError::NoAcceptedSegmentations);
        }
        let n = n_norm as f64;
        for p in map.pixels_mut() {
            p[0] /= n;
        }
    }
    Ok(ConfidenceMap {
        map,
        init_mask: init,
        accepted_weights: indices.iter().map(|&i| stack.entries[i].weight).collect(),
        accepted_indices: indices,
        normalized: config.normalize,
    })
}

/// Sum every layer; normalization divides by the stack size.
pub fn combine(
    stack: &SegmentationStack,
    init_mask: &Mask,
    resize_param: u32,
    config: &ReduceConfig,
) -> Result<ConfidenceMap, ReduceError> {
    if stack.is_empty() {
        return Err(ReduceError::EmptyStack);
    }
    let indices = stack.ascending_order();
    finish(stack, indices, init_mask, resize_param, config, stack.len())
}

/// Sum the change-of-target-free prefix; normalization divides by the number
/// of accepted layers.
pub fn smart_combine(
    stack: &SegmentationStack,
    init_mask: &Mask,
    resize_param: u32,
    config: &ReduceConfig,
) -> Result<ConfidenceMap, ReduceError> {
    if stack.is_empty() {
        return Err(ReduceError::EmptyStack);
    }
    let indices = change_of_target_prefix(stack, init_mask, config.buffer)?;
    if indices.is_empty() {
        return Err(ReduceError::NoAcceptedSegmentations);
    }
    tracing::info!("{} of {} layers accepted", indices.len(), stack.len());
    let n = indices.len();
    finish(stack, indices, init_mask, resize_param, config, n)
}

/// Reduce a sweep stack into a confidence map using the seed mask and resize
/// factor recorded in `header`.
pub fn reduce_confidence_map(
    stack: &SegmentationStack,
    header: &AcweHeader,
    config: &ReduceConfig,
) -> Result<ConfidenceMap, ReduceError> {
    match config.mode {
        CombineMode::Simple => combine(stack, &header.init_mask, header.resize_param, config),
        CombineMode::Smart => smart_combine(stack, &header.init_mask, header.resize_param, config),
    }
}
