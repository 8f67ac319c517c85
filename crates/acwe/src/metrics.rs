//! Overlap scores between segmentations.

use crate::field::{Field, Mask};

/// Binary Jaccard index `|a ∩ b| / |a ∪ b|`.
///
/// `None` when the masks differ in shape or both are empty.
pub fn iou(a: &Mask, b: &Mask) -> Option<f64> {
    if !a.same_shape(b) {
        return None;
    }
    let union = a.union_area(b);
    (union > 0).then(|| a.intersection_area(b) as f64 / union as f64)
}

/// Weighted Jaccard index `Σ min(a, b) / Σ max(a, b)` of two non-negative maps,
/// e.g. two confidence maps.
pub fn weighted_iou(a: &Field, b: &Field) -> Option<f64> {
    if a.dimensions() != b.dimensions() {
        return None;
    }
    let (mut num, mut den) = (0.0, 0.0);
    for (&x, &y) in a.as_raw().iter().zip(b.as_raw()) {
        num += x.min(y);
        den += x.max(y);
    }
    (den > 0.0).then(|| num / den)
}

/// Intersection over original: `|mask ∩ original| / |original|`.
///
/// Measures how much of the seed region a segmentation still covers.
pub fn intersection_over_original(mask: &Mask, original: &Mask) -> Option<f64> {
    if !mask.same_shape(original) {
        return None;
    }
    let area = original.area();
    (area > 0).then(|| mask.intersection_area(original) as f64 / area as f64)
}
