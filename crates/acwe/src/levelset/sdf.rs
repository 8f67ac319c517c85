//! Mask → signed distance function.

use image::{GrayImage, Luma};
use imageproc::distance_transform::euclidean_squared_distance_transform;

use crate::field::{Field, Mask};

/// Convert a mask into the signed distance function evolved by the engine.
///
/// `phi = EDT(!mask) - EDT(mask) + mask - 0.5`, where `EDT(X)` is the exact
/// Euclidean distance to the nearest `false` pixel of `X`. Pixels on either
/// side of the contour get `|phi| = 0.5`, foreground is negative.
///
/// If one class is absent the distance to it is undefined; it saturates to
/// the image diagonal so `phi` stays finite.
pub fn to_sdf(mask: &Mask) -> Field {
    let (w, h) = mask.dimensions();
    let to_foreground = distance_to_class(mask, true);
    let to_background = distance_to_class(mask, false);

    let raw = mask
        .as_slice()
        .iter()
        .zip(to_foreground.iter().zip(&to_background))
        .map(|(&m, (&d_fg, &d_bg))| d_fg - d_bg + if m { 1.0 } else { 0.0 } - 0.5)
        .collect();
    Field::from_raw(w, h, raw).expect("sdf buffer length matches mask dimensions")
}

/// Euclidean distance from every pixel to the nearest pixel whose mask value
/// equals `class`.
fn distance_to_class(mask: &Mask, class: bool) -> Vec<f64> {
    let (w, h) = mask.dimensions();
    if !mask.as_slice().iter().any(|&v| v == class) {
        let diag = ((w as f64).powi(2) + (h as f64).powi(2)).sqrt();
        return vec![diag; mask.len()];
    }

    let mut targets = GrayImage::new(w, h);
    for (dst, &m) in targets.pixels_mut().zip(mask.as_slice()) {
        *dst = Luma([if m == class { 255 } else { 0 }]);
    }
    euclidean_squared_distance_transform(&targets)
        .as_raw()
        .iter()
        .map(|d2| d2.sqrt())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const NEIGHBORS_4: [(i64, i64); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

    fn has_opposite_neighbor(mask: &Mask, x: u32, y: u32) -> bool {
        let (w, h) = mask.dimensions();
        let v = mask.get(x, y);
        NEIGHBORS_4.iter().any(|&(dx, dy)| {
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            nx >= 0
                && ny >= 0
                && nx < w as i64
                && ny < h as i64
                && mask.get(nx as u32, ny as u32) != v
        })
    }

    #[test]
    fn sign_matches_mask_everywhere() {
        let mask = Mask::disk(40, 30, [18.0, 14.0], 7.5);
        let phi = to_sdf(&mask);
        for y in 0..30 {
            for x in 0..40 {
                let p = phi.get_pixel(x, y)[0];
                if mask.get(x, y) {
                    assert!(p <= -0.5, "fg ({x},{y}) phi={p}");
                } else {
                    assert!(p >= 0.5, "bg ({x},{y}) phi={p}");
                }
            }
        }
    }

    #[test]
    fn boundary_pixels_sit_at_half_pixel() {
        let mask = Mask::disk(32, 32, [15.5, 16.0], 6.0);
        let phi = to_sdf(&mask);
        let mut n_boundary = 0;
        for y in 0..32 {
            for x in 0..32 {
                if has_opposite_neighbor(&mask, x, y) {
                    n_boundary += 1;
                    assert_abs_diff_eq!(phi.get_pixel(x, y)[0].abs(), 0.5, epsilon = 1e-12);
                }
            }
        }
        assert!(n_boundary > 0);
    }

    #[test]
    fn distances_grow_away_from_contour() {
        // Vertical half-plane split at x = 10.
        let mask = Mask::from_fn(20, 5, |x, _| x < 10);
        let phi = to_sdf(&mask);
        assert_abs_diff_eq!(phi.get_pixel(9, 2)[0], -0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(phi.get_pixel(10, 2)[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(phi.get_pixel(5, 2)[0], -4.5, epsilon = 1e-12);
        assert_abs_diff_eq!(phi.get_pixel(15, 2)[0], 5.5, epsilon = 1e-12);
    }

    #[test]
    fn degenerate_masks_stay_finite() {
        let empty = to_sdf(&Mask::new(8, 6));
        assert!(empty.as_raw().iter().all(|v| v.is_finite() && *v > 0.0));
        let full = to_sdf(&Mask::new(8, 6).complement());
        assert!(full.as_raw().iter().all(|v| v.is_finite() && *v < 0.0));
    }
}
