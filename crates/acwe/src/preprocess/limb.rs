//! Annulus-mean limb-brightening correction.
//!
//! Off-limb and near-limb EUV intensity rises towards the solar edge. Each
//! one-pixel annulus between `0.7 R` and `1.12 R` is rescaled so its mean
//! matches the on-disk median. The correction is applied fully on
//! `(0.95 R, 1.08 R]` and blended in with a half-sine ramp on both sides.

use super::SolarDisk;
use crate::field::Field;

const R_INNER: f64 = 0.7;
const R_FULL_START: f64 = 0.95;
const R_FULL_END: f64 = 1.08;
const R_OUTER: f64 = 1.12;

/// One-pixel annuli `(start + k, start + k + 1]`, `k in 0..count`.
#[derive(Debug, Clone, Copy)]
struct Annuli {
    start: f64,
    count: usize,
}

impl Annuli {
    fn spanning(from: f64, to: f64) -> Self {
        Self {
            start: from,
            count: (to - from).max(0.0).ceil() as usize,
        }
    }

    fn index(&self, d: f64) -> Option<usize> {
        let t = d - self.start;
        if t <= 0.0 {
            return None;
        }
        let k = t.ceil() as usize - 1;
        (k < self.count).then_some(k)
    }

    /// Inner radius of annulus `k`.
    fn radius(&self, k: usize) -> f64 {
        self.start + k as f64
    }
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let n = values.len();
    Some(if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    })
}

/// Correct limb brightening of a working-resolution image around `disk`.
///
/// Pixels inside `0.7 R` and outside the outer blend ring are returned
/// unchanged. An image without on-disk pixels is returned as is.
pub fn correct_limb_brightening(image: &Field, disk: &SolarDisk) -> Field {
    let (w, h) = image.dimensions();
    let radius = disk.radius_px;
    let raw = image.as_raw();
    let dist: Vec<f64> = (0..h)
        .flat_map(|y| (0..w).map(move |x| (x, y)))
        .map(|(x, y)| disk.distance(x, y))
        .collect();

    let on_disk: Vec<f64> = raw
        .iter()
        .zip(&dist)
        .filter(|&(_, &d)| d <= radius)
        .map(|(&v, _)| v)
        .collect();
    let Some(quiet_level) = median(on_disk) else {
        tracing::warn!("no on-disk pixels, limb correction skipped");
        return image.clone();
    };

    // Annulus means over [0.7 R, 1.12 R).
    let all = Annuli::spanning(R_INNER * radius, R_OUTER * radius);
    let mut sums = vec![0.0; all.count];
    let mut counts = vec![0usize; all.count];
    for (&v, &d) in raw.iter().zip(&dist) {
        if let Some(k) = all.index(d) {
            sums[k] += v;
            counts[k] += 1;
        }
    }
    let annulus_mean: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(&s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
        .collect();

    let corrected = |v: f64, d: f64| -> f64 {
        match all.index(d).map(|k| annulus_mean[k]) {
            Some(m) if m > 0.0 => quiet_level * v / m,
            _ => 0.0,
        }
    };

    let inner_ramp = Annuli::spanning(R_INNER * radius, R_FULL_START * radius);
    let outer_ramp = Annuli::spanning(R_FULL_END * radius, R_OUTER * radius);

    let out: Vec<f64> = raw
        .iter()
        .zip(&dist)
        .map(|(&v, &d)| {
            if let Some(k) = outer_ramp.index(d) {
                let r = outer_ramp.radius(k) / radius;
                let f = 0.5
                    * (std::f64::consts::PI / (R_OUTER - R_FULL_END)
                        * (r + (R_OUTER - 3.0 * R_FULL_END) / 2.0))
                        .sin()
                    + 0.5;
                (1.0 - f) * v + f * corrected(v, d)
            } else if let Some(k) = inner_ramp.index(d) {
                let r = inner_ramp.radius(k) / radius;
                let f = 0.5
                    * (std::f64::consts::PI / (R_FULL_START - R_INNER)
                        * (r - (R_INNER + R_FULL_START) / 2.0))
                        .sin()
                    + 0.5;
                (1.0 - f) * v + f * corrected(v, d)
            } else if d > R_FULL_START * radius && d <= R_FULL_END * radius {
                corrected(v, d)
            } else {
                v
            }
        })
        .collect();

    Field::from_raw(w, h, out).unwrap_or_else(|| image.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::field_from_fn;
    use approx::assert_abs_diff_eq;

    fn limb_brightened(size: u32, radius: f64) -> (Field, SolarDisk) {
        let disk = SolarDisk {
            center_xy: [size as f64 / 2.0, size as f64 / 2.0],
            radius_px: radius,
        };
        let image = field_from_fn(size, size, |x, y| {
            let r = disk.distance(x, y) / radius;
            if r <= 1.0 {
                100.0 * (1.0 + 2.0 * r.powi(6))
            } else {
                300.0 * (-(r - 1.0) * 10.0).exp()
            }
        });
        (image, disk)
    }

    #[test]
    fn centre_and_far_corona_are_untouched() {
        let (image, disk) = limb_brightened(128, 50.0);
        let out = correct_limb_brightening(&image, &disk);
        assert_eq!(out.get_pixel(64, 64), image.get_pixel(64, 64));
        assert_eq!(out.get_pixel(64, 80), image.get_pixel(64, 80));
        assert_eq!(out.get_pixel(1, 1), image.get_pixel(1, 1));
    }

    #[test]
    fn full_correction_band_is_flattened_to_median() {
        let (image, disk) = limb_brightened(128, 50.0);
        let out = correct_limb_brightening(&image, &disk);
        // Radially symmetric input: every annulus maps onto the median level.
        let inside_median = median(
            (0..128u32)
                .flat_map(|y| (0..128u32).map(move |x| (x, y)))
                .filter(|&(x, y)| disk.distance(x, y) <= 50.0)
                .map(|(x, y)| image.get_pixel(x, y)[0])
                .collect(),
        )
        .unwrap();
        // d = 50 sits on the limb, inside the full-correction ring.
        let corrected = out.get_pixel(114, 64)[0];
        let brightened = image.get_pixel(114, 64)[0];
        assert!(brightened > inside_median * 1.5);
        assert!((corrected - inside_median).abs() < 0.25 * inside_median);
    }

    #[test]
    fn median_averages_middle_pair() {
        assert_eq!(median(vec![3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(vec![4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(Vec::new()), None);
    }

    #[test]
    fn annulus_indexing_is_half_open() {
        let a = Annuli::spanning(10.0, 12.5);
        assert_eq!(a.count, 3);
        assert_eq!(a.index(10.0), None);
        assert_eq!(a.index(10.5), Some(0));
        assert_eq!(a.index(11.0), Some(0));
        assert_eq!(a.index(13.0), Some(2));
        assert_eq!(a.index(13.01), None);
        assert_abs_diff_eq!(a.radius(2), 12.0);
    }
}
