//! Shared synthetic images for unit tests.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::field::{field_from_fn, Field};

fn dist(x: u32, y: u32, center: [f64; 2]) -> f64 {
    let dx = x as f64 - center[0];
    let dy = y as f64 - center[1];
    (dx * dx + dy * dy).sqrt()
}

/// Uniform background with one bright disk.
///
/// Pixels with `d <= radius` get `fg`, everything else `bg`.
pub(crate) fn disk_image(
    w: u32,
    h: u32,
    center: [f64; 2],
    radius: f64,
    fg: f64,
    bg: f64,
) -> Field {
    field_from_fn(w, h, |x, y| if dist(x, y, center) <= radius { fg } else { bg })
}

/// Bright core, dimmer halo around it, dark background.
///
/// - `core`  for `d <= core_radius`
/// - `halo`  for `core_radius < d <= halo_radius`
/// - `bg`    otherwise
pub(crate) fn core_halo_image(
    w: u32,
    h: u32,
    center: [f64; 2],
    core_radius: f64,
    halo_radius: f64,
    levels: [f64; 3],
) -> Field {
    let [core, halo, bg] = levels;
    field_from_fn(w, h, |x, y| {
        let d = dist(x, y, center);
        if d <= core_radius {
            core
        } else if d <= halo_radius {
            halo
        } else {
            bg
        }
    })
}

/// Synthetic full-disk EUV frame: bright quiet sun of radius `sun_radius`,
/// dark coronal hole of radius `hole_radius` at `hole_center`, faint corona
/// outside the limb.
pub(crate) fn sun_image(
    size: u32,
    sun_radius: f64,
    hole_center: [f64; 2],
    hole_radius: f64,
) -> Field {
    let c = [size as f64 / 2.0, size as f64 / 2.0];
    field_from_fn(size, size, |x, y| {
        if dist(x, y, c) > sun_radius {
            20.0
        } else if dist(x, y, hole_center) <= hole_radius {
            60.0
        } else {
            400.0
        }
    })
}

/// Add reproducible uniform noise in `[-amplitude, amplitude]`.
pub(crate) fn noisy(field: &Field, amplitude: f64, seed: u64) -> Field {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = field.clone();
    for p in out.pixels_mut() {
        p[0] += rng.gen_range(-amplitude..=amplitude);
    }
    out
}
