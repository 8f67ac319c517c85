//! Working-resolution preparation of full-disk EUV frames.

mod limb;

pub use limb::correct_limb_brightening;

use serde::{Deserialize, Serialize};

use crate::field::{Field, Mask};
use crate::resample::{resize_field, Interpolation};

/// Solar disk geometry in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolarDisk {
    /// Disk centre `[x, y]`, zero-based.
    pub center_xy: [f64; 2],
    /// Disk radius in pixels.
    pub radius_px: f64,
}

impl SolarDisk {
    /// Same disk at `1 / resize_param` resolution.
    pub fn scaled(&self, resize_param: u32) -> Self {
        let s = resize_param.max(1) as f64;
        Self {
            center_xy: [self.center_xy[0] / s, self.center_xy[1] / s],
            radius_px: self.radius_px / s,
        }
    }

    #[inline]
    pub fn distance(&self, x: u32, y: u32) -> f64 {
        let dx = x as f64 - self.center_xy[0];
        let dy = y as f64 - self.center_xy[1];
        (dx * dx + dy * dy).sqrt()
    }

    /// Centred disk of radius `0.4 * min(w, h)`; used when no geometry is
    /// available.
    pub fn centered(width: u32, height: u32) -> Self {
        Self {
            center_xy: [(width as f64 - 1.0) / 2.0, (height as f64 - 1.0) / 2.0],
            radius_px: 0.4 * width.min(height) as f64,
        }
    }
}

/// Preprocessing applied before seeding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Integer downsampling factor per axis; `1` keeps native resolution.
    pub resize_param: u32,
    /// Kernel used for downsampling.
    pub downsample: Interpolation,
    pub correct_limb_brightening: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            resize_param: 8,
            downsample: Interpolation::Bicubic,
            correct_limb_brightening: true,
        }
    }
}

/// Working dimensions for a native size and resize factor.
pub fn working_dimensions(width: u32, height: u32, resize_param: u32) -> (u32, u32) {
    let s = resize_param.max(1) as f64;
    let scale = |v: u32| ((v as f64 / s).round() as u32).max(1);
    (scale(width), scale(height))
}

/// Downsample `image` by `resize_param` in each axis. Factors `<= 1` copy.
pub fn resize_image(image: &Field, resize_param: u32, interpolation: Interpolation) -> Field {
    if resize_param <= 1 {
        return image.clone();
    }
    let (w, h) = image.dimensions();
    let (nw, nh) = working_dimensions(w, h, resize_param);
    resize_field(image, nw, nh, interpolation)
}

/// Pixels with `(x - cx)² + (y - cy)² <= r²`.
pub fn disk_mask(width: u32, height: u32, disk: &SolarDisk) -> Mask {
    Mask::disk(width, height, disk.center_xy, disk.radius_px)
}
