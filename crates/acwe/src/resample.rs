//! Resizing of fields and masks between native and working resolution.

use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};

use crate::field::{Field, Mask};

/// Interpolation kernel for resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    Nearest,
    #[default]
    Bilinear,
    Bicubic,
    Gaussian,
    Lanczos3,
}

impl Interpolation {
    pub fn filter(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Bilinear => FilterType::Triangle,
            Self::Bicubic => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl std::str::FromStr for Interpolation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "bilinear" => Ok(Self::Bilinear),
            "bicubic" => Ok(Self::Bicubic),
            "gaussian" => Ok(Self::Gaussian),
            "lanczos3" => Ok(Self::Lanczos3),
            other => Err(format!("unknown interpolation '{}'", other)),
        }
    }
}

/// Resize a field to `width x height`.
///
/// `imageops::resize` clamps float samples to `[0, 1]`, so values are mapped
/// onto that range first and restored afterwards.
pub fn resize_field(field: &Field, width: u32, height: u32, interpolation: Interpolation) -> Field {
    if field.dimensions() == (width, height) {
        return field.clone();
    }
    let raw = field.as_raw();
    let lo = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = if hi > lo { hi - lo } else { 1.0 };
    let lo = if lo.is_finite() { lo } else { 0.0 };

    let mut unit = field.clone();
    for p in unit.pixels_mut() {
        p[0] = (p[0] - lo) / span;
    }
    let mut out = imageops::resize(&unit, width, height, interpolation.filter());
    for p in out.pixels_mut() {
        p[0] = p[0] * span + lo;
    }
    out
}

/// `(width * factor, height * factor)`, or `None` when either side overflows
/// `u32`.
pub fn upscaled_dimensions(width: u32, height: u32, factor: u32) -> Option<(u32, u32)> {
    Some((width.checked_mul(factor)?, height.checked_mul(factor)?))
}

/// Scale a binary mask by an integer factor in each axis and re-binarize the
/// interpolated 0/1 layer with `value > split`.
///
/// Returns `None` when the scaled dimensions do not fit in `u32`.
pub fn upscale_mask(
    mask: &Mask,
    factor: u32,
    interpolation: Interpolation,
    split: f64,
) -> Option<Mask> {
    if factor <= 1 {
        return Some(mask.clone());
    }
    let (w, h) = upscaled_dimensions(mask.width(), mask.height(), factor)?;
    let layer = imageops::resize(&mask.to_field(), w, h, interpolation.filter());
    Some(Mask::from_field(&layer, |v| v > split))
}
