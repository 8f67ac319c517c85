//! Raster containers shared by every stage.
//!
//! Real-valued rasters (intensities, signed distances, confidence maps) are
//! plain `image` buffers with one `f64` channel. Binary masks get their own
//! type so that foreground/background is never confused with a 0/255 gray
//! level.

use image::{GrayImage, ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

/// Single-channel `f64` raster in row-major order.
pub type Field = ImageBuffer<Luma<f64>, Vec<f64>>;

/// Build a field by evaluating `f(x, y)` at every pixel.
pub fn field_from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f64) -> Field {
    ImageBuffer::from_fn(width, height, |x, y| Luma([f(x, y)]))
}

/// Build a field filled with a constant value.
pub fn field_filled(width: u32, height: u32, value: f64) -> Field {
    ImageBuffer::from_pixel(width, height, Luma([value]))
}

/// Arithmetic mean of `values` at the positions where `select` is true.
///
/// Returns `None` when nothing is selected.
pub(crate) fn masked_mean(values: &[f64], select: impl Fn(usize) -> bool) -> Option<f64> {
    let mut sum = 0.0;
    let mut n = 0usize;
    for (i, &v) in values.iter().enumerate() {
        if select(i) {
            sum += v;
            n += 1;
        }
    }
    (n > 0).then(|| sum / n as f64)
}

/// Binary segmentation mask; `true` marks foreground.
///
/// Serializes as `{width, height, runs}`: lengths of alternating runs over the
/// row-major pixels, starting with a possibly empty background run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "MaskRuns", try_from = "MaskRuns")]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

#[derive(Serialize, Deserialize)]
struct MaskRuns {
    width: u32,
    height: u32,
    runs: Vec<u64>,
}

impl From<Mask> for MaskRuns {
    fn from(mask: Mask) -> Self {
        let mut runs = Vec::new();
        let mut value = false;
        let mut len = 0u64;
        for &v in &mask.data {
            if v != value {
                runs.push(len);
                value = v;
                len = 0;
            }
            len += 1;
        }
        runs.push(len);
        Self {
            width: mask.width,
            height: mask.height,
            runs,
        }
    }
}

impl TryFrom<MaskRuns> for Mask {
    type Error = String;

    fn try_from(r: MaskRuns) -> Result<Self, Self::Error> {
        let expected = r.width as u64 * r.height as u64;
        let total = r
            .runs
            .iter()
            .try_fold(0u64, |acc, &n| acc.checked_add(n))
            .filter(|&t| t == expected)
            .ok_or_else(|| format!("mask runs do not cover {}x{} pixels", r.width, r.height))?;
        let mut data = Vec::with_capacity(total as usize);
        let mut value = false;
        for &n in &r.runs {
            data.extend(std::iter::repeat(value).take(n as usize));
            value = !value;
        }
        Ok(Self {
            width: r.width,
            height: r.height,
            data,
        })
    }
}

impl Mask {
    /// All-background mask.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![false; width as usize * height as usize],
        }
    }

    /// Wrap row-major data. Returns `None` if the length does not match.
    pub fn from_vec(width: u32, height: u32, data: Vec<bool>) -> Option<Self> {
        (data.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Filled disk `(x - cx)² + (y - cy)² <= r²`.
    pub fn disk(width: u32, height: u32, center_xy: [f64; 2], radius: f64) -> Self {
        let r2 = radius * radius;
        Self::from_fn(width, height, |x, y| {
            let dx = x as f64 - center_xy[0];
            let dy = y as f64 - center_xy[1];
            dx * dx + dy * dy <= r2
        })
    }

    /// Threshold a field: foreground where `pred(value)` holds.
    pub fn from_field(field: &Field, pred: impl Fn(f64) -> bool) -> Self {
        let (width, height) = field.dimensions();
        Self {
            width,
            height,
            data: field.as_raw().iter().map(|&v| pred(v)).collect(),
        }
    }

    /// Foreground wherever the gray level is non-zero.
    pub fn from_gray(gray: &GrayImage) -> Self {
        let (width, height) = gray.dimensions();
        Self {
            width,
            height,
            data: gray.as_raw().iter().map(|&v| v > 0).collect(),
        }
    }

    /// Render as 0 / 255 gray image.
    pub fn to_gray(&self) -> GrayImage {
        let raw = self.data.iter().map(|&v| if v { 255 } else { 0 }).collect();
        GrayImage::from_raw(self.width, self.height, raw)
            .expect("mask buffer length matches its dimensions")
    }

    /// Render as a 0.0 / 1.0 field.
    pub fn to_field(&self) -> Field {
        let raw = self.data.iter().map(|&v| if v { 1.0 } else { 0.0 }).collect();
        Field::from_raw(self.width, self.height, raw)
            .expect("mask buffer length matches its dimensions")
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.data[y as usize * self.width as usize + x as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        let idx = y as usize * self.width as usize + x as usize;
        self.data[idx] = value;
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [bool] {
        &mut self.data
    }

    /// Number of foreground pixels.
    pub fn area(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// Number of foreground pixels shared with `other`.
    pub fn intersection_area(&self, other: &Mask) -> usize {
        self.data
            .iter()
            .zip(&other.data)
            .filter(|(&a, &b)| a && b)
            .count()
    }

    /// Number of foreground pixels in either mask.
    pub fn union_area(&self, other: &Mask) -> usize {
        self.data
            .iter()
            .zip(&other.data)
            .filter(|(&a, &b)| a || b)
            .count()
    }

    pub fn complement(&self) -> Mask {
        Self {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| !v).collect(),
        }
    }

    pub fn same_shape(&self, other: &Mask) -> bool {
        self.dimensions() == other.dimensions()
    }

    pub fn matches_field(&self, field: &Field) -> bool {
        self.dimensions() == field.dimensions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_area_close_to_pi_r2() {
        let m = Mask::disk(64, 64, [32.0, 32.0], 10.0);
        let area = m.area() as f64;
        let expected = std::f64::consts::PI * 100.0;
        assert!((area - expected).abs() / expected < 0.05, "area {area}");
        assert!(m.get(32, 32));
        assert!(!m.get(0, 0));
    }

    #[test]
    fn gray_roundtrip_preserves_foreground() {
        let m = Mask::disk(20, 12, [8.0, 6.0], 4.0);
        let back = Mask::from_gray(&m.to_gray());
        assert_eq!(m, back);
    }

    #[test]
    fn serializes_as_runs() {
        let m = Mask::from_vec(3, 2, vec![true, true, false, false, false, true]).unwrap();
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"width": 3, "height": 2, "runs": [0, 2, 3, 1]})
        );
        let back: Mask = serde_json::from_value(json).unwrap();
        assert_eq!(back, m);

        let empty: Mask = serde_json::from_str(&serde_json::to_string(&Mask::new(4, 4)).unwrap())
            .unwrap();
        assert_eq!(empty, Mask::new(4, 4));
    }

    #[test]
    fn large_disk_serializes_compactly() {
        let m = Mask::disk(512, 512, [256.0, 256.0], 150.0);
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.len() < 10_000, "{} bytes", json.len());
        let back: Mask = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn runs_must_cover_the_raster() {
        let short = r#"{"width": 3, "height": 2, "runs": [1, 2]}"#;
        assert!(serde_json::from_str::<Mask>(short).is_err());
        let overflow = format!(r#"{{"width": 3, "height": 2, "runs": [{}, 7]}}"#, u64::MAX);
        assert!(serde_json::from_str::<Mask>(&overflow).is_err());
    }

    #[test]
    fn from_vec_rejects_bad_length() {
        assert!(Mask::from_vec(3, 3, vec![false; 8]).is_none());
        assert!(Mask::from_vec(3, 3, vec![false; 9]).is_some());
    }

    #[test]
    fn masked_mean_handles_empty_selection() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(masked_mean(&v, |i| i % 2 == 1), Some(3.0));
        assert_eq!(masked_mean(&v, |_| false), None);
    }

    #[test]
    fn intersection_and_union() {
        let a = Mask::from_fn(4, 1, |x, _| x < 2);
        let b = Mask::from_fn(4, 1, |x, _| x >= 1);
        assert_eq!(a.intersection_area(&b), 1);
        assert_eq!(a.union_area(&b), 4);
        assert_eq!(a.complement().area(), 2);
    }
}
