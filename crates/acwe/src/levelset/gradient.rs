//! Sobel gradient magnitude with reflective borders.
//!
//! For a 3x3 stencil, half-sample reflection (`d c b a | a b c d`) reads the
//! edge pixel itself, so out-of-range coordinates are simply clamped.

use crate::field::Field;

#[inline]
fn sobel_at(raw: &[f64], w: usize, h: usize, x: usize, y: usize) -> f64 {
    let xm = x.saturating_sub(1);
    let xp = (x + 1).min(w - 1);
    let ym = y.saturating_sub(1);
    let yp = (y + 1).min(h - 1);
    let at = |xx: usize, yy: usize| raw[yy * w + xx];

    let gx = (at(xp, ym) + 2.0 * at(xp, y) + at(xp, yp)) - (at(xm, ym) + 2.0 * at(xm, y) + at(xm, yp));
    let gy = (at(xm, yp) + 2.0 * at(x, yp) + at(xp, yp)) - (at(xm, ym) + 2.0 * at(x, ym) + at(xp, ym));
    (gx * gx + gy * gy).sqrt()
}

/// `sqrt(gx² + gy²)` of the 3x3 Sobel responses over the whole field.
pub fn gradient_magnitude(field: &Field) -> Field {
    let (w, h) = field.dimensions();
    let (wu, hu) = (w as usize, h as usize);
    let raw = field.as_raw();
    let mut out = Vec::with_capacity(raw.len());
    for y in 0..hu {
        for x in 0..wu {
            out.push(sobel_at(raw, wu, hu, x, y));
        }
    }
    Field::from_raw(w, h, out).expect("gradient buffer length matches field dimensions")
}

/// Gradient magnitude evaluated only at the given row-major indices.
///
/// Equal to `gradient_magnitude(field)` sampled at `indices`.
pub fn gradient_magnitude_at(field: &Field, indices: &[usize]) -> Vec<f64> {
    let (w, h) = field.dimensions();
    let (wu, hu) = (w as usize, h as usize);
    let raw = field.as_raw();
    indices
        .iter()
        .map(|&i| sobel_at(raw, wu, hu, i % wu, i / wu))
        .collect()
}
