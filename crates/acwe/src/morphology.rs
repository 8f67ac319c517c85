//! Binary morphology on masks.

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::field::Mask;

/// Fill topological holes: background regions (4-connected) that do not
/// touch the image border become foreground.
pub fn fill_holes(mask: &Mask) -> Mask {
    let (w, h) = mask.dimensions();
    if w == 0 || h == 0 {
        return mask.clone();
    }

    let mut background = GrayImage::new(w, h);
    for (dst, &m) in background.pixels_mut().zip(mask.as_slice()) {
        *dst = Luma([if m { 0 } else { 255 }]);
    }
    let labels = connected_components(&background, Connectivity::Four, Luma([0u8]));

    let n_labels = labels.as_raw().iter().copied().max().unwrap_or(0) as usize;
    let mut touches_border = vec![false; n_labels + 1];
    for x in 0..w {
        touches_border[labels.get_pixel(x, 0)[0] as usize] = true;
        touches_border[labels.get_pixel(x, h - 1)[0] as usize] = true;
    }
    for y in 0..h {
        touches_border[labels.get_pixel(0, y)[0] as usize] = true;
        touches_border[labels.get_pixel(w - 1, y)[0] as usize] = true;
    }

    let data = mask
        .as_slice()
        .iter()
        .zip(labels.as_raw())
        .map(|(&m, &label)| m || !touches_border[label as usize])
        .collect();
    Mask::from_vec(w, h, data).unwrap_or_else(|| mask.clone())
}
