//! Geometric and photometric normalization of a single radiograph.
//!
//! The pipeline is fixed:
//! 1. grayscale with ITU-R 601-2 luma weights,
//! 2. resize so the short side is `target - 1` with the long side capped at `target`,
//! 3. scale to [0, 1] and apply `(x - mean) / std`,
//! 4. zero-pad (in normalized space) to a `target x target` canvas.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};

use crate::error::{ChexpertError, ChexpertResult};

/// Edge length of the square model input.
pub const TARGET_SIZE: u32 = 224;

/// Dataset-wide pixel statistics for the single grayscale channel.
pub const MEAN: f32 = 0.5035;
pub const STD: f32 = 0.2883;

// ---------------------------------------------------------------------------
// Resize geometry
// ---------------------------------------------------------------------------

/// Output `(width, height)` when resizing so the shorter side becomes `size`
/// while the longer side never exceeds `max_size`.
///
/// Integer division gives the floor of each ratio.
pub fn resized_dims(width: u32, height: u32, size: u32, max_size: u32) -> (u32, u32) {
    let (short, long) = if width <= height {
        (width, height)
    } else {
        (height, width)
    };
    let short = u64::from(short.max(1));
    let long = u64::from(long);

    let mut new_short = u64::from(size);
    let mut new_long = new_short * long / short;
    if new_long > u64::from(max_size) {
        new_short = u64::from(max_size) * new_short / new_long;
        new_long = u64::from(max_size);
    }

    let (new_short, new_long) = (new_short as u32, new_long as u32);
    if width <= height {
        (new_short, new_long)
    } else {
        (new_long, new_short)
    }
}

// ---------------------------------------------------------------------------
// Square padding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Padding {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

/// Padding that turns an `height x width` image into a square.
///
/// Unequal sides split the gap with the larger half on the right/bottom.
/// Equal sides short of `target` get the whole gap on the top *and* the
/// left, nothing on the bottom/right.
pub fn square_padding(height: u32, width: u32, target: u32) -> Padding {
    use std::cmp::Ordering;

    match height.cmp(&width) {
        Ordering::Greater => {
            let gap = height - width;
            let left = gap / 2;
            Padding {
                left,
                right: gap - left,
                ..Padding::default()
            }
        }
        Ordering::Equal => {
            let gap = target.saturating_sub(height);
            Padding {
                left: gap,
                top: gap,
                ..Padding::default()
            }
        }
        Ordering::Less => {
            let gap = width - height;
            let top = gap / 2;
            Padding {
                top,
                bottom: gap - top,
                ..Padding::default()
            }
        }
    }
}

/// Zero-pad a single `height x width` plane. Returns the new plane and its
/// `(height, width)`.
pub fn pad_plane(plane: &[f32], height: u32, width: u32, pad: Padding) -> (Vec<f32>, u32, u32) {
    let out_h = height + pad.top + pad.bottom;
    let out_w = width + pad.left + pad.right;
    let mut out = vec![0.0f32; (out_h * out_w) as usize];

    for (y, row) in plane.chunks_exact(width as usize).enumerate() {
        let start = ((y as u32 + pad.top) * out_w + pad.left) as usize;
        out[start..start + row.len()].copy_from_slice(row);
    }
    (out, out_h, out_w)
}

// ---------------------------------------------------------------------------
// Photometric normalization
// ---------------------------------------------------------------------------

/// Scale 8-bit pixels to [0, 1], then apply `(x - mean) / std`.
pub fn normalize(gray: &GrayImage, mean: f32, std: f32) -> Vec<f32> {
    gray.as_raw()
        .iter()
        .map(|&v| (f32::from(v) / 255.0 - mean) / std)
        .collect()
}

/// Inverse of [`normalize`] back to 8-bit, clamping out-of-range values.
pub fn denormalize(plane: &[f32], mean: f32, std: f32) -> Vec<u8> {
    plane
        .iter()
        .map(|&v| ((v * std + mean) * 255.0).round().clamp(0.0, 255.0) as u8)
        .collect()
}

// ---------------------------------------------------------------------------
// Grayscale
// ---------------------------------------------------------------------------

/// Single-channel conversion with ITU-R 601-2 weights (299/587/114 per mille)
/// in the 16-bit fixed-point form PIL's `"L"` mode uses. 8-bit luma input is
/// passed through untouched.
pub fn to_luma(img: &DynamicImage) -> GrayImage {
    if let DynamicImage::ImageLuma8(gray) = img {
        return gray.clone();
    }
    let rgb = img.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let l = (u32::from(r) * 19595 + u32::from(g) * 38470 + u32::from(b) * 7471 + 0x8000)
            >> 16;
        Luma([l as u8])
    })
}

// ---------------------------------------------------------------------------
// Full pipeline
// ---------------------------------------------------------------------------

/// Run the whole pipeline on a decoded image. Output is a single CHW plane of
/// `TARGET_SIZE * TARGET_SIZE` values.
pub fn prepare(img: &DynamicImage) -> ChexpertResult<Vec<f32>> {
    let gray = to_luma(img);
    let (w, h) = gray.dimensions();
    let (new_w, new_h) = resized_dims(w, h, TARGET_SIZE - 1, TARGET_SIZE);
    if new_w == 0 || new_h == 0 {
        return Err(ChexpertError::Geometry {
            height: new_h,
            width: new_w,
        });
    }
    let resized = if (new_w, new_h) == (w, h) {
        gray
    } else {
        image::imageops::resize(&gray, new_w, new_h, FilterType::Triangle)
    };

    let plane = normalize(&resized, MEAN, STD);
    let pad = square_padding(new_h, new_w, TARGET_SIZE);
    let (padded, out_h, out_w) = pad_plane(&plane, new_h, new_w, pad);

    if out_h != TARGET_SIZE || out_w != TARGET_SIZE {
        return Err(ChexpertError::Geometry {
            height: out_h,
            width: out_w,
        });
    }
    Ok(padded)
}
