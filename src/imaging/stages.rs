use std::fmt;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use super::codec::CanonicalImage;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Denoise,
    Enhance,
    Resize,
}

impl Operation {
    pub const ALL: [Operation; 3] = [Operation::Denoise, Operation::Enhance, Operation::Resize];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Denoise => "denoise",
            Operation::Enhance => "enhance",
            Operation::Resize => "resize",
        }
    }

    /// Label reported in `applied_operations`.
    pub fn label(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("unknown preprocessing operation `{s}`"))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PreprocessParams {
    pub contrast: f32,
    pub sharpness: f32,
    pub max_size: (u32, u32),
}

impl Default for PreprocessParams {
    fn default() -> Self {
        Self {
            contrast: 1.5,
            sharpness: 1.2,
            max_size: (800, 600),
        }
    }
}

/// Result of one stage: a new image, or the input left untouched and why.
#[derive(Clone, Debug, PartialEq)]
pub enum StageOutcome {
    Applied(CanonicalImage),
    Unchanged { reason: String },
}

impl StageOutcome {
    pub fn unchanged(reason: impl Into<String>) -> Self {
        StageOutcome::Unchanged {
            reason: reason.into(),
        }
    }
}

pub trait Stage: Send + Sync {
    fn apply(&self, image: &CanonicalImage, params: &PreprocessParams) -> StageOutcome;
}

/// 3x3 median filter with edge replication.
pub struct Denoise;

impl Stage for Denoise {
    fn apply(&self, image: &CanonicalImage, _params: &PreprocessParams) -> StageOutcome {
        if image.is_empty() {
            return StageOutcome::unchanged("image has no pixels");
        }
        StageOutcome::Applied(CanonicalImage::from_rgb(median3(image.as_rgb())))
    }
}

/// Contrast scaling followed by sharpness scaling.
pub struct Enhance;

impl Stage for Enhance {
    fn apply(&self, image: &CanonicalImage, params: &PreprocessParams) -> StageOutcome {
        if image.is_empty() {
            return StageOutcome::unchanged("image has no pixels");
        }
        if !params.contrast.is_finite() || !params.sharpness.is_finite() {
            return StageOutcome::unchanged(format!(
                "non-finite enhancement factors (contrast {}, sharpness {})",
                params.contrast, params.sharpness
            ));
        }
        let contrasted = adjust_contrast(image.as_rgb(), params.contrast);
        let sharpened = adjust_sharpness(&contrasted, params.sharpness);
        StageOutcome::Applied(CanonicalImage::from_rgb(sharpened))
    }
}

/// Aspect-preserving downscale; never upscales.
pub struct Resize;

impl Stage for Resize {
    fn apply(&self, image: &CanonicalImage, params: &PreprocessParams) -> StageOutcome {
        let (width, height) = image.dimensions();
        let (max_width, max_height) = params.max_size;
        if width <= max_width && height <= max_height {
            return StageOutcome::Applied(image.clone());
        }
        let Some((new_width, new_height)) = fit_within((width, height), params.max_size) else {
            return StageOutcome::unchanged(format!(
                "cannot fit {width}x{height} into {max_width}x{max_height}"
            ));
        };
        let resized = imageops::resize(image.as_rgb(), new_width, new_height, FilterType::Lanczos3);
        tracing::debug!(width, height, new_width, new_height, "resized image");
        StageOutcome::Applied(CanonicalImage::from_rgb(resized))
    }
}

/// Target dimensions using the smaller axis ratio, rounded down.
/// `None` when either side would collapse to zero.
pub fn fit_within(size: (u32, u32), max_size: (u32, u32)) -> Option<(u32, u32)> {
    let (width, height) = size;
    let (max_width, max_height) = max_size;
    if width == 0 || height == 0 {
        return None;
    }
    if width <= max_width && height <= max_height {
        return Some(size);
    }
    let (width, height) = (u64::from(width), u64::from(height));
    let (max_width, max_height) = (u64::from(max_width), u64::from(max_height));
    // Integer cross-multiplication keeps the constraining side exact.
    let (new_width, new_height) = if max_width * height <= max_height * width {
        (max_width, height * max_width / width)
    } else {
        (width * max_height / height, max_height)
    };
    if new_width == 0 || new_height == 0 {
        return None;
    }
    Some((new_width as u32, new_height as u32))
}

fn median3(source: &RgbImage) -> RgbImage {
    let (width, height) = source.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        let mut window = [[0u8; 9]; 3];
        let mut n = 0;
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let sx = (x as i64 + dx).clamp(0, width as i64 - 1) as u32;
                let sy = (y as i64 + dy).clamp(0, height as i64 - 1) as u32;
                let px = source.get_pixel(sx, sy);
                for c in 0..3 {
                    window[c][n] = px[c];
                }
                n += 1;
            }
        }
        let mut out = [0u8; 3];
        for c in 0..3 {
            window[c].sort_unstable();
            out[c] = window[c][4];
        }
        Rgb(out)
    })
}

/// Blends every channel away from (or towards) the mean luminance.
fn adjust_contrast(source: &RgbImage, factor: f32) -> RgbImage {
    if factor == 1.0 {
        return source.clone();
    }
    let pixel_count = source.width() as u64 * source.height() as u64;
    let luma_sum: u64 = source
        .pixels()
        .map(|px| (px[0] as u64 * 299 + px[1] as u64 * 587 + px[2] as u64 * 114) / 1000)
        .sum();
    let mean = (luma_sum as f32 / pixel_count as f32 + 0.5).floor();
    let mut out = source.clone();
    for px in out.pixels_mut() {
        for c in 0..3 {
            px[c] = blend(mean, px[c] as f32, factor);
        }
    }
    out
}

/// Blends against a smoothed copy; border pixels keep their values in the
/// smoothed copy.
fn adjust_sharpness(source: &RgbImage, factor: f32) -> RgbImage {
    if factor == 1.0 {
        return source.clone();
    }
    let (width, height) = source.dimensions();
    let smoothed = if width < 3 || height < 3 {
        source.clone()
    } else {
        RgbImage::from_fn(width, height, |x, y| {
            if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
                return *source.get_pixel(x, y);
            }
            let mut acc = [0u32; 3];
            for dy in 0..3 {
                for dx in 0..3 {
                    let weight = if dx == 1 && dy == 1 { 5 } else { 1 };
                    let px = source.get_pixel(x + dx - 1, y + dy - 1);
                    for c in 0..3 {
                        acc[c] += px[c] as u32 * weight;
                    }
                }
            }
            Rgb([
                ((acc[0] + 6) / 13) as u8,
                ((acc[1] + 6) / 13) as u8,
                ((acc[2] + 6) / 13) as u8,
            ])
        })
    };
    let mut out = source.clone();
    for (px, soft) in out.pixels_mut().zip(smoothed.pixels()) {
        for c in 0..3 {
            px[c] = blend(soft[c] as f32, px[c] as f32, factor);
        }
    }
    out
}

fn blend(degenerate: f32, value: f32, factor: f32) -> u8 {
    (degenerate + factor * (value - degenerate))
        .round()
        .clamp(0.0, 255.0) as u8
}
