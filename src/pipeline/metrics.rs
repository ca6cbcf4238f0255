//! Image quality metrics: sharpness, contrast and brightness.
//!
//! All three metrics work on the 8-bit luma view produced by [`to_gray_601`]
//! and are deterministic. Each returns a `Result` so that callers can see why
//! a metric could not be computed, but the quality gate never fails on a
//! metric: [`QualityScore::measure`] and the lazy metrics used by the gate
//! collapse errors to fixed fallbacks:
//!
//! | Metric | Range | Fallback |
//! |--------|-------|----------|
//! | sharpness | `0..` (Laplacian variance) | `0.0` |
//! | contrast | `0..=1` (std / 255) | `0.0` |
//! | brightness | `0..=1` (mean / 255) | `0.5` |
//!
//! The brightness fallback sits in the middle of the accepted range, so an
//! unmeasurable image is never reported as too dark or too bright.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Longest side, in pixels, of the raster the Laplacian runs on.
pub const SHARPNESS_MAX_DIMENSION: u32 = 800;

pub const SHARPNESS_FALLBACK: f64 = 0.0;
pub const CONTRAST_FALLBACK: f64 = 0.0;
pub const BRIGHTNESS_FALLBACK: f64 = 0.5;

/// Why a metric could not be computed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricError {
    /// The image has no pixels at all.
    #[error("image has no pixels")]
    Empty,

    /// The Laplacian needs at least one interior pixel.
    #[error("image is {width}x{height} px; the Laplacian needs at least 3x3")]
    TooSmall { width: u32, height: u32 },

    /// Accumulation produced NaN or infinity.
    #[error("metric is not a finite number")]
    NotFinite,
}

/// The three measurements the quality gate looks at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub sharpness: f64,
    pub contrast: f64,
    pub brightness: f64,
}

impl QualityScore {
    /// Measure all three metrics, substituting the fallbacks on failure.
    pub fn measure(image: &DynamicImage) -> Self {
        let gray = to_gray_601(image);
        Self {
            sharpness: or_fallback("sharpness", sharpness_gray(&gray), SHARPNESS_FALLBACK),
            contrast: or_fallback("contrast", contrast_gray(&gray), CONTRAST_FALLBACK),
            brightness: or_fallback("brightness", brightness_gray(&gray), BRIGHTNESS_FALLBACK),
        }
    }
}

/// Variance of the Laplacian response over the (downsampled) luma raster.
///
/// The raster is first shrunk so that its longest side is at most
/// [`SHARPNESS_MAX_DIMENSION`] (Lanczos3, aspect preserved), then convolved
/// with `[[0,-1,0],[-1,4,-1],[0,-1,0]]` over interior pixels only.
pub fn sharpness(image: &DynamicImage) -> Result<f64, MetricError> {
    sharpness_gray(&to_gray_601(image))
}

/// Population standard deviation of luma, divided by 255.
pub fn contrast(image: &DynamicImage) -> Result<f64, MetricError> {
    contrast_gray(&to_gray_601(image))
}

/// Mean luma divided by 255.
pub fn brightness(image: &DynamicImage) -> Result<f64, MetricError> {
    brightness_gray(&to_gray_601(image))
}

/// Rec.601 luma with the fixed-point rounding of PIL's `convert("L")`:
/// `(R*19595 + G*38470 + B*7471 + 0x8000) >> 16`, i.e. 0.299/0.587/0.114.
/// Not `to_luma8`, which uses Rec.709 weights. Alpha is ignored.
pub fn to_gray_601(image: &DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_) => image.to_luma8(),
        _ => {
            let rgb = image.to_rgb8();
            let (w, h) = rgb.dimensions();
            GrayImage::from_fn(w, h, |x, y| Luma([luma_601(rgb.get_pixel(x, y).0)]))
        }
    }
}

fn luma_601([r, g, b]: [u8; 3]) -> u8 {
    let l = r as u32 * 19_595 + g as u32 * 38_470 + b as u32 * 7_471 + 0x8000;
    (l >> 16) as u8
}

/// Log a metric failure and substitute its fallback.
pub(crate) fn or_fallback(metric: &str, result: Result<f64, MetricError>, fallback: f64) -> f64 {
    match result {
        Ok(v) => v,
        Err(e) => {
            warn!("Could not compute {metric}: {e}; using {fallback}");
            fallback
        }
    }
}

// ── Grayscale kernels ────────────────────────────────────────────────────

pub(crate) fn sharpness_gray(gray: &GrayImage) -> Result<f64, MetricError> {
    let small = downsample(gray, SHARPNESS_MAX_DIMENSION);
    let (w, h) = small.dimensions();
    if w < 3 || h < 3 {
        return Err(MetricError::TooSmall {
            width: w,
            height: h,
        });
    }

    let px = small.as_raw();
    let (w, h) = (w as usize, h as usize);
    let at = |x: usize, y: usize| px[y * w + x] as f32;

    let mut response = Vec::with_capacity((w - 2) * (h - 2));
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let lap = 4.0 * at(x, y) - at(x - 1, y) - at(x + 1, y) - at(x, y - 1) - at(x, y + 1);
            response.push(lap as f64);
        }
    }

    finite(population_variance(&response))
}

pub(crate) fn contrast_gray(gray: &GrayImage) -> Result<f64, MetricError> {
    let px = gray.as_raw();
    if px.is_empty() {
        return Err(MetricError::Empty);
    }
    let values: Vec<f64> = px.iter().map(|&v| v as f64).collect();
    finite(population_variance(&values).sqrt() / 255.0)
}

pub(crate) fn brightness_gray(gray: &GrayImage) -> Result<f64, MetricError> {
    let px = gray.as_raw();
    if px.is_empty() {
        return Err(MetricError::Empty);
    }
    let sum: u64 = px.iter().map(|&v| v as u64).sum();
    finite(sum as f64 / px.len() as f64 / 255.0)
}

/// Shrink so the longest side is at most `max_dim`, truncating the short side.
pub(crate) fn downsample(gray: &GrayImage, max_dim: u32) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w <= max_dim && h <= max_dim {
        return gray.clone();
    }
    let (nw, nh) = if w > h {
        (max_dim, (h as f64 * (max_dim as f64 / w as f64)) as u32)
    } else {
        ((w as f64 * (max_dim as f64 / h as f64)) as u32, max_dim)
    };
    imageops::resize(gray, nw, nh, FilterType::Lanczos3)
}

fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

fn finite(v: f64) -> Result<f64, MetricError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(MetricError::NotFinite)
    }
}
