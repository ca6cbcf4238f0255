//! The quality gate: accept or reject a decoded photo.
//!
//! Checks run in the fixed order of [`CHECK_ORDER`] and stop at the first
//! failure, so a rejected image always carries exactly one
//! [`QualityRejection`]:
//!
//! ```text
//! resolution ─▶ file size ─▶ sharpness ─▶ contrast ─▶ too dark ─▶ too bright
//! ```
//!
//! Resolution and size come from the caller. The three pixel metrics are
//! pulled through a [`MetricSource`], which lets the gate run either on a
//! real image ([`LazyMetrics`], computing each metric only when its check is
//! reached) or on precomputed numbers ([`QualityScore`]).

use crate::config::QualityThresholds;
use crate::pipeline::metrics::{self, QualityScore};
use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// One step of the quality gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityCheck {
    Resolution,
    FileSize,
    Sharpness,
    Contrast,
    MinBrightness,
    MaxBrightness,
}

/// Evaluation order. The first failing check wins.
pub const CHECK_ORDER: [QualityCheck; 6] = [
    QualityCheck::Resolution,
    QualityCheck::FileSize,
    QualityCheck::Sharpness,
    QualityCheck::Contrast,
    QualityCheck::MinBrightness,
    QualityCheck::MaxBrightness,
];

/// Why an image failed the gate. Every variant carries the observed value
/// and the threshold it was compared against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QualityRejection {
    Resolution {
        width: u32,
        height: u32,
        min_width: u32,
        min_height: u32,
    },
    FileSize {
        size_kb: f64,
        min_kb: u64,
    },
    Blurry {
        sharpness: f64,
        min: f64,
    },
    LowContrast {
        contrast: f64,
        min: f64,
    },
    TooDark {
        brightness: f64,
        min: f64,
    },
    TooBright {
        brightness: f64,
        max: f64,
    },
}

impl QualityRejection {
    /// The check that produced this rejection.
    pub fn check(&self) -> QualityCheck {
        match self {
            QualityRejection::Resolution { .. } => QualityCheck::Resolution,
            QualityRejection::FileSize { .. } => QualityCheck::FileSize,
            QualityRejection::Blurry { .. } => QualityCheck::Sharpness,
            QualityRejection::LowContrast { .. } => QualityCheck::Contrast,
            QualityRejection::TooDark { .. } => QualityCheck::MinBrightness,
            QualityRejection::TooBright { .. } => QualityCheck::MaxBrightness,
        }
    }
}

impl fmt::Display for QualityRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityRejection::Resolution {
                width,
                height,
                min_width,
                min_height,
            } => write!(
                f,
                "Insufficient resolution ({width}x{height} px). Minimum: {min_width}x{min_height} px."
            ),
            QualityRejection::FileSize { size_kb, min_kb } => write!(
                f,
                "File too small ({} KB). Minimum: {min_kb} KB.",
                size_kb.trunc() as u64
            ),
            QualityRejection::Blurry { sharpness, min } => write!(
                f,
                "Image is blurry or out of focus. Sharpness score: {sharpness:.1} (minimum: {min}). \
                 Please take a new photo with better focus and lighting."
            ),
            QualityRejection::LowContrast { contrast, min } => write!(
                f,
                "Image has low contrast. Contrast score: {contrast:.3} (minimum: {min}). \
                 Please take a new photo with better lighting."
            ),
            QualityRejection::TooDark { brightness, min } => write!(
                f,
                "Image is too dark. Brightness: {brightness:.3} (minimum: {min}). \
                 Please take a new photo with better lighting."
            ),
            QualityRejection::TooBright { brightness, max } => write!(
                f,
                "Image is too bright / overexposed. Brightness: {brightness:.3} (maximum: {max}). \
                 Please take a new photo with adequate lighting."
            ),
        }
    }
}

/// Result of the gate.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accepted,
    Rejected(QualityRejection),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    /// User-facing reason: `"OK"` when accepted.
    pub fn reason(&self) -> String {
        match self {
            Verdict::Accepted => "OK".to_string(),
            Verdict::Rejected(r) => r.to_string(),
        }
    }
}

/// Supplies the pixel metrics to the gate on demand.
pub trait MetricSource {
    fn sharpness(&mut self) -> f64;
    fn contrast(&mut self) -> f64;
    fn brightness(&mut self) -> f64;
}

impl MetricSource for QualityScore {
    fn sharpness(&mut self) -> f64 {
        self.sharpness
    }

    fn contrast(&mut self) -> f64 {
        self.contrast
    }

    fn brightness(&mut self) -> f64 {
        self.brightness
    }
}

/// Computes each metric from an image the first time it is asked for.
pub struct LazyMetrics<'a> {
    image: &'a DynamicImage,
    gray: Option<GrayImage>,
    sharpness: Option<f64>,
    contrast: Option<f64>,
    brightness: Option<f64>,
}

impl<'a> LazyMetrics<'a> {
    pub fn new(image: &'a DynamicImage) -> Self {
        Self {
            image,
            gray: None,
            sharpness: None,
            contrast: None,
            brightness: None,
        }
    }

    fn gray(&mut self) -> &GrayImage {
        let image = self.image;
        self.gray.get_or_insert_with(|| metrics::to_gray_601(image))
    }
}

impl MetricSource for LazyMetrics<'_> {
    fn sharpness(&mut self) -> f64 {
        if let Some(v) = self.sharpness {
            return v;
        }
        let v = metrics::or_fallback(
            "sharpness",
            metrics::sharpness_gray(self.gray()),
            metrics::SHARPNESS_FALLBACK,
        );
        *self.sharpness.insert(v)
    }

    fn contrast(&mut self) -> f64 {
        if let Some(v) = self.contrast {
            return v;
        }
        let v = metrics::or_fallback(
            "contrast",
            metrics::contrast_gray(self.gray()),
            metrics::CONTRAST_FALLBACK,
        );
        *self.contrast.insert(v)
    }

    fn brightness(&mut self) -> f64 {
        if let Some(v) = self.brightness {
            return v;
        }
        let v = metrics::or_fallback(
            "brightness",
            metrics::brightness_gray(self.gray()),
            metrics::BRIGHTNESS_FALLBACK,
        );
        *self.brightness.insert(v)
    }
}

/// Facts about the upload known before decoding pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageFacts {
    pub width: u32,
    pub height: u32,
    pub file_size_kb: f64,
}

/// Applies [`QualityThresholds`] in [`CHECK_ORDER`].
#[derive(Debug, Clone)]
pub struct QualityEvaluator {
    thresholds: QualityThresholds,
}

impl QualityEvaluator {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    /// Evaluate a decoded image.
    pub fn evaluate(
        &self,
        image: &DynamicImage,
        file_size_kb: f64,
        width: u32,
        height: u32,
    ) -> Verdict {
        let facts = ImageFacts {
            width,
            height,
            file_size_kb,
        };
        self.evaluate_with(&mut LazyMetrics::new(image), facts)
    }

    /// Evaluate against any metric source.
    pub fn evaluate_with<M: MetricSource>(&self, metrics: &mut M, facts: ImageFacts) -> Verdict {
        for check in CHECK_ORDER {
            if let Some(rejection) = self.run_check(check, metrics, facts) {
                debug!("Quality check {check:?} failed: {rejection}");
                return Verdict::Rejected(rejection);
            }
        }

        info!(
            "Image approved - sharpness: {:.1}, contrast: {:.3}, brightness: {:.3}",
            metrics.sharpness(),
            metrics.contrast(),
            metrics.brightness()
        );
        Verdict::Accepted
    }

    fn run_check<M: MetricSource>(
        &self,
        check: QualityCheck,
        metrics: &mut M,
        facts: ImageFacts,
    ) -> Option<QualityRejection> {
        let t = &self.thresholds;
        match check {
            QualityCheck::Resolution => (facts.width < t.min_width || facts.height < t.min_height)
                .then_some(QualityRejection::Resolution {
                    width: facts.width,
                    height: facts.height,
                    min_width: t.min_width,
                    min_height: t.min_height,
                }),
            QualityCheck::FileSize => (facts.file_size_kb < t.min_filesize_kb as f64).then_some(
                QualityRejection::FileSize {
                    size_kb: facts.file_size_kb,
                    min_kb: t.min_filesize_kb,
                },
            ),
            QualityCheck::Sharpness => {
                let sharpness = metrics.sharpness();
                (sharpness < t.min_sharpness).then_some(QualityRejection::Blurry {
                    sharpness,
                    min: t.min_sharpness,
                })
            }
            QualityCheck::Contrast => {
                let contrast = metrics.contrast();
                (contrast < t.min_contrast).then_some(QualityRejection::LowContrast {
                    contrast,
                    min: t.min_contrast,
                })
            }
            QualityCheck::MinBrightness => {
                let brightness = metrics.brightness();
                (brightness < t.min_brightness).then_some(QualityRejection::TooDark {
                    brightness,
                    min: t.min_brightness,
                })
            }
            QualityCheck::MaxBrightness => {
                let brightness = metrics.brightness();
                (brightness > t.max_brightness).then_some(QualityRejection::TooBright {
                    brightness,
                    max: t.max_brightness,
                })
            }
        }
    }
}

impl Default for QualityEvaluator {
    fn default() -> Self {
        Self::new(QualityThresholds::default())
    }
}
