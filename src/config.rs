//! Configuration types for document intake.
//!
//! All intake behaviour is controlled through [`IntakeConfig`], built via its
//! [`IntakeConfigBuilder`]. Every quality threshold lives in
//! [`QualityThresholds`] so the gate can be tuned or replaced as one value.
//!
//! The library never reads environment variables itself; the `doc-intake`
//! binary maps `MIN_IMAGE_WIDTH`, `MIN_SHARPNESS`, … onto the builder.

use crate::error::IntakeError;
use crate::progress::ProgressCallback;
use crate::storage::FolderId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Thresholds applied by [`crate::pipeline::evaluate::QualityEvaluator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Minimum image width in pixels. Default: 600.
    pub min_width: u32,

    /// Minimum image height in pixels. Default: 400.
    pub min_height: u32,

    /// Minimum upload size in KiB. Default: 80.
    ///
    /// Phone cameras produce several hundred KiB for a legible document;
    /// anything smaller is almost always a thumbnail or a screenshot crop.
    pub min_filesize_kb: u64,

    /// Minimum variance of the Laplacian. Default: 100.
    pub min_sharpness: f64,

    /// Minimum luma standard deviation / 255. Default: 0.15.
    pub min_contrast: f64,

    /// Minimum mean luma / 255. Default: 0.10.
    pub min_brightness: f64,

    /// Maximum mean luma / 255. Default: 0.95.
    pub max_brightness: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_width: 600,
            min_height: 400,
            min_filesize_kb: 80,
            min_sharpness: 100.0,
            min_contrast: 0.15,
            min_brightness: 0.10,
            max_brightness: 0.95,
        }
    }
}

/// Configuration for processing one submission.
///
/// Built via [`IntakeConfig::builder()`] or using [`IntakeConfig::default()`].
///
/// # Example
/// ```rust
/// use doc_intake::IntakeConfig;
///
/// let config = IntakeConfig::builder()
///     .min_resolution(800, 600)
///     .min_sharpness(150.0)
///     .upload_concurrency(8)
///     .build()
///     .unwrap();
/// assert_eq!(config.thresholds.min_width, 800);
/// ```
#[derive(Clone)]
pub struct IntakeConfig {
    /// Quality gate thresholds.
    pub thresholds: QualityThresholds,

    /// Largest accepted upload in MiB. Default: 50.
    pub max_filesize_mb: u64,

    /// Longest client folder name (after slugifying). Default: 100.
    pub max_folder_name_len: usize,

    /// Longest stored filename, extension included. Default: 200.
    pub max_filename_len: usize,

    /// Resolution written into generated PDFs. Range: 72–600. Default: 300.
    ///
    /// The page size is `pixels / dpi` inches, so a 2400 px wide photo
    /// becomes an 8-inch wide page at 300 DPI.
    pub pdf_dpi: u32,

    /// JPEG quality used for the image stream inside generated PDFs. Default: 75.
    pub jpeg_quality: u8,

    /// Concurrent uploads once target folders are resolved. Default: 4.
    pub upload_concurrency: usize,

    /// Minimum client name length (trimmed). Default: 3.
    pub min_name_len: usize,

    /// Minimum number of digits in the phone number. Default: 10.
    pub min_phone_digits: usize,

    /// Folder under which client folders are created.
    /// If None, uses the storage backend's root.
    pub root_folder: Option<FolderId>,

    /// Name of the plain-text report placed in the service folder.
    pub report_name: String,

    /// Optional per-file progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            thresholds: QualityThresholds::default(),
            max_filesize_mb: 50,
            max_folder_name_len: 100,
            max_filename_len: 200,
            pdf_dpi: 300,
            jpeg_quality: 75,
            upload_concurrency: 4,
            min_name_len: 3,
            min_phone_digits: 10,
            root_folder: None,
            report_name: "report.txt".to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for IntakeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntakeConfig")
            .field("thresholds", &self.thresholds)
            .field("max_filesize_mb", &self.max_filesize_mb)
            .field("max_folder_name_len", &self.max_folder_name_len)
            .field("max_filename_len", &self.max_filename_len)
            .field("pdf_dpi", &self.pdf_dpi)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("upload_concurrency", &self.upload_concurrency)
            .field("root_folder", &self.root_folder)
            .field("report_name", &self.report_name)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn IntakeProgressCallback>"),
            )
            .finish()
    }
}

impl IntakeConfig {
    /// Create a new builder for `IntakeConfig`.
    pub fn builder() -> IntakeConfigBuilder {
        IntakeConfigBuilder {
            config: Self::default(),
        }
    }

    /// Largest accepted upload in bytes.
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_filesize_mb.saturating_mul(1024 * 1024)
    }
}

/// Builder for [`IntakeConfig`].
#[derive(Debug)]
pub struct IntakeConfigBuilder {
    config: IntakeConfig,
}

impl IntakeConfigBuilder {
    pub fn thresholds(mut self, thresholds: QualityThresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    pub fn min_resolution(mut self, width: u32, height: u32) -> Self {
        self.config.thresholds.min_width = width;
        self.config.thresholds.min_height = height;
        self
    }

    pub fn min_filesize_kb(mut self, kb: u64) -> Self {
        self.config.thresholds.min_filesize_kb = kb;
        self
    }

    pub fn min_sharpness(mut self, score: f64) -> Self {
        self.config.thresholds.min_sharpness = score;
        self
    }

    pub fn min_contrast(mut self, score: f64) -> Self {
        self.config.thresholds.min_contrast = score;
        self
    }

    pub fn brightness_range(mut self, min: f64, max: f64) -> Self {
        self.config.thresholds.min_brightness = min;
        self.config.thresholds.max_brightness = max;
        self
    }

    pub fn max_filesize_mb(mut self, mb: u64) -> Self {
        self.config.max_filesize_mb = mb;
        self
    }

    pub fn max_folder_name_len(mut self, n: usize) -> Self {
        self.config.max_folder_name_len = n;
        self
    }

    pub fn max_filename_len(mut self, n: usize) -> Self {
        self.config.max_filename_len = n;
        self
    }

    pub fn pdf_dpi(mut self, dpi: u32) -> Self {
        self.config.pdf_dpi = dpi.clamp(72, 600);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn upload_concurrency(mut self, n: usize) -> Self {
        self.config.upload_concurrency = n.max(1);
        self
    }

    pub fn min_name_len(mut self, n: usize) -> Self {
        self.config.min_name_len = n;
        self
    }

    pub fn min_phone_digits(mut self, n: usize) -> Self {
        self.config.min_phone_digits = n;
        self
    }

    pub fn root_folder(mut self, folder: impl Into<FolderId>) -> Self {
        self.config.root_folder = Some(folder.into());
        self
    }

    pub fn report_name(mut self, name: impl Into<String>) -> Self {
        self.config.report_name = name.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<IntakeConfig, IntakeError> {
        let c = &self.config;
        let t = &c.thresholds;

        if t.min_width == 0 || t.min_height == 0 {
            return Err(IntakeError::InvalidConfig(format!(
                "Minimum resolution must be positive, got {}x{}",
                t.min_width, t.min_height
            )));
        }
        if t.min_sharpness.is_nan() || t.min_sharpness < 0.0 {
            return Err(IntakeError::InvalidConfig(format!(
                "Minimum sharpness must be ≥ 0, got {}",
                t.min_sharpness
            )));
        }
        for (name, v) in [
            ("contrast", t.min_contrast),
            ("minimum brightness", t.min_brightness),
            ("maximum brightness", t.max_brightness),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(IntakeError::InvalidConfig(format!(
                    "{name} threshold must be within 0–1, got {v}"
                )));
            }
        }
        if t.min_brightness >= t.max_brightness {
            return Err(IntakeError::InvalidConfig(format!(
                "Minimum brightness ({}) must be below maximum brightness ({})",
                t.min_brightness, t.max_brightness
            )));
        }
        if c.max_filesize_mb == 0 {
            return Err(IntakeError::InvalidConfig(
                "Maximum file size must be ≥ 1 MB".into(),
            ));
        }
        if c.max_folder_name_len == 0 || c.max_filename_len < 16 {
            return Err(IntakeError::InvalidConfig(format!(
                "Name limits too small (folder {}, file {}; file limit must be ≥ 16)",
                c.max_folder_name_len, c.max_filename_len
            )));
        }
        if c.report_name.trim().is_empty() {
            return Err(IntakeError::InvalidConfig(
                "Report name must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
