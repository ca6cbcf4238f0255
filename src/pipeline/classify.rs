//! File classification: image or passthrough, accepted or rejected.
//!
//! Each submitted file ends up as exactly one of:
//!
//! * a [`ProcessedFile`] staged on local disk, either the original bytes
//!   (passthrough) or a single-page PDF built from an approved image, or
//! * a [`RejectedFile`] carrying the reason.
//!
//! Decoding, scoring and PDF encoding are CPU-bound, so
//! [`FileClassifier::classify_async`] moves the work onto tokio's blocking
//! pool. A panic inside that work rejects the one file instead of unwinding
//! through the submission.

use crate::config::IntakeConfig;
use crate::error::FileError;
use crate::output::{ProcessedFile, RejectedFile};
use crate::pipeline::encode;
use crate::pipeline::evaluate::{QualityEvaluator, Verdict};
use crate::pipeline::naming;
use crate::submission::{FieldInfo, SubmittedFile};
use image::GenericImageView;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Extensions treated as images when no content type was declared.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

pub const PDF_MIME: &str = "application/pdf";
pub const FALLBACK_MIME: &str = "application/octet-stream";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Whether a file goes through the quality gate.
///
/// A declared content type decides on its own (`image/*` or not); only when
/// it is missing does the filename extension count.
pub fn is_image(content_type: Option<&str>, filename: &str) -> bool {
    match content_type.map(str::trim).filter(|ct| !ct.is_empty()) {
        Some(ct) => ct.to_ascii_lowercase().starts_with("image/"),
        None => {
            let (_, ext) = naming::split_extension(filename);
            let ext = ext.trim_start_matches('.').to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        }
    }
}

/// Turns submitted files into processed or rejected ones.
///
/// Cheap to clone; holds only settings and the staging directory path.
#[derive(Debug, Clone)]
pub struct FileClassifier {
    evaluator: QualityEvaluator,
    max_upload_bytes: u64,
    max_filesize_mb: u64,
    max_filename_len: usize,
    pdf_dpi: u32,
    jpeg_quality: u8,
    staging_dir: PathBuf,
}

impl FileClassifier {
    pub fn new(config: &IntakeConfig, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            evaluator: QualityEvaluator::new(config.thresholds.clone()),
            max_upload_bytes: config.max_upload_bytes(),
            max_filesize_mb: config.max_filesize_mb,
            max_filename_len: config.max_filename_len,
            pdf_dpi: config.pdf_dpi,
            jpeg_quality: config.jpeg_quality,
            staging_dir: staging_dir.into(),
        }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Classify one file on the blocking pool.
    ///
    /// `index` is the file's position in the submission; it prefixes the
    /// staged filename so two files with the same stored name never clash on
    /// local disk.
    pub async fn classify_async(
        &self,
        file: SubmittedFile,
        field: FieldInfo,
        index: usize,
    ) -> Result<ProcessedFile, RejectedFile> {
        let classifier = self.clone();
        let filename = file.filename.clone();
        let (field_id, field_label) = (field.field_id.clone(), field.field_label.clone());

        tokio::task::spawn_blocking(move || classifier.classify(&file, &field, index))
            .await
            .unwrap_or_else(|e| {
                Err(RejectedFile::new(
                    filename,
                    field_id,
                    field_label,
                    FileError::Unexpected(format!("classification task failed: {e}")),
                ))
            })
    }

    /// Classify one file on the current thread.
    pub fn classify(
        &self,
        file: &SubmittedFile,
        field: &FieldInfo,
        index: usize,
    ) -> Result<ProcessedFile, RejectedFile> {
        let reject =
            |error: FileError| RejectedFile::new(&file.filename, &field.field_id, &field.field_label, error);

        let size = file.bytes.len() as u64;
        if size == 0 {
            info!("Rejected {}: empty file", file.filename);
            return Err(reject(FileError::Empty));
        }
        if size > self.max_upload_bytes {
            let error = FileError::TooLarge {
                size_mb: size as f64 / BYTES_PER_MB,
                max_mb: self.max_filesize_mb,
            };
            info!("Rejected {}: {}", file.filename, error);
            return Err(reject(error));
        }

        let (stored_name, mime, bytes) = if is_image(file.content_type.as_deref(), &file.filename) {
            let pdf = self.image_to_pdf(file).map_err(|e| {
                info!("Rejected {}: {}", file.filename, e);
                reject(e)
            })?;
            let name = naming::pdf_name(&field.field_label, &file.filename, self.max_filename_len);
            (name, PDF_MIME.to_string(), pdf)
        } else {
            let name = naming::passthrough_name(&field.field_label, &file.filename, self.max_filename_len);
            let mime = file
                .content_type
                .clone()
                .filter(|ct| !ct.trim().is_empty())
                .unwrap_or_else(|| FALLBACK_MIME.to_string());
            (name, mime, file.bytes.clone())
        };

        let path = self.staging_dir.join(format!("{index}-{stored_name}"));
        std::fs::write(&path, &bytes).map_err(|e| {
            reject(FileError::Staging(format!("{}: {e}", path.display())))
        })?;

        info!("Prepared {} for upload as {}", file.filename, stored_name);
        Ok(ProcessedFile {
            path,
            stored_name,
            mime,
            original_name: file.filename.clone(),
            field_id: field.field_id.clone(),
            field_label: field.field_label.clone(),
        })
    }

    /// Decode, gate, and convert an image to PDF bytes.
    fn image_to_pdf(&self, file: &SubmittedFile) -> Result<Vec<u8>, FileError> {
        let image = encode::decode_image(&file.bytes).map_err(|e| FileError::Decode(e.to_string()))?;
        let (width, height) = image.dimensions();
        let file_size_kb = file.bytes.len() as f64 / 1024.0;
        debug!(
            "{}: {}x{} px, {:.1} KB",
            file.filename, width, height, file_size_kb
        );

        match self.evaluator.evaluate(&image, file_size_kb, width, height) {
            Verdict::Accepted => {}
            Verdict::Rejected(rejection) => return Err(FileError::Quality(rejection)),
        }

        encode::encode_pdf(&image, self.pdf_dpi, self.jpeg_quality)
            .map_err(|e| FileError::Conversion(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QualityThresholds;
    use crate::pipeline::evaluate::QualityRejection;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(img: &DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    /// Deterministic noise: sharp, mid-grey on average, high contrast.
    fn noise(w: u32, h: u32) -> DynamicImage {
        let mut state: u32 = 0x1234_5678;
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |_, _| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let v = (state >> 24) as u8;
            Rgb([v, v, v])
        }))
    }

    /// Thresholds that let small synthetic images through size checks.
    fn lenient() -> IntakeConfig {
        IntakeConfig::builder()
            .thresholds(QualityThresholds {
                min_width: 16,
                min_height: 16,
                min_filesize_kb: 0,
                ..QualityThresholds::default()
            })
            .build()
            .unwrap()
    }

    fn field(id: &str, label: &str) -> FieldInfo {
        FieldInfo::new(id, label)
    }

    #[test]
    fn image_detection_prefers_declared_type() {
        assert!(is_image(Some("image/jpeg"), "scan.pdf"));
        assert!(is_image(Some("IMAGE/PNG"), "x"));
        assert!(!is_image(Some("application/octet-stream"), "photo.jpg"));
        assert!(is_image(None, "photo.JPG"));
        assert!(is_image(Some(""), "photo.webp"));
        assert!(!is_image(None, "photo.tiff"));
        assert!(!is_image(None, "jpg"));
    }

    #[test]
    fn approved_image_becomes_a_pdf_named_after_the_field() {
        let dir = tempfile::tempdir().unwrap();
        let classifier = FileClassifier::new(&lenient(), dir.path());
        let file = SubmittedFile::new("IMG_001.png", Some("image/png"), png_bytes(&noise(64, 48)));

        let p = classifier.classify(&file, &field("doc_rg", "Documento RG"), 0).unwrap();

        assert_eq!(p.stored_name, "Documento_RG.pdf");
        assert_eq!(p.mime, "application/pdf");
        assert_eq!(p.original_name, "IMG_001.png");
        assert_eq!(p.path, dir.path().join("0-Documento_RG.pdf"));
        assert!(std::fs::read(&p.path).unwrap().starts_with(b"%PDF-"));
    }

    #[test]
    fn passthrough_keeps_bytes_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        let classifier = FileClassifier::new(&lenient(), dir.path());
        let file = SubmittedFile::new("contrato.docx", None, b"PK\x03\x04".to_vec());

        let p = classifier.classify(&file, &field("contract", "Contrato assinado"), 3).unwrap();

        assert_eq!(p.stored_name, "Contrato_assinado.docx");
        assert_eq!(p.mime, FALLBACK_MIME);
        assert_eq!(std::fs::read(&p.path).unwrap(), b"PK\x03\x04");
    }

    #[test]
    fn unknown_field_falls_back_to_original_stem() {
        let dir = tempfile::tempdir().unwrap();
        let classifier = FileClassifier::new(&lenient(), dir.path());
        let file = SubmittedFile::new("Extrato Banco.pdf", Some("application/pdf"), vec![b'%'; 10]);

        let p = classifier.classify(&file, &FieldInfo::default(), 0).unwrap();
        assert_eq!(p.stored_name, "Extrato_Banco.pdf");
        assert_eq!(p.mime, "application/pdf");
        assert_eq!(p.field_id, "unknown");
    }

    #[test]
    fn empty_and_oversized_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = IntakeConfig::builder().max_filesize_mb(1).build().unwrap();
        let classifier = FileClassifier::new(&config, dir.path());

        let empty = SubmittedFile::new("a.pdf", None, vec![]);
        let r = classifier.classify(&empty, &field("f", "F"), 0).unwrap_err();
        assert_eq!(r.error, FileError::Empty);

        let big = SubmittedFile::new("b.pdf", None, vec![0; 1024 * 1024 + 1]);
        let r = classifier.classify(&big, &field("f", "F"), 1).unwrap_err();
        assert!(matches!(r.error, FileError::TooLarge { max_mb: 1, .. }));
        assert!(r.reason.contains("maximum allowed: 1 MB"), "{}", r.reason);
    }

    #[test]
    fn corrupt_image_is_a_decode_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let classifier = FileClassifier::new(&lenient(), dir.path());
        let file = SubmittedFile::new("broken.jpg", Some("image/jpeg"), b"not really a jpeg".to_vec());

        let r = classifier.classify(&file, &field("f", "F"), 0).unwrap_err();
        assert!(matches!(r.error, FileError::Decode(_)));
        assert_eq!(r.filename, "broken.jpg");
    }

    #[test]
    fn low_resolution_image_is_a_quality_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let classifier = FileClassifier::new(&IntakeConfig::default(), dir.path());
        let file = SubmittedFile::new("small.png", None, png_bytes(&noise(500, 300)));

        let r = classifier.classify(&file, &field("doc_rg", "RG"), 0).unwrap_err();
        assert!(matches!(
            r.error,
            FileError::Quality(QualityRejection::Resolution { width: 500, height: 300, .. })
        ));
        assert!(r.reason.contains("600x400"), "{}", r.reason);
        assert_eq!(r.field_id, "doc_rg");
    }

    #[tokio::test]
    async fn async_classification_matches_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let classifier = FileClassifier::new(&lenient(), dir.path());
        let file = SubmittedFile::new("n.png", None, png_bytes(&noise(32, 32)));

        let p = classifier
            .classify_async(file, field("f", "Foto"), 7)
            .await
            .unwrap();
        assert_eq!(p.stored_name, "Foto.pdf");
        assert_eq!(p.path, dir.path().join("7-Foto.pdf"));
    }
}
