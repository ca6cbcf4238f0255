//! Integration tests for doc-intake.
//!
//! Every test runs the full `process_submission` flow against an in-memory
//! or temp-dir backend with synthetic images, so no fixtures or network are
//! needed.
//!
//! Run with:
//!   cargo test --test intake -- --nocapture

use async_trait::async_trait;
use doc_intake::storage::local::LocalStorage;
use doc_intake::storage::memory::MemoryStorage;
use doc_intake::{
    process_submission, FieldInfo, FieldStatus, FileError, FileId, FolderId, IntakeConfig,
    IntakeProgressCallback, QualityRejection, QualityThresholds, StorageBackend, StorageError,
    Submission, SubmittedFile,
};
use image::{DynamicImage, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const CLIENT_FOLDER: &str = "ana-paula-11988887777";

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Deterministic grey noise: sharp, high contrast, mid brightness, and large
/// enough as PNG to clear the default minimum file size.
fn noise_png(w: u32, h: u32, seed: u32) -> Vec<u8> {
    let mut state = seed;
    let img = DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |_, _| {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let v = (state >> 24) as u8;
        Rgb([v, v, v])
    }));
    encode_png(&img)
}

fn flat_png(w: u32, h: u32, value: u8) -> Vec<u8> {
    encode_png(&DynamicImage::ImageRgb8(RgbImage::from_pixel(
        w,
        h,
        Rgb([value, value, value]),
    )))
}

fn encode_png(img: &DynamicImage) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn photo(name: &str, seed: u32) -> SubmittedFile {
    SubmittedFile::new(name, Some("image/png"), noise_png(800, 600, seed))
}

fn rg() -> FieldInfo {
    FieldInfo::new("doc_rg", "Documento RG")
}

fn proof_of_address() -> FieldInfo {
    FieldInfo::new("proof_address", "Comprovante")
}

fn base_submission() -> Submission {
    Submission::new("Ana Paula", "(11) 98888-7777", "Visa")
}

/// Forwards to [`MemoryStorage`] but fails uploads whose name starts with
/// the given prefix.
struct FailingUploads {
    inner: MemoryStorage,
    prefix: &'static str,
}

#[async_trait]
impl StorageBackend for FailingUploads {
    fn root_folder(&self) -> FolderId {
        self.inner.root_folder()
    }

    async fn find_folder(
        &self,
        parent: &FolderId,
        name: &str,
    ) -> Result<Option<FolderId>, StorageError> {
        self.inner.find_folder(parent, name).await
    }

    async fn create_folder(&self, parent: &FolderId, name: &str) -> Result<FolderId, StorageError> {
        self.inner.create_folder(parent, name).await
    }

    async fn find_file(&self, parent: &FolderId, name: &str) -> Result<Option<FileId>, StorageError> {
        self.inner.find_file(parent, name).await
    }

    async fn upload_file(
        &self,
        parent: &FolderId,
        name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<FileId, StorageError> {
        if name.starts_with(self.prefix) {
            return Err(StorageError::Backend("quota exceeded".into()));
        }
        self.inner.upload_file(parent, name, mime_type, bytes).await
    }
}

#[derive(Default)]
struct Counting {
    started: AtomicUsize,
    accepted: AtomicUsize,
    rejected: AtomicUsize,
    uploads: AtomicUsize,
    completed: AtomicUsize,
}

impl IntakeProgressCallback for Counting {
    fn on_submission_start(&self, total_files: usize) {
        self.started.store(total_files, Ordering::SeqCst);
    }
    fn on_file_accepted(&self, _filename: &str, _stored_name: &str) {
        self.accepted.fetch_add(1, Ordering::SeqCst);
    }
    fn on_file_rejected(&self, _filename: &str, _reason: &str) {
        self.rejected.fetch_add(1, Ordering::SeqCst);
    }
    fn on_upload_complete(&self, _stored_name: &str, _skipped: bool) {
        self.uploads.fetch_add(1, Ordering::SeqCst);
    }
    fn on_submission_complete(&self, _uploaded: usize, _rejected: usize) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Quality gate ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn low_resolution_photo_is_rejected_with_minimum_in_reason() {
    let storage = MemoryStorage::new();
    let submission = base_submission()
        .with_field_file(
            SubmittedFile::new("small.png", Some("image/png"), noise_png(500, 300, 7)),
            rg(),
        )
        .with_file(SubmittedFile::new("contrato.pdf", None, b"%PDF-1.4".to_vec()));

    let outcome = process_submission(&submission, &storage, &IntakeConfig::default())
        .await
        .unwrap();

    assert_eq!(outcome.rejected.len(), 1);
    let r = &outcome.rejected[0];
    assert_eq!(r.filename, "small.png");
    assert_eq!(r.field_id, "doc_rg");
    assert!(r.reason.contains("500x300"), "reason: {}", r.reason);
    assert!(r.reason.contains("600x400"), "reason: {}", r.reason);
    assert!(matches!(
        r.error,
        FileError::Quality(QualityRejection::Resolution { .. })
    ));
    assert!(outcome
        .report
        .contains("Rejected files:\n- small.png (Insufficient resolution"));
}

#[tokio::test]
async fn sharp_photo_becomes_single_page_pdf() {
    let storage = MemoryStorage::new();
    let submission = base_submission().with_field_file(photo("rg.png", 1), rg());

    let outcome = process_submission(&submission, &storage, &IntakeConfig::default())
        .await
        .unwrap();

    assert!(outcome.rejected.is_empty(), "{:?}", outcome.rejected);
    assert_eq!(outcome.processed.len(), 1);
    let p = &outcome.processed[0];
    assert_eq!(p.stored_name, "Documento_RG.pdf");
    assert_eq!(p.mime, "application/pdf");
    assert_eq!(p.original_name, "rg.png");

    let service = storage.folder_at(&format!("{CLIENT_FOLDER}/Visa")).unwrap();
    let (mime, bytes) = storage.file(&service, "Documento_RG.pdf").unwrap();
    assert_eq!(mime, "application/pdf");
    assert!(bytes.starts_with(b"%PDF"));
    let doc = lopdf::Document::load_mem(&bytes).unwrap();
    assert_eq!(doc.get_pages().len(), 1);
}

#[tokio::test]
async fn flat_dark_photo_fails_sharpness_before_brightness() {
    let storage = MemoryStorage::new();
    let config = IntakeConfig::builder()
        .thresholds(QualityThresholds {
            min_filesize_kb: 0,
            ..QualityThresholds::default()
        })
        .build()
        .unwrap();
    let submission = base_submission()
        .with_file(SubmittedFile::new("dark.png", None, flat_png(800, 600, 10)));

    let outcome = process_submission(&submission, &storage, &config)
        .await
        .unwrap();

    assert!(matches!(
        outcome.rejected[0].error,
        FileError::Quality(QualityRejection::Blurry { .. })
    ));
    assert_eq!(storage.folder_count(), 0);
}

// ── Routing and naming ───────────────────────────────────────────────────────

#[tokio::test]
async fn multi_file_field_gets_its_own_folder_with_numbered_names() {
    let storage = MemoryStorage::new();
    let submission = base_submission()
        .with_field_file(photo("rg-front.png", 1), rg())
        .with_field_file(photo("rg-back.png", 2), rg())
        .with_field_file(
            SubmittedFile::new("conta-luz.pdf", Some("application/pdf"), b"%PDF-1.7".to_vec()),
            proof_of_address(),
        );

    let outcome = process_submission(&submission, &storage, &IntakeConfig::default())
        .await
        .unwrap();

    assert_eq!(outcome.processed.len(), 3);
    assert_eq!(
        storage.tree(),
        vec![
            format!("{CLIENT_FOLDER}/Visa/Comprovante.pdf"),
            format!("{CLIENT_FOLDER}/Visa/Documento_RG/Documento_RG(2).pdf"),
            format!("{CLIENT_FOLDER}/Visa/Documento_RG/Documento_RG.pdf"),
            format!("{CLIENT_FOLDER}/Visa/report.txt"),
        ]
    );
    // Processed keeps submission order.
    let originals: Vec<&str> = outcome
        .processed
        .iter()
        .map(|p| p.original_name.as_str())
        .collect();
    assert_eq!(originals, ["rg-front.png", "rg-back.png", "conta-luz.pdf"]);
}

#[tokio::test]
async fn resubmission_creates_nothing_new() {
    let storage = MemoryStorage::new();
    let submission = base_submission()
        .with_field_file(photo("rg-front.png", 1), rg())
        .with_field_file(photo("rg-back.png", 2), rg())
        .with_file(SubmittedFile::new("notes.txt", None, b"hello".to_vec()))
        .with_field_status(
            "doc_rg",
            FieldStatus {
                label: Some("Documento RG".into()),
                uploaded_count: 2,
                value: None,
            },
        );
    let config = IntakeConfig::default();

    let first = process_submission(&submission, &storage, &config)
        .await
        .unwrap();
    let files_after_first = storage.file_count();
    let folders_after_first = storage.folder_count();

    let second = process_submission(&submission, &storage, &config)
        .await
        .unwrap();

    assert_eq!(storage.file_count(), files_after_first);
    assert_eq!(storage.folder_count(), folders_after_first);
    assert_eq!(first.stats.uploaded_files, 3);
    assert!(first.stats.report_uploaded);
    assert_eq!(second.stats.uploaded_files, 0);
    assert_eq!(second.stats.skipped_files, 3);
    assert!(!second.stats.report_uploaded);
    assert_eq!(first.report, second.report);
    let names = |o: &doc_intake::SubmissionOutcome| -> Vec<String> {
        o.processed.iter().map(|p| p.stored_name.clone()).collect()
    };
    assert_eq!(names(&first), names(&second));
    assert_eq!(
        second.message,
        "All files were already stored; nothing new to upload."
    );
}

#[tokio::test]
async fn failed_upload_moves_only_that_file_to_rejected() {
    let storage = FailingUploads {
        inner: MemoryStorage::new(),
        prefix: "Comprovante",
    };
    let submission = base_submission()
        .with_field_file(photo("rg.png", 1), rg())
        .with_field_file(
            SubmittedFile::new("conta.pdf", None, b"%PDF-1.7".to_vec()),
            proof_of_address(),
        );

    let outcome = process_submission(&submission, &storage, &IntakeConfig::default())
        .await
        .unwrap();

    assert_eq!(outcome.processed.len(), 1);
    assert_eq!(outcome.processed[0].stored_name, "Documento_RG.pdf");
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.rejected[0].filename, "conta.pdf");
    assert!(matches!(outcome.rejected[0].error, FileError::Upload(_)));
    assert!(outcome.rejected[0].reason.contains("quota exceeded"));
    assert_eq!(outcome.message, "Files uploaded successfully.");
    assert!(outcome.report.contains("- conta.pdf (upload failed"));
    assert_eq!(
        storage.inner.tree(),
        vec![
            format!("{CLIENT_FOLDER}/Visa/Documento_RG.pdf"),
            format!("{CLIENT_FOLDER}/Visa/report.txt"),
        ]
    );
}

#[tokio::test]
async fn every_file_has_exactly_one_outcome() {
    let storage = MemoryStorage::new();
    let submission = base_submission()
        .with_field_file(photo("a.png", 1), rg())
        .with_field_file(photo("b.png", 2), rg())
        .with_file(SubmittedFile::new("tiny.png", None, noise_png(100, 100, 3)))
        .with_file(SubmittedFile::new("empty.pdf", None, Vec::new()))
        .with_file(SubmittedFile::new("broken.jpg", None, b"not a jpeg".to_vec()))
        .with_file(SubmittedFile::new("doc.docx", None, b"PK\x03\x04".to_vec()));

    let outcome = process_submission(&submission, &storage, &IntakeConfig::default())
        .await
        .unwrap();

    assert_eq!(
        outcome.processed.len() + outcome.rejected.len(),
        submission.files.len()
    );
    assert_eq!(outcome.processed.len(), 3);
    let rejected: Vec<&str> = outcome.rejected.iter().map(|r| r.filename.as_str()).collect();
    assert_eq!(rejected, ["tiny.png", "empty.pdf", "broken.jpg"]);
    assert_eq!(outcome.stats.total_files, 6);
    assert_eq!(outcome.stats.approved_files, 3);
    assert_eq!(outcome.stats.rejected_files, 3);
    assert_eq!(outcome.message, "Files uploaded successfully.");
}

// ── Backends and callbacks ───────────────────────────────────────────────────

#[tokio::test]
async fn local_backend_writes_the_folder_tree() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::open(dir.path()).await.unwrap();
    let submission = base_submission()
        .with_field_file(photo("rg.png", 1), rg())
        .with_file(SubmittedFile::new("notes.txt", None, b"hello".to_vec()));

    let outcome = process_submission(&submission, &storage, &IntakeConfig::default())
        .await
        .unwrap();
    assert!(outcome.is_success());

    let service = dir.path().join(CLIENT_FOLDER).join("Visa");
    let pdf = std::fs::read(service.join("Documento_RG.pdf")).unwrap();
    assert!(pdf.starts_with(b"%PDF"));
    assert_eq!(std::fs::read(service.join("notes.txt")).unwrap(), b"hello");
    let report = std::fs::read_to_string(service.join("report.txt")).unwrap();
    assert_eq!(report, outcome.report);
    assert!(report.contains("- rg.png -> Documento_RG.pdf"));
}

#[tokio::test]
async fn client_folders_go_under_configured_root() {
    let storage = MemoryStorage::new();
    let parent = storage
        .create_folder(&storage.root_folder(), "Clients")
        .await
        .unwrap();
    let config = IntakeConfig::builder().root_folder(parent).build().unwrap();
    let submission =
        base_submission().with_file(SubmittedFile::new("notes.txt", None, b"hi".to_vec()));

    process_submission(&submission, &storage, &config)
        .await
        .unwrap();

    assert_eq!(
        storage.tree(),
        vec![
            format!("Clients/{CLIENT_FOLDER}/Visa/notes.txt"),
            format!("Clients/{CLIENT_FOLDER}/Visa/report.txt"),
        ]
    );
}

#[tokio::test]
async fn progress_callback_sees_every_file() {
    let storage = MemoryStorage::new();
    let counting = Arc::new(Counting::default());
    let config = IntakeConfig::builder()
        .progress_callback(counting.clone())
        .build()
        .unwrap();
    let submission = base_submission()
        .with_field_file(photo("a.png", 1), rg())
        .with_field_file(photo("b.png", 2), rg())
        .with_file(SubmittedFile::new("empty.pdf", None, Vec::new()));

    process_submission(&submission, &storage, &config)
        .await
        .unwrap();

    assert_eq!(counting.started.load(Ordering::SeqCst), 3);
    assert_eq!(counting.accepted.load(Ordering::SeqCst), 2);
    assert_eq!(counting.rejected.load(Ordering::SeqCst), 1);
    assert_eq!(counting.uploads.load(Ordering::SeqCst), 2);
    assert_eq!(counting.completed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn upload_failure_follows_acceptance_for_the_same_file() {
    let storage = FailingUploads {
        inner: MemoryStorage::new(),
        prefix: "Comprovante",
    };
    let counting = Arc::new(Counting::default());
    let config = IntakeConfig::builder()
        .progress_callback(counting.clone())
        .build()
        .unwrap();
    let submission = base_submission()
        .with_field_file(photo("rg.png", 1), rg())
        .with_field_file(
            SubmittedFile::new("conta.pdf", None, b"%PDF-1.7".to_vec()),
            proof_of_address(),
        );

    let outcome = process_submission(&submission, &storage, &config)
        .await
        .unwrap();

    // Both passed classification; one of them then failed to upload.
    assert_eq!(counting.accepted.load(Ordering::SeqCst), 2);
    assert_eq!(counting.rejected.load(Ordering::SeqCst), 1);
    assert_eq!(counting.uploads.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.processed.len() + outcome.rejected.len(), 2);
}

