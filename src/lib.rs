//! # doc-intake
//!
//! Quality-gated intake of customer documents into hierarchical storage.
//!
//! A client fills in a form and attaches photos and files for each field
//! ("ID document", "proof of address", …). This crate decides which photos
//! are usable, turns the good ones into single-page PDFs, and files
//! everything under `client → service → [field] → files` in a storage
//! backend, together with a plain-text report.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Submission
//!  │
//!  ├─ 1. Validate  name, phone digits, at least one file
//!  ├─ 2. Classify  image or passthrough (spawn_blocking per file)
//!  │     └─ images: resolution → size → sharpness → contrast → brightness
//!  ├─ 3. Route     group by field, find-before-create folders
//!  ├─ 4. Upload    concurrent, skip-on-existing
//!  └─ 5. Report    report.txt in the service folder, skip-on-existing
//! ```
//!
//! Every submitted file ends up in exactly one of
//! [`SubmissionOutcome::processed`] or [`SubmissionOutcome::rejected`]. A bad
//! file never aborts the others, and resubmitting the same form creates no
//! new files.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doc_intake::storage::local::LocalStorage;
//! use doc_intake::{process_submission, FieldInfo, IntakeConfig, Submission, SubmittedFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let storage = LocalStorage::open("./intake").await?;
//!     let submission = Submission::new("Maria José", "(11) 98888-7777", "Aposentadoria")
//!         .with_field_file(
//!             SubmittedFile::new("rg.jpg", Some("image/jpeg"), std::fs::read("rg.jpg")?),
//!             FieldInfo::new("doc_rg", "Documento RG"),
//!         );
//!
//!     let outcome = process_submission(&submission, &storage, &IntakeConfig::default())
//!         .await?
//!         .into_result()?;
//!     for r in &outcome.rejected {
//!         eprintln!("{}: {}", r.filename, r.reason);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc-intake` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! doc-intake = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod intake;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod storage;
pub mod submission;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{IntakeConfig, IntakeConfigBuilder, QualityThresholds};
pub use error::{FileError, IntakeError, StorageError};
pub use intake::{process_submission, process_submission_sync};
pub use output::{IntakeStats, ProcessedFile, RejectedFile, SubmissionOutcome};
pub use pipeline::evaluate::{QualityEvaluator, QualityRejection, Verdict};
pub use pipeline::metrics::QualityScore;
pub use progress::{IntakeProgressCallback, NoopProgressCallback, ProgressCallback};
pub use storage::{FileId, FolderId, StorageBackend};
pub use submission::{
    parse_field_map, parse_field_status, FieldInfo, FieldStatus, Submission, SubmittedFile,
};
