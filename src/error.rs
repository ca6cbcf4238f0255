//! Error types for the doc-intake library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`IntakeError`] (**fatal**): the submission cannot be processed at all
//!   (form fields invalid, configuration rejected, the client or service
//!   folder cannot be resolved). Returned as `Err(IntakeError)` from the
//!   top-level `process_submission*` functions.
//!
//! * [`FileError`] (**non-fatal**): a single submitted file failed (corrupt
//!   image, quality gate, upload error) but every other file carries on.
//!   It is folded into a [`crate::output::RejectedFile`] so the caller sees
//!   exactly one outcome per submitted file.
//!
//! Storage collaborators report [`StorageError`]; the router turns it into
//! [`FileError::Upload`] for single files and [`IntakeError::Storage`] only
//! when the folder tree itself cannot be built.

use crate::pipeline::evaluate::QualityRejection;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the doc-intake library.
///
/// File-level failures use [`FileError`] and end up in
/// [`crate::output::RejectedFile`] rather than propagated here.
#[derive(Debug, Error)]
pub enum IntakeError {
    // ── Form errors ───────────────────────────────────────────────────────
    /// Client name is blank or shorter than the configured minimum.
    #[error("Client name must have at least {min} characters")]
    NameTooShort { min: usize },

    /// Phone number has fewer digits than the configured minimum.
    #[error("Invalid phone number: it must contain at least {min} digits")]
    PhoneTooShort { min: usize },

    /// The submission carried no files at all.
    #[error("No documents were submitted")]
    NoDocuments,

    /// The per-field status JSON could not be parsed.
    #[error("Invalid field status payload: {0}")]
    InvalidFieldStatus(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The per-submission staging directory could not be created.
    #[error("Failed to create staging directory under '{path}': {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The client or service folder could not be found or created.
    #[error("Storage error while preparing '{folder}': {source}")]
    Storage {
        folder: String,
        #[source]
        source: StorageError,
    },

    // ── Outcome errors ────────────────────────────────────────────────────
    /// Every submitted file was rejected; nothing was uploaded.
    ///
    /// Returned by [`crate::output::SubmissionOutcome::into_result`].
    #[error("No file was approved; {rejected} file(s) rejected. Review the image quality and try again.")]
    NothingApproved { rejected: usize },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single submitted file.
///
/// Its `Display` text becomes the user-facing rejection reason.
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum FileError {
    /// Zero-byte upload.
    #[error("empty file")]
    Empty,

    /// Larger than `max_filesize_mb`.
    #[error("file too large ({size_mb:.2} MB); maximum allowed: {max_mb} MB")]
    TooLarge { size_mb: f64, max_mb: u64 },

    /// The bytes claim to be an image but cannot be decoded.
    #[error("invalid or corrupt image: {0}")]
    Decode(String),

    /// The image decoded fine but failed the quality gate.
    #[error("{0}")]
    Quality(QualityRejection),

    /// The approved image could not be written as a PDF.
    #[error("image conversion failed: {0}")]
    Conversion(String),

    /// The processed file could not be written to the staging directory.
    #[error("could not stage file: {0}")]
    Staging(String),

    /// The storage collaborator refused the upload.
    #[error("upload failed: {0}")]
    Upload(String),

    /// A worker panicked while handling this file.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

/// Errors raised by a [`crate::storage::StorageBackend`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// Local I/O failure (local backend, or reading a staged file).
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The parent folder id does not refer to a known folder.
    #[error("folder '{0}' does not exist")]
    FolderNotFound(String),

    /// The remote service answered with an error.
    #[error("{0}")]
    Backend(String),
}
