//! Output types: what happened to each file, and to the submission as a whole.

use crate::error::{FileError, IntakeError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A file that passed classification and is ready for (or has reached) storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedFile {
    /// Staged copy on local disk. Only valid while the submission is running.
    pub path: PathBuf,
    /// Name in storage (`RG.pdf`, `RG(2).pdf`, `Contrato.docx`, …).
    pub stored_name: String,
    pub mime: String,
    pub original_name: String,
    pub field_id: String,
    pub field_label: String,
}

/// A file that will not be stored, with the reason shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedFile {
    pub filename: String,
    pub reason: String,
    pub field_id: String,
    pub field_label: String,
    pub error: FileError,
}

impl RejectedFile {
    pub fn new(
        filename: impl Into<String>,
        field_id: impl Into<String>,
        field_label: impl Into<String>,
        error: FileError,
    ) -> Self {
        Self {
            filename: filename.into(),
            reason: error.to_string(),
            field_id: field_id.into(),
            field_label: field_label.into(),
            error,
        }
    }

    /// Reject an already-processed file, e.g. after a failed upload.
    pub fn from_processed(file: &ProcessedFile, error: FileError) -> Self {
        Self::new(
            file.original_name.clone(),
            file.field_id.clone(),
            file.field_label.clone(),
            error,
        )
    }
}

/// Counters and timings for one submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntakeStats {
    pub total_files: usize,
    /// Files that reached storage, whether uploaded now or already present.
    pub approved_files: usize,
    pub rejected_files: usize,
    pub uploaded_files: usize,
    pub skipped_files: usize,
    pub report_uploaded: bool,
    pub classify_duration_ms: u64,
    pub upload_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// The result of processing one submission.
///
/// `processed` and `rejected` together hold every submitted file exactly once,
/// each list in submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub message: String,
    pub client: String,
    pub client_folder: String,
    pub service_folder: String,
    pub processed: Vec<ProcessedFile>,
    pub rejected: Vec<RejectedFile>,
    /// Report text. Empty when nothing was approved, as no report is stored then.
    pub report: String,
    pub stats: IntakeStats,
}

impl SubmissionOutcome {
    /// `true` when at least one file reached storage.
    pub fn is_success(&self) -> bool {
        !self.processed.is_empty()
    }

    /// Turn an outcome with no approved file into [`IntakeError::NothingApproved`].
    pub fn into_result(self) -> Result<Self, IntakeError> {
        if self.processed.is_empty() {
            return Err(IntakeError::NothingApproved {
                rejected: self.rejected.len(),
            });
        }
        Ok(self)
    }

    /// The user-facing summary line for the given counts.
    pub(crate) fn summary_message(processed: usize, rejected: usize, uploaded: usize) -> String {
        if processed == 0 {
            format!("No file was approved; {rejected} file(s) rejected.")
        } else if uploaded > 0 {
            "Files uploaded successfully.".to_string()
        } else if rejected == 0 {
            "All files were already stored; nothing new to upload.".to_string()
        } else {
            "Processing finished with errors.".to_string()
        }
    }
}
