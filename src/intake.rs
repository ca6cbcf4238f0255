//! Submission entry points.
//!
//! [`process_submission`] runs the whole flow for one form post:
//!
//! ```text
//! validate form → classify files → (nothing approved? stop)
//!   → client folder → service folder → plan → upload → report
//! ```
//!
//! Storage is only touched once at least one file has been approved, so a
//! submission made entirely of bad photos leaves no trace in the backend.

use crate::config::IntakeConfig;
use crate::error::IntakeError;
use crate::output::{IntakeStats, ProcessedFile, RejectedFile, SubmissionOutcome};
use crate::pipeline::classify::FileClassifier;
use crate::pipeline::naming;
use crate::pipeline::report::build_report;
use crate::pipeline::route::{self, put_if_absent, UploadRouter};
use crate::storage::{ensure_folder, StorageBackend};
use crate::submission::Submission;
use std::time::Instant;
use tracing::{info, warn};

const REPORT_MIME: &str = "text/plain; charset=utf-8";

/// Process one submission against `storage`.
///
/// # Returns
/// `Ok(SubmissionOutcome)` whenever the submission itself was valid, even if
/// every file was rejected (see [`SubmissionOutcome::into_result`]).
///
/// # Errors
/// Returns `Err(IntakeError)` only for fatal problems:
/// - the form fails validation (name, phone, no files, bad field status)
/// - the staging directory cannot be created
/// - the client or service folder cannot be found or created
pub async fn process_submission<S>(
    submission: &Submission,
    storage: &S,
    config: &IntakeConfig,
) -> Result<SubmissionOutcome, IntakeError>
where
    S: StorageBackend + ?Sized,
{
    let total_start = Instant::now();

    // ── Step 1: Validate the form ────────────────────────────────────────
    let phone_digits = submission.validate(config.min_name_len, config.min_phone_digits)?;
    let client_folder_name =
        naming::client_folder_name(&submission.client_name, &phone_digits, config.max_folder_name_len);
    let service_folder_name = naming::service_folder_name(&submission.service, config.max_filename_len);
    let total_files = submission.files.len();
    info!(
        "Processing submission for {} ({} file(s)) → {}/{}",
        submission.client_name, total_files, client_folder_name, service_folder_name
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_submission_start(total_files);
    }

    // ── Step 2: Staging directory ────────────────────────────────────────
    // Removed when `staging` drops, on every return path.
    let staging = tempfile::Builder::new()
        .prefix("doc-intake-")
        .tempdir()
        .map_err(|source| IntakeError::Staging {
            path: std::env::temp_dir(),
            source,
        })?;

    // ── Step 3: Classify every file ──────────────────────────────────────
    let classify_start = Instant::now();
    let classifier = FileClassifier::new(config, staging.path());
    let mut processed: Vec<(usize, ProcessedFile)> = Vec::new();
    let mut rejected: Vec<(usize, RejectedFile)> = Vec::new();

    for (index, file) in submission.files.iter().enumerate() {
        let field = submission.field_for(&file.filename);
        match classifier.classify_async(file.clone(), field, index).await {
            Ok(p) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_file_accepted(&p.original_name, &p.stored_name);
                }
                processed.push((index, p));
            }
            Err(r) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_file_rejected(&r.filename, &r.reason);
                }
                rejected.push((index, r));
            }
        }
    }
    let classify_duration_ms = classify_start.elapsed().as_millis() as u64;
    info!(
        "Classified {} file(s) in {}ms: {} approved, {} rejected",
        total_files,
        classify_duration_ms,
        processed.len(),
        rejected.len()
    );

    // ── Step 4: Stop early when nothing was approved ─────────────────────
    if processed.is_empty() {
        warn!(
            "No file approved for {}; {} rejected",
            submission.client_name,
            rejected.len()
        );
        let rejected: Vec<RejectedFile> = rejected.into_iter().map(|(_, r)| r).collect();
        let stats = IntakeStats {
            total_files,
            rejected_files: rejected.len(),
            classify_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
            ..Default::default()
        };
        if let Some(ref cb) = config.progress_callback {
            cb.on_submission_complete(0, rejected.len());
        }
        return Ok(SubmissionOutcome {
            message: SubmissionOutcome::summary_message(0, rejected.len(), 0),
            client: submission.client_name.clone(),
            client_folder: client_folder_name,
            service_folder: service_folder_name,
            processed: Vec::new(),
            rejected,
            report: String::new(),
            stats,
        });
    }

    // ── Step 5: Client and service folders ───────────────────────────────
    let upload_start = Instant::now();
    let root = config
        .root_folder
        .clone()
        .unwrap_or_else(|| storage.root_folder());
    let client_folder = ensure_folder(storage, &root, &client_folder_name)
        .await
        .map_err(|source| IntakeError::Storage {
            folder: client_folder_name.clone(),
            source,
        })?;
    let service_folder = ensure_folder(storage, &client_folder, &service_folder_name)
        .await
        .map_err(|source| IntakeError::Storage {
            folder: format!("{client_folder_name}/{service_folder_name}"),
            source,
        })?;

    // ── Step 6: Plan and upload ──────────────────────────────────────────
    let planned = route::plan(processed, &[config.report_name.as_str()], config.max_filename_len);
    let routed = UploadRouter::new(storage, config.upload_concurrency)
        .with_progress(config.progress_callback.clone())
        .route(&service_folder, planned)
        .await;

    rejected.extend(routed.failed);
    rejected.sort_by_key(|(i, _)| *i);
    let stored: Vec<ProcessedFile> = routed.stored.into_iter().map(|(_, p)| p).collect();
    let rejected: Vec<RejectedFile> = rejected.into_iter().map(|(_, r)| r).collect();

    // ── Step 7: Report ───────────────────────────────────────────────────
    let report = build_report(
        &submission.client_name,
        &submission.phone,
        &submission.service,
        &submission.field_status,
        &stored,
        &rejected,
    );
    let report_uploaded = match put_if_absent(
        storage,
        &service_folder,
        &config.report_name,
        REPORT_MIME,
        report.clone().into_bytes(),
    )
    .await
    {
        Ok(status) => !status.is_skipped(),
        Err(e) => {
            warn!("Could not store report '{}': {}", config.report_name, e);
            false
        }
    };
    let upload_duration_ms = upload_start.elapsed().as_millis() as u64;

    // ── Step 8: Stats ────────────────────────────────────────────────────
    let stats = IntakeStats {
        total_files,
        approved_files: stored.len(),
        rejected_files: rejected.len(),
        uploaded_files: routed.uploaded,
        skipped_files: routed.skipped,
        report_uploaded,
        classify_duration_ms,
        upload_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Submission complete for {}: {} uploaded, {} already present, {} rejected, {}ms total",
        submission.client_name,
        stats.uploaded_files,
        stats.skipped_files,
        stats.rejected_files,
        stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_submission_complete(stats.uploaded_files, stats.rejected_files);
    }

    Ok(SubmissionOutcome {
        message: SubmissionOutcome::summary_message(stored.len(), rejected.len(), routed.uploaded),
        client: submission.client_name.clone(),
        client_folder: client_folder_name,
        service_folder: service_folder_name,
        processed: stored,
        rejected,
        report,
        stats,
    })
}

/// Synchronous wrapper around [`process_submission`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_submission_sync<S>(
    submission: &Submission,
    storage: &S,
    config: &IntakeConfig,
) -> Result<SubmissionOutcome, IntakeError>
where
    S: StorageBackend + ?Sized,
{
    tokio::runtime::Runtime::new()
        .map_err(|e| IntakeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process_submission(submission, storage, config))
}
