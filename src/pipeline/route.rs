//! Upload routing: where each processed file goes, and getting it there.
//!
//! Routing runs as a fork-join:
//!
//! 1. [`plan`] (pure): group files by field id. A field with one file goes
//!    straight into the service folder; a field with several gets its own
//!    subfolder named after the field label. Stored names that would clash
//!    inside one folder are numbered (`RG.pdf`, `RG(2).pdf`).
//! 2. Field subfolders are resolved one after another, find-before-create,
//!    so no folder is ever created twice.
//! 3. Uploads fan out with `buffer_unordered`. Each one is skip-on-existing:
//!    a file whose name is already taken in its folder is left alone.
//!
//! A failed upload, or a field folder that cannot be prepared, rejects only
//! the files concerned.

use crate::error::{FileError, StorageError};
use crate::output::{ProcessedFile, RejectedFile};
use crate::progress::ProgressCallback;
use crate::storage::{ensure_folder, FileId, FolderId, StorageBackend};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use super::naming;

/// Folder a planned upload lands in, relative to the service folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    /// Directly in the service folder.
    Service,
    /// In the named field subfolder of the service folder.
    FieldFolder(String),
}

/// One processed file with its destination decided.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedUpload {
    /// Position of the file in the submission.
    pub index: usize,
    pub target: Target,
    pub file: ProcessedFile,
}

/// Whether an upload actually wrote a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Uploaded(FileId),
    /// A file of that name already existed; nothing was written.
    Skipped(FileId),
}

impl UploadStatus {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

/// Decide the target folder and final stored name of each processed file.
///
/// `reserved` names are treated as taken in the service folder (the report
/// lives there). Input order is preserved and decides which duplicate keeps
/// the plain name.
pub fn plan(
    processed: Vec<(usize, ProcessedFile)>,
    reserved: &[&str],
    max_filename_len: usize,
) -> Vec<PlannedUpload> {
    let mut per_field: HashMap<&str, usize> = HashMap::new();
    for (_, file) in &processed {
        *per_field.entry(file.field_id.as_str()).or_default() += 1;
    }
    let targets: Vec<Target> = processed
        .iter()
        .map(|(_, file)| {
            if per_field[file.field_id.as_str()] > 1 {
                Target::FieldFolder(naming::field_folder_name(&file.field_label, max_filename_len))
            } else {
                Target::Service
            }
        })
        .collect();

    let mut taken: HashSet<(Target, String)> = reserved
        .iter()
        .map(|name| (Target::Service, name.to_string()))
        .collect();

    processed
        .into_iter()
        .zip(targets)
        .map(|((index, mut file), target)| {
            let mut name = file.stored_name.clone();
            let mut n = 1;
            while taken.contains(&(target.clone(), name.clone())) {
                n += 1;
                name = naming::numbered_name(&file.stored_name, n);
            }
            if name != file.stored_name {
                debug!("Renamed {} to {} to avoid a clash", file.stored_name, name);
                file.stored_name = name.clone();
            }
            taken.insert((target.clone(), name));
            PlannedUpload {
                index,
                target,
                file,
            }
        })
        .collect()
}

/// Upload `bytes` as `name` unless the folder already has a file of that name.
pub async fn put_if_absent<S>(
    storage: &S,
    folder: &FolderId,
    name: &str,
    mime_type: &str,
    bytes: Vec<u8>,
) -> Result<UploadStatus, StorageError>
where
    S: StorageBackend + ?Sized,
{
    if let Some(existing) = storage.find_file(folder, name).await? {
        info!("File '{}' already exists in {}; skipping upload", name, folder);
        return Ok(UploadStatus::Skipped(existing));
    }
    let id = storage.upload_file(folder, name, mime_type, bytes).await?;
    info!("Uploaded '{}' to {}", name, folder);
    Ok(UploadStatus::Uploaded(id))
}

/// What happened to the planned uploads, each list in submission order.
#[derive(Debug, Default)]
pub struct RouteResult {
    /// Files now in storage, with their submission index.
    pub stored: Vec<(usize, ProcessedFile)>,
    /// Files that could not be stored.
    pub failed: Vec<(usize, RejectedFile)>,
    pub uploaded: usize,
    pub skipped: usize,
}

/// Drives planned uploads against a [`StorageBackend`].
pub struct UploadRouter<'a, S: StorageBackend + ?Sized> {
    storage: &'a S,
    concurrency: usize,
    progress: Option<ProgressCallback>,
}

impl<'a, S: StorageBackend + ?Sized> UploadRouter<'a, S> {
    pub fn new(storage: &'a S, concurrency: usize) -> Self {
        Self {
            storage,
            concurrency: concurrency.max(1),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Resolve field folders under `service_folder`, then upload every file.
    pub async fn route(&self, service_folder: &FolderId, planned: Vec<PlannedUpload>) -> RouteResult {
        // ── Resolve field subfolders, one at a time ──────────────────────
        let mut folders: HashMap<Target, Result<FolderId, String>> = HashMap::new();
        folders.insert(Target::Service, Ok(service_folder.clone()));
        for upload in &planned {
            if let Target::FieldFolder(name) = &upload.target {
                if folders.contains_key(&upload.target) {
                    continue;
                }
                let resolved = ensure_folder(self.storage, service_folder, name)
                    .await
                    .map_err(|e| {
                        warn!("Could not prepare field folder '{}': {}", name, e);
                        format!("could not prepare folder '{name}': {e}")
                    });
                folders.insert(upload.target.clone(), resolved);
            }
        }

        // ── Fan out uploads ──────────────────────────────────────────────
        let mut result = RouteResult::default();
        let mut jobs = Vec::with_capacity(planned.len());
        for upload in planned {
            match &folders[&upload.target] {
                Ok(folder) => jobs.push((upload, folder.clone())),
                Err(cause) => {
                    let rejected = RejectedFile::from_processed(&upload.file, FileError::Upload(cause.clone()));
                    self.notify_rejected(&rejected);
                    result.failed.push((upload.index, rejected));
                }
            }
        }

        let outcomes: Vec<_> = stream::iter(jobs)
            .map(|(upload, folder)| async move {
                let status = self.upload_one(&folder, &upload.file).await;
                (upload, status)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (upload, status) in outcomes {
            match status {
                Ok(status) => {
                    if status.is_skipped() {
                        result.skipped += 1;
                    } else {
                        result.uploaded += 1;
                    }
                    if let Some(cb) = &self.progress {
                        cb.on_upload_complete(&upload.file.stored_name, status.is_skipped());
                    }
                    result.stored.push((upload.index, upload.file));
                }
                Err(e) => {
                    warn!("Upload of {} failed: {}", upload.file.stored_name, e);
                    let rejected = RejectedFile::from_processed(&upload.file, FileError::Upload(e.to_string()));
                    self.notify_rejected(&rejected);
                    result.failed.push((upload.index, rejected));
                }
            }
        }

        result.stored.sort_by_key(|(i, _)| *i);
        result.failed.sort_by_key(|(i, _)| *i);
        result
    }

    async fn upload_one(&self, folder: &FolderId, file: &ProcessedFile) -> Result<UploadStatus, StorageError> {
        let bytes = tokio::fs::read(&file.path)
            .await
            .map_err(|source| StorageError::Io {
                path: file.path.clone(),
                source,
            })?;
        put_if_absent(self.storage, folder, &file.stored_name, &file.mime, bytes).await
    }

    fn notify_rejected(&self, rejected: &RejectedFile) {
        if let Some(cb) = &self.progress {
            cb.on_file_rejected(&rejected.filename, &rejected.reason);
        }
    }
}
