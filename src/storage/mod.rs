//! Remote hierarchical storage, seen through the four calls intake needs.
//!
//! The pipeline never talks to a concrete service. It drives a
//! [`StorageBackend`], which only has to answer "is there a folder/file with
//! this exact name under this parent?" and "create one". The backend is the
//! single source of truth for idempotence: nothing is cached locally, so every
//! lookup round-trips.
//!
//! Two backends ship with the crate:
//!
//! * [`local::LocalStorage`]: folders are directories under a root path.
//! * [`memory::MemoryStorage`]: mutex-guarded maps, used by tests and by the
//!   CLI's `--dry-run`.

pub mod local;
pub mod memory;

use crate::error::StorageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Opaque id of a folder in the storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderId(String);

/// Opaque id of a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

macro_rules! opaque_id {
    ($ty:ident) => {
        impl $ty {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $ty {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $ty {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

opaque_id!(FolderId);
opaque_id!(FileId);

/// The storage capabilities consumed by intake.
///
/// Names are matched exactly (case-sensitive). Implementations are expected
/// to handle their own timeouts and retries; a returned `Err` is final for
/// that call.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Folder that client folders are created under by default.
    fn root_folder(&self) -> FolderId;

    async fn find_folder(&self, parent: &FolderId, name: &str)
        -> Result<Option<FolderId>, StorageError>;

    async fn create_folder(&self, parent: &FolderId, name: &str) -> Result<FolderId, StorageError>;

    async fn find_file(&self, parent: &FolderId, name: &str) -> Result<Option<FileId>, StorageError>;

    async fn upload_file(
        &self,
        parent: &FolderId,
        name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<FileId, StorageError>;
}

/// Look up `name` under `parent`, creating it only if the lookup found nothing.
///
/// A failed lookup is returned as an error rather than followed by a create,
/// so a flaky backend can never produce two folders with the same name.
pub async fn ensure_folder<S>(storage: &S, parent: &FolderId, name: &str) -> Result<FolderId, StorageError>
where
    S: StorageBackend + ?Sized,
{
    if let Some(id) = storage.find_folder(parent, name).await? {
        info!("Folder '{}' already exists: {}", name, id);
        return Ok(id);
    }
    let id = storage.create_folder(parent, name).await?;
    info!("Folder '{}' created: {}", name, id);
    Ok(id)
}
