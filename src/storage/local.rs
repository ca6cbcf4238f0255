//! Storage backend over a local directory tree.
//!
//! Folder ids are paths relative to the root directory, `/`-separated, with
//! `.` standing for the root itself. Files are written to a hidden temporary
//! name first and renamed into place, so a reader never sees a partial file.

use super::{FileId, FolderId, StorageBackend};
use crate::error::StorageError;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const ROOT_ID: &str = ".";

/// Stores folders as directories below `root`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Use `root` as the storage root, creating it if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|source| StorageError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a folder id.
    pub fn path_of(&self, folder: &FolderId) -> PathBuf {
        if folder.as_str() == ROOT_ID {
            self.root.clone()
        } else {
            self.root.join(folder.as_str())
        }
    }

    fn child_id(parent: &FolderId, name: &str) -> String {
        if parent.as_str() == ROOT_ID {
            name.to_string()
        } else {
            format!("{}/{}", parent.as_str(), name)
        }
    }

    async fn existing_dir(&self, folder: &FolderId) -> Result<PathBuf, StorageError> {
        let path = self.path_of(folder);
        match fs::metadata(&path).await {
            Ok(m) if m.is_dir() => Ok(path),
            Ok(_) => Err(StorageError::FolderNotFound(folder.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::FolderNotFound(folder.to_string()))
            }
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}

/// Names become single path components; anything that could escape the
/// parent directory is refused.
fn check_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(StorageError::Backend(format!("invalid entry name '{name}'")));
    }
    Ok(())
}

async fn kind_of(path: &Path) -> Result<Option<bool>, StorageError> {
    match fs::metadata(path).await {
        Ok(m) => Ok(Some(m.is_dir())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StorageError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    fn root_folder(&self) -> FolderId {
        FolderId::from(ROOT_ID)
    }

    async fn find_folder(
        &self,
        parent: &FolderId,
        name: &str,
    ) -> Result<Option<FolderId>, StorageError> {
        check_name(name)?;
        let dir = self.existing_dir(parent).await?;
        Ok(match kind_of(&dir.join(name)).await? {
            Some(true) => Some(FolderId::new(Self::child_id(parent, name))),
            _ => None,
        })
    }

    async fn create_folder(&self, parent: &FolderId, name: &str) -> Result<FolderId, StorageError> {
        check_name(name)?;
        let path = self.existing_dir(parent).await?.join(name);
        match fs::create_dir(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!("Directory {} appeared concurrently", path.display());
            }
            Err(source) => return Err(StorageError::Io { path, source }),
        }
        Ok(FolderId::new(Self::child_id(parent, name)))
    }

    async fn find_file(&self, parent: &FolderId, name: &str) -> Result<Option<FileId>, StorageError> {
        check_name(name)?;
        let dir = self.existing_dir(parent).await?;
        Ok(match kind_of(&dir.join(name)).await? {
            Some(false) => Some(FileId::new(Self::child_id(parent, name))),
            _ => None,
        })
    }

    async fn upload_file(
        &self,
        parent: &FolderId,
        name: &str,
        _mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<FileId, StorageError> {
        check_name(name)?;
        let dir = self.existing_dir(parent).await?;
        let target = dir.join(name);
        let tmp = dir.join(format!(".{name}.part-{}", std::process::id()));

        fs::write(&tmp, &bytes)
            .await
            .map_err(|source| StorageError::Io {
                path: tmp.clone(),
                source,
            })?;
        if let Err(source) = fs::rename(&tmp, &target).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StorageError::Io {
                path: target,
                source,
            });
        }
        debug!("Wrote {} ({} bytes)", target.display(), bytes.len());
        Ok(FileId::new(Self::child_id(parent, name)))
    }
}
