//! In-process storage backend.
//!
//! Used by the integration tests and by `doc-intake --dry-run`. Ids are
//! sequential (`folder-1`, `file-1`, …) so outcomes are reproducible.

use super::{FileId, FolderId, StorageBackend};
use crate::error::StorageError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

const ROOT_ID: &str = "root";

#[derive(Debug, Clone)]
struct FolderEntry {
    parent: FolderId,
    name: String,
}

#[derive(Debug, Clone)]
struct FileEntry {
    id: FileId,
    parent: FolderId,
    name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct State {
    folders: HashMap<FolderId, FolderEntry>,
    files: Vec<FileEntry>,
    next_folder: u64,
    next_file: u64,
}

/// Storage kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<State>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock cannot leave the maps half-written,
        // so a poisoned guard is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of folders created so far (the root is not counted).
    pub fn folder_count(&self) -> usize {
        self.lock().folders.len()
    }

    /// Number of files stored across all folders.
    pub fn file_count(&self) -> usize {
        self.lock().files.len()
    }

    /// Names of the files directly inside `folder`, in upload order.
    pub fn file_names(&self, folder: &FolderId) -> Vec<String> {
        self.lock()
            .files
            .iter()
            .filter(|f| &f.parent == folder)
            .map(|f| f.name.clone())
            .collect()
    }

    /// Bytes and MIME type of the file called `name` inside `folder`.
    pub fn file(&self, folder: &FolderId, name: &str) -> Option<(String, Vec<u8>)> {
        self.lock()
            .files
            .iter()
            .find(|f| &f.parent == folder && f.name == name)
            .map(|f| (f.mime_type.clone(), f.bytes.clone()))
    }

    /// Resolve a `/`-separated path of folder names starting at the root.
    pub fn folder_at(&self, path: &str) -> Option<FolderId> {
        let state = self.lock();
        let mut current = FolderId::from(ROOT_ID);
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = state
                .folders
                .iter()
                .find(|(_, e)| e.parent == current && e.name == segment)
                .map(|(id, _)| id.clone())?;
        }
        Some(current)
    }

    /// Every stored file as `folder/path/name`, sorted.
    ///
    /// Handy for asserting on the full tree after a submission.
    pub fn tree(&self) -> Vec<String> {
        fn path_of<'a>(state: &'a State, mut id: &'a FolderId) -> String {
            let mut parts = Vec::new();
            while let Some(entry) = state.folders.get(id) {
                parts.push(entry.name.as_str());
                id = &entry.parent;
            }
            parts.reverse();
            parts.join("/")
        }

        let state = self.lock();
        let mut out: Vec<String> = state
            .files
            .iter()
            .map(|f| format!("{}/{}", path_of(&state, &f.parent), f.name))
            .collect();
        out.sort();
        out
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn root_folder(&self) -> FolderId {
        FolderId::from(ROOT_ID)
    }

    async fn find_folder(
        &self,
        parent: &FolderId,
        name: &str,
    ) -> Result<Option<FolderId>, StorageError> {
        Ok(self
            .lock()
            .folders
            .iter()
            .find(|(_, e)| &e.parent == parent && e.name == name)
            .map(|(id, _)| id.clone()))
    }

    async fn create_folder(&self, parent: &FolderId, name: &str) -> Result<FolderId, StorageError> {
        let mut state = self.lock();
        if parent.as_str() != ROOT_ID && !state.folders.contains_key(parent) {
            return Err(StorageError::FolderNotFound(parent.to_string()));
        }
        state.next_folder += 1;
        let id = FolderId::new(format!("folder-{}", state.next_folder));
        state.folders.insert(
            id.clone(),
            FolderEntry {
                parent: parent.clone(),
                name: name.to_string(),
            },
        );
        Ok(id)
    }

    async fn find_file(&self, parent: &FolderId, name: &str) -> Result<Option<FileId>, StorageError> {
        Ok(self
            .lock()
            .files
            .iter()
            .find(|f| &f.parent == parent && f.name == name)
            .map(|f| f.id.clone()))
    }

    async fn upload_file(
        &self,
        parent: &FolderId,
        name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<FileId, StorageError> {
        let mut state = self.lock();
        if parent.as_str() != ROOT_ID && !state.folders.contains_key(parent) {
            return Err(StorageError::FolderNotFound(parent.to_string()));
        }
        state.next_file += 1;
        let id = FileId::new(format!("file-{}", state.next_file));
        state.files.push(FileEntry {
            id: id.clone(),
            parent: parent.clone(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            bytes,
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_then_find() {
        let s = MemoryStorage::new();
        let root = s.root_folder();
        let client = s.create_folder(&root, "ana-1199").await.unwrap();

        let id = s
            .upload_file(&client, "RG.pdf", "application/pdf", b"%PDF".to_vec())
            .await
            .unwrap();

        assert_eq!(s.find_file(&client, "RG.pdf").await.unwrap(), Some(id));
        assert_eq!(s.find_file(&client, "rg.pdf").await.unwrap(), None);
        assert_eq!(s.file_names(&client), vec!["RG.pdf"]);
        assert_eq!(
            s.file(&client, "RG.pdf"),
            Some(("application/pdf".to_string(), b"%PDF".to_vec()))
        );
    }

    #[tokio::test]
    async fn unknown_parent_is_an_error() {
        let s = MemoryStorage::new();
        let ghost = FolderId::from("folder-99");
        assert!(matches!(
            s.create_folder(&ghost, "x").await,
            Err(StorageError::FolderNotFound(_))
        ));
        assert!(s.upload_file(&ghost, "a", "b", vec![]).await.is_err());
    }

    #[tokio::test]
    async fn tree_and_path_lookup() {
        let s = MemoryStorage::new();
        let root = s.root_folder();
        let client = s.create_folder(&root, "ana-1199").await.unwrap();
        let service = s.create_folder(&client, "Visa").await.unwrap();
        s.upload_file(&service, "report.txt", "text/plain", vec![])
            .await
            .unwrap();

        assert_eq!(s.folder_at("ana-1199/Visa"), Some(service));
        assert_eq!(s.folder_at("ana-1199/Nope"), None);
        assert_eq!(s.folder_at(""), Some(root));
        assert_eq!(s.tree(), vec!["ana-1199/Visa/report.txt"]);
    }

    #[tokio::test]
    async fn tree_walks_every_level_and_sorts() {
        let s = MemoryStorage::new();
        let root = s.root_folder();
        let bia = s.create_folder(&root, "bia-2100").await.unwrap();
        let ana = s.create_folder(&root, "ana-1199").await.unwrap();
        let visa = s.create_folder(&ana, "Visa").await.unwrap();
        let rg = s.create_folder(&visa, "Documento_RG").await.unwrap();
        s.upload_file(&rg, "RG(2).pdf", "application/pdf", vec![1]).await.unwrap();
        s.upload_file(&bia, "notes.txt", "text/plain", vec![2]).await.unwrap();
        s.upload_file(&rg, "RG.pdf", "application/pdf", vec![3]).await.unwrap();

        assert_eq!(
            s.tree(),
            vec![
                "ana-1199/Visa/Documento_RG/RG(2).pdf",
                "ana-1199/Visa/Documento_RG/RG.pdf",
                "bia-2100/notes.txt",
            ]
        );
    }
}
