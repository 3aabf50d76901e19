// src/storage.rs

//! File storage for uploaded documents.
//!
//! Paths handed back to callers are relative to the storage root so the root
//! can move without rewriting rows:
//!   `{owner}/files/{uuid}_{file_name}` active
//!   `{owner}/trash/{uuid}_{file_name}` soft-deleted
//!
//! The random prefix keeps two racing uploads of the same name from
//! touching each other's bytes.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("file not found: {0}")]
    Missing(String),
    #[error("invalid storage path: {0}")]
    InvalidPath(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait DocumentStorage: Send + Sync {
    /// Writes `bytes` and returns the stored path.
    async fn save(&self, owner_id: Uuid, file_name: &str, bytes: &[u8]) -> Result<String, StorageError>;

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Moves the file into the owner's trash and returns the new path.
    async fn soft_delete(&self, owner_id: Uuid, path: &str) -> Result<String, StorageError>;

    /// Moves a trashed file back under `file_name` and returns the new path.
    async fn restore(&self, owner_id: Uuid, path: &str, file_name: &str) -> Result<String, StorageError>;

    /// Moves a file to exactly `to`. Used to undo a move whose row update failed.
    async fn relocate(&self, from: &str, to: &str) -> Result<(), StorageError>;

    /// Removes the file for good.
    async fn purge(&self, path: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    fn resolve(&self, rel: &str) -> Result<PathBuf, StorageError> {
        let p = Path::new(rel);
        let safe = !rel.is_empty() && p.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidPath(rel.to_string()));
        }
        Ok(self.root.join(p))
    }

    async fn move_file(&self, from_rel: &str, to_rel: &str) -> Result<(), StorageError> {
        let from = self.resolve(from_rel)?;
        let to = self.resolve(to_rel)?;
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&from, &to)
            .await
            .map_err(|e| not_found_as_missing(e, from_rel))
    }
}

fn active_path(owner_id: Uuid, file_name: &str) -> String {
    format!("{owner_id}/files/{}_{file_name}", Uuid::new_v4())
}

fn trash_path(owner_id: Uuid, file_name: &str) -> String {
    format!("{owner_id}/trash/{}_{file_name}", Uuid::new_v4())
}

/// Strips the `{uuid}_` prefix added by `active_path`/`trash_path`.
pub fn original_name(path: &str) -> Option<&str> {
    let base = Path::new(path).file_name()?.to_str()?;
    match base.split_once('_') {
        Some((prefix, rest)) if Uuid::parse_str(prefix).is_ok() => Some(rest),
        _ => Some(base),
    }
}

fn not_found_as_missing(e: std::io::Error, rel: &str) -> StorageError {
    if e.kind() == ErrorKind::NotFound {
        StorageError::Missing(rel.to_string())
    } else {
        StorageError::Io(e)
    }
}

#[async_trait]
impl DocumentStorage for LocalStorage {
    async fn save(&self, owner_id: Uuid, file_name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let rel = active_path(owner_id, file_name);
        let full = self.resolve(&rel)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;
        Ok(rel)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full = self.resolve(path)?;
        tokio::fs::read(&full)
            .await
            .map_err(|e| not_found_as_missing(e, path))
    }

    async fn soft_delete(&self, owner_id: Uuid, path: &str) -> Result<String, StorageError> {
        let file_name =
            original_name(path).ok_or_else(|| StorageError::InvalidPath(path.to_string()))?;
        let to = trash_path(owner_id, file_name);
        self.move_file(path, &to).await?;
        Ok(to)
    }

    async fn restore(&self, owner_id: Uuid, path: &str, file_name: &str) -> Result<String, StorageError> {
        let to = active_path(owner_id, file_name);
        self.move_file(path, &to).await?;
        Ok(to)
    }

    async fn relocate(&self, from: &str, to: &str) -> Result<(), StorageError> {
        self.move_file(from, to).await
    }

    async fn purge(&self, path: &str) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        tokio::fs::remove_file(&full)
            .await
            .map_err(|e| not_found_as_missing(e, path))
    }
}
