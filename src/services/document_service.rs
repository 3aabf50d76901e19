// src/services/document_service.rs

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::document::{DocumentRecord, NewDocument, validate_file_name};
use crate::error::ServiceError;
use crate::storage::{DocumentStorage, StorageError};
use crate::store::DocumentStore;

fn storage_failure(op: &'static str, path: &str, e: StorageError) -> ServiceError {
    tracing::error!(op, path, error = %e, "document storage failed");
    ServiceError::Storage(e)
}

pub async fn upload(
    store: &dyn DocumentStore,
    storage: &dyn DocumentStorage,
    owner_id: Uuid,
    patient_id: Option<Uuid>,
    file_name: &str,
    bytes: &[u8],
    now: DateTime<Utc>,
) -> Result<DocumentRecord, ServiceError> {
    let file_name = validate_file_name(file_name)?;

    if store.active_name_exists(owner_id, &file_name).await? {
        return Err(ServiceError::DocumentExists(file_name));
    }

    let storage_path = storage
        .save(owner_id, &file_name, bytes)
        .await
        .map_err(|e| storage_failure("save", &file_name, e))?;

    let new_doc = NewDocument {
        owner_id,
        patient_id,
        file_name,
        storage_path,
        created_at: now,
    };

    match store.insert(&new_doc).await {
        Ok(doc) => {
            tracing::info!(
                owner_id = %owner_id,
                document_id = %doc.document_id,
                size = bytes.len(),
                "document uploaded"
            );
            Ok(doc)
        }
        Err(e) => {
            // the row never landed, drop the orphaned file
            if let Err(cleanup) = storage.purge(&new_doc.storage_path).await {
                tracing::warn!(path = %new_doc.storage_path, error = %cleanup, "orphaned upload left on disk");
            }
            Err(e)
        }
    }
}

pub async fn download(
    store: &dyn DocumentStore,
    storage: &dyn DocumentStorage,
    owner_id: Uuid,
    document_id: Uuid,
) -> Result<(DocumentRecord, Vec<u8>), ServiceError> {
    let doc = store
        .find_active(owner_id, document_id)
        .await?
        .ok_or(ServiceError::DocumentNotFound)?;
    let bytes = storage
        .read(&doc.storage_path)
        .await
        .map_err(|e| storage_failure("read", &doc.storage_path, e))?;
    Ok((doc, bytes))
}

pub async fn list(
    store: &dyn DocumentStore,
    owner_id: Uuid,
    patient_id: Option<Uuid>,
    deleted: bool,
) -> Result<Vec<DocumentRecord>, ServiceError> {
    store.list(owner_id, patient_id, deleted).await
}

/// Moves the document to the trash. It stays restorable until purged.
pub async fn soft_delete(
    store: &dyn DocumentStore,
    storage: &dyn DocumentStorage,
    owner_id: Uuid,
    document_id: Uuid,
    now: DateTime<Utc>,
) -> Result<DocumentRecord, ServiceError> {
    let doc = store
        .find_active(owner_id, document_id)
        .await?
        .ok_or(ServiceError::DocumentNotFound)?;

    let trash_path = storage
        .soft_delete(owner_id, &doc.storage_path)
        .await
        .map_err(|e| storage_failure("soft_delete", &doc.storage_path, e))?;

    match store.mark_deleted(document_id, &trash_path, now).await {
        Ok(deleted) => {
            tracing::info!(owner_id = %owner_id, document_id = %document_id, "document moved to trash");
            Ok(deleted)
        }
        Err(e) => {
            if let Err(undo) = storage.relocate(&trash_path, &doc.storage_path).await {
                tracing::error!(path = %trash_path, error = %undo, "could not move file back after failed delete");
            }
            Err(e)
        }
    }
}

pub async fn restore(
    store: &dyn DocumentStore,
    storage: &dyn DocumentStorage,
    owner_id: Uuid,
    document_id: Uuid,
    now: DateTime<Utc>,
) -> Result<DocumentRecord, ServiceError> {
    let doc = store
        .find_deleted(owner_id, document_id)
        .await?
        .ok_or(ServiceError::DocumentNotFound)?;

    if store.active_name_exists(owner_id, &doc.file_name).await? {
        return Err(ServiceError::DocumentExists(doc.file_name));
    }

    let active_path = storage
        .restore(owner_id, &doc.storage_path, &doc.file_name)
        .await
        .map_err(|e| storage_failure("restore", &doc.storage_path, e))?;

    match store.mark_restored(&doc, &active_path, now).await {
        Ok(restored) => {
            tracing::info!(owner_id = %owner_id, document_id = %document_id, "document restored");
            Ok(restored)
        }
        Err(e) => {
            if let Err(undo) = storage.relocate(&active_path, &doc.storage_path).await {
                tracing::error!(path = %active_path, error = %undo, "could not return file to trash after failed restore");
            }
            Err(e)
        }
    }
}
