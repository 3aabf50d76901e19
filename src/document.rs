// src/document.rs

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ServiceError;

const MAX_FILE_NAME_LEN: usize = 255;

/// Lifecycle of a stored document. A deleted document stays restorable
/// until the purge sweep removes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    Active,
    Deleted { at: DateTime<Utc> },
}

impl DocumentState {
    pub fn from_deleted_at(deleted_at: Option<DateTime<Utc>>) -> Self {
        match deleted_at {
            None => DocumentState::Active,
            Some(at) => DocumentState::Deleted { at },
        }
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self {
            DocumentState::Active => None,
            DocumentState::Deleted { at } => Some(*at),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, DocumentState::Active)
    }

    /// True once a deleted document has sat in the trash longer than `retention`.
    pub fn purge_due(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        match self {
            DocumentState::Active => false,
            DocumentState::Deleted { at } => *at < now - retention,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub document_id: Uuid,
    pub owner_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub file_name: String,
    pub storage_path: String,
    pub state: DocumentState,
    pub edited_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub owner_id: Uuid,
    pub patient_id: Option<Uuid>,
    pub file_name: String,
    pub storage_path: String,
    pub created_at: DateTime<Utc>,
}

/// Client-facing metadata. The storage path stays server side.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentView {
    pub document_id: Uuid,
    pub owner_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub file_name: String,
    pub edited_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<DocumentRecord> for DocumentView {
    fn from(r: DocumentRecord) -> Self {
        Self {
            document_id: r.document_id,
            owner_id: r.owner_id,
            patient_id: r.patient_id,
            file_name: r.file_name,
            edited_at: r.edited_at,
            created_at: r.created_at,
            deleted_at: r.state.deleted_at(),
        }
    }
}

/// Trims the name and rejects anything that could escape the owner's folder.
pub fn validate_file_name(raw: &str) -> Result<String, ServiceError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation("file name is required".into()));
    }
    if name.len() > MAX_FILE_NAME_LEN {
        return Err(ServiceError::Validation(format!(
            "file name is too long (max {MAX_FILE_NAME_LEN})"
        )));
    }
    if name == "." || name == ".." || name.starts_with('.') {
        return Err(ServiceError::Validation("file name must not start with '.'".into()));
    }
    if name.chars().any(|c| c == '/' || c == '\\' || c.is_control()) {
        return Err(ServiceError::Validation(
            "file name contains invalid characters".into(),
        ));
    }
    Ok(name.to_string())
}
