// src/db/document_store.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{is_foreign_key_violation, is_unique_violation};
use crate::document::{DocumentRecord, DocumentState, NewDocument};
use crate::error::ServiceError;
use crate::store::{DocumentStore, StoreResult};

#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    document_id: Uuid,
    owner_user_id: Option<Uuid>,
    patient_id: Option<Uuid>,
    file_name: String,
    storage_path: String,
    deleted_at: Option<DateTime<Utc>>,
    edited_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<DocumentRow> for DocumentRecord {
    fn from(r: DocumentRow) -> Self {
        Self {
            document_id: r.document_id,
            owner_id: r.owner_user_id,
            patient_id: r.patient_id,
            file_name: r.file_name,
            storage_path: r.storage_path,
            state: DocumentState::from_deleted_at(r.deleted_at),
            edited_at: r.edited_at,
            created_at: r.created_at,
        }
    }
}

const DOCUMENT_COLUMNS: &str =
    "document_id, owner_user_id, patient_id, file_name, storage_path, deleted_at, edited_at, created_at";

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find(&self, owner_id: Uuid, document_id: Uuid, deleted: bool) -> StoreResult<Option<DocumentRecord>> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS}
            FROM document
            WHERE document_id = $1
              AND owner_user_id = $2
              AND (deleted_at IS NOT NULL) = $3"
        );
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(document_id)
            .bind(owner_id)
            .bind(deleted)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn active_name_exists(&self, owner_id: Uuid, file_name: &str) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
              SELECT 1
              FROM document
              WHERE owner_user_id = $1
                AND file_name = $2
                AND deleted_at IS NULL
            )
            "#,
        )
        .bind(owner_id)
        .bind(file_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn insert(&self, doc: &NewDocument) -> StoreResult<DocumentRecord> {
        let sql = format!(
            "INSERT INTO document (owner_user_id, patient_id, file_name, storage_path, edited_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING {DOCUMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(doc.owner_id)
            .bind(doc.patient_id)
            .bind(&doc.file_name)
            .bind(&doc.storage_path)
            .bind(doc.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ServiceError::DocumentExists(doc.file_name.clone())
                } else if is_foreign_key_violation(&e) {
                    ServiceError::PatientNotFound
                } else {
                    ServiceError::Database(e)
                }
            })?;
        Ok(row.into())
    }

    async fn find_active(&self, owner_id: Uuid, document_id: Uuid) -> StoreResult<Option<DocumentRecord>> {
        self.find(owner_id, document_id, false).await
    }

    async fn find_deleted(&self, owner_id: Uuid, document_id: Uuid) -> StoreResult<Option<DocumentRecord>> {
        self.find(owner_id, document_id, true).await
    }

    async fn list(&self, owner_id: Uuid, patient_id: Option<Uuid>, deleted: bool) -> StoreResult<Vec<DocumentRecord>> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS}
            FROM document
            WHERE owner_user_id = $1
              AND ($2::uuid IS NULL OR patient_id = $2)
              AND (deleted_at IS NOT NULL) = $3
            ORDER BY edited_at DESC"
        );
        let rows = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(owner_id)
            .bind(patient_id)
            .bind(deleted)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn mark_deleted(&self, document_id: Uuid, storage_path: &str, at: DateTime<Utc>) -> StoreResult<DocumentRecord> {
        let sql = format!(
            "UPDATE document
            SET deleted_at = $2,
                edited_at = $2,
                storage_path = $3
            WHERE document_id = $1
              AND deleted_at IS NULL
            RETURNING {DOCUMENT_COLUMNS}"
        );
        sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(document_id)
            .bind(at)
            .bind(storage_path)
            .fetch_optional(&self.pool)
            .await?
            .map(Into::into)
            .ok_or(ServiceError::DocumentNotFound)
    }

    async fn mark_restored(&self, doc: &DocumentRecord, storage_path: &str, at: DateTime<Utc>) -> StoreResult<DocumentRecord> {
        let sql = format!(
            "UPDATE document
            SET deleted_at = NULL,
                edited_at = $2,
                storage_path = $3
            WHERE document_id = $1
              AND deleted_at IS NOT NULL
            RETURNING {DOCUMENT_COLUMNS}"
        );
        sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(doc.document_id)
            .bind(at)
            .bind(storage_path)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ServiceError::DocumentExists(doc.file_name.clone())
                } else {
                    ServiceError::Database(e)
                }
            })?
            .map(Into::into)
            .ok_or(ServiceError::DocumentNotFound)
    }

    async fn deleted_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<DocumentRecord>> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS}
            FROM document
            WHERE deleted_at IS NOT NULL
              AND deleted_at < $1
            ORDER BY deleted_at ASC"
        );
        let rows = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn remove(&self, purged: &[(Uuid, String)]) -> StoreResult<u64> {
        if purged.is_empty() {
            return Ok(0);
        }
        let (ids, paths): (Vec<Uuid>, Vec<String>) = purged.iter().cloned().unzip();
        let res = sqlx::query(
            r#"
            DELETE FROM document d
            USING UNNEST($1::uuid[], $2::text[]) AS p(document_id, storage_path)
            WHERE d.document_id = p.document_id
              AND d.storage_path = p.storage_path
              AND d.deleted_at IS NOT NULL
            "#,
        )
        .bind(&ids)
        .bind(&paths)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }
}
