// src/routes/document_routes.rs

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{delete, get, post},
};
use axum_extra::extract::Query;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    document::DocumentView,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState},
    services::document_service,
};

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/Resources/Create",
            post(upload_document).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/Resources/Get", get(list_documents))
        .route("/Resources/Trash", get(list_trash))
        .route("/Resources/Download/{document_id}", get(download_document))
        .route("/Resources/Delete/{document_id}", delete(delete_document))
        .route("/Resources/Restore/{document_id}", post(restore_document))
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::BadRequest("VALIDATION_ERROR", format!("invalid upload: {e}"))
}

/// Fields: `file` (required, carries the file name) and `patientId` (optional).
pub async fn upload_document(
    State(state): State<AppState>,
    auth: AuthContext,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut patient_id: Option<Uuid> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                file = Some((name, bytes.to_vec()));
            }
            Some("patientId") => {
                let raw = field.text().await.map_err(bad_multipart)?;
                let raw = raw.trim();
                if !raw.is_empty() {
                    let id = raw.parse::<Uuid>().map_err(|_| {
                        ApiError::BadRequest("VALIDATION_ERROR", "patientId must be a UUID".into())
                    })?;
                    patient_id = Some(id);
                }
            }
            _ => {}
        }
    }

    let (file_name, bytes) = file.ok_or_else(|| {
        ApiError::BadRequest("VALIDATION_ERROR", "file is required".into())
    })?;

    let doc = document_service::upload(
        state.documents.as_ref(),
        state.storage.as_ref(),
        auth.user_id,
        patient_id,
        &file_name,
        &bytes,
        Utc::now(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiOk::new(DocumentView::from(doc))),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsQuery {
    pub patient_id: Option<Uuid>,
}

pub async fn list_documents(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<ListDocumentsQuery>,
) -> Result<Json<ApiOk<Vec<DocumentView>>>, ApiError> {
    let docs =
        document_service::list(state.documents.as_ref(), auth.user_id, q.patient_id, false).await?;
    Ok(Json(ApiOk::new(docs.into_iter().map(DocumentView::from).collect())))
}

pub async fn list_trash(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<DocumentView>>>, ApiError> {
    let docs = document_service::list(state.documents.as_ref(), auth.user_id, None, true).await?;
    Ok(Json(ApiOk::new(docs.into_iter().map(DocumentView::from).collect())))
}

pub async fn download_document(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(document_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (doc, bytes) = document_service::download(
        state.documents.as_ref(),
        state.storage.as_ref(),
        auth.user_id,
        document_id,
    )
    .await?;

    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (header::CONTENT_DISPOSITION, content_disposition(&doc.file_name)),
    ];
    Ok((headers, bytes))
}

fn content_disposition(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| if c == '"' || c == '\\' || !c.is_ascii() { '_' } else { c })
        .collect();
    format!("attachment; filename=\"{safe}\"")
}

pub async fn delete_document(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(document_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    document_service::soft_delete(
        state.documents.as_ref(),
        state.storage.as_ref(),
        auth.user_id,
        document_id,
        Utc::now(),
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restore_document(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(document_id): Path<Uuid>,
) -> Result<Json<ApiOk<DocumentView>>, ApiError> {
    let doc = document_service::restore(
        state.documents.as_ref(),
        state.storage.as_ref(),
        auth.user_id,
        document_id,
        Utc::now(),
    )
    .await?;
    Ok(Json(ApiOk::new(DocumentView::from(doc))))
}
