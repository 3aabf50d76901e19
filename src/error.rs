use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::booking::{BookingSlot, format_slots};
use crate::storage::StorageError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str, String),
    Forbidden(&'static str, String),
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Conflict(&'static str, String, Vec<String>),
    Internal(String),
}

impl ApiError {
    pub fn invalid_credentials() -> Self {
        ApiError::Unauthorized("INVALID_CREDENTIALS", "Email or password is incorrect".into())
    }

    pub fn session_expired() -> Self {
        ApiError::Unauthorized("SESSION_EXPIRED", "Session expired".into())
    }

    pub fn db(e: sqlx::Error) -> Self {
        tracing::error!(error = %e, "database error");
        ApiError::Internal("database error".into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(..) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(..) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(..) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(..) => StatusCode::NOT_FOUND,
            ApiError::Conflict(..) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn to_error_response(code: &str, message: &str, details: Vec<String>) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
                details,
            },
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Unauthorized(code, msg)
            | ApiError::Forbidden(code, msg)
            | ApiError::BadRequest(code, msg)
            | ApiError::NotFound(code, msg) => ApiError::to_error_response(code, &msg, vec![]),
            ApiError::Conflict(code, msg, details) => {
                ApiError::to_error_response(code, &msg, details)
            }
            ApiError::Internal(msg) => ApiError::to_error_response("INTERNAL", &msg, vec![]),
        };
        (status, body).into_response()
    }
}

/// Failures of the booking and document workflows.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("room not found")]
    RoomNotFound,
    #[error("patient not found")]
    PatientNotFound,
    #[error("booking not found")]
    BookingNotFound,
    #[error("document not found")]
    DocumentNotFound,
    #[error("a document named '{0}' already exists")]
    DocumentExists(String),
    #[error("booking conflict: {}", format_slots(.0))]
    BookingConflict(Vec<BookingSlot>),
    #[error("{0}")]
    Validation(String),
    #[error("file storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        let message = e.to_string();
        match e {
            ServiceError::RoomNotFound => ApiError::NotFound("ROOM_NOT_FOUND", message),
            ServiceError::PatientNotFound => ApiError::NotFound("PATIENT_NOT_FOUND", message),
            ServiceError::BookingNotFound => ApiError::NotFound("BOOKING_NOT_FOUND", message),
            ServiceError::DocumentNotFound => ApiError::NotFound("DOCUMENT_NOT_FOUND", message),
            ServiceError::DocumentExists(_) => {
                ApiError::Conflict("DOCUMENT_ALREADY_EXISTS", message, vec![])
            }
            ServiceError::BookingConflict(slots) => ApiError::Conflict(
                "BOOKING_CONFLICT",
                message,
                slots.iter().map(ToString::to_string).collect(),
            ),
            ServiceError::Validation(_) => ApiError::BadRequest("VALIDATION_ERROR", message),
            // storage failures are logged where they happen
            ServiceError::Storage(_) => ApiError::Internal("file storage error".into()),
            ServiceError::Database(_) => {
                tracing::error!(error = %message, "request failed");
                ApiError::Internal("internal error".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn status_of(e: ServiceError) -> StatusCode {
        ApiError::from(e).status()
    }

    #[test]
    fn service_errors_map_to_http_status() {
        assert_eq!(status_of(ServiceError::RoomNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_of(ServiceError::PatientNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_of(ServiceError::DocumentNotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(ServiceError::DocumentExists("a.pdf".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ServiceError::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ServiceError::Storage(StorageError::InvalidPath("x".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn conflict_lists_offending_slots() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let err: ApiError = ServiceError::BookingConflict(vec![BookingSlot::new(day, 9)]).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        match err {
            ApiError::Conflict(code, msg, details) => {
                assert_eq!(code, "BOOKING_CONFLICT");
                assert!(msg.contains("2025-01-10 09"));
                assert_eq!(details, vec!["2025-01-10 09".to_string()]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn internal_errors_hide_detail() {
        let err: ApiError =
            ServiceError::Storage(StorageError::InvalidPath("/etc/passwd".into())).into();
        match err {
            ApiError::Internal(msg) => assert!(!msg.contains("passwd")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
