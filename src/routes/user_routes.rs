// src/routes/user_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::hash_password,
    db::is_unique_violation,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, Role},
};

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserPublicRow {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub role: Role,
    pub is_active: Option<bool>, // default true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{user_id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
}

fn user_not_found() -> ApiError {
    ApiError::NotFound("USER_NOT_FOUND", "user not found".into())
}

pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<UserPublicRow>>>, ApiError> {
    auth.require_admin()?;

    let users: Vec<UserPublicRow> = sqlx::query_as::<_, UserPublicRow>(
        r#"
        SELECT user_id, email, first_name, last_name, role, is_active, created_at
        FROM app_user
        ORDER BY last_name, first_name
        "#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk::new(users)))
}

pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiOk<UserPublicRow>>, ApiError> {
    auth.require_admin()?;

    let user: UserPublicRow = sqlx::query_as::<_, UserPublicRow>(
        r#"
        SELECT user_id, email, first_name, last_name, role, is_active, created_at
        FROM app_user
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(user_not_found)?;

    Ok(Json(ApiOk::new(user)))
}

fn validate_email(email: &str) -> Result<String, ApiError> {
    let e = email.trim().to_lowercase();
    let valid = match e.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid || e.chars().any(char::is_whitespace) {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "email is not valid".into(),
        ));
    }
    Ok(e)
}

fn validate_name(field: &str, value: &str) -> Result<String, ApiError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            format!("{field} is required"),
        ));
    }
    Ok(v.to_string())
}

fn validate_password(pw: &str) -> Result<(), ApiError> {
    let p = pw.trim();
    if p.len() < 8 {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "password must be at least 8 characters".into(),
        ));
    }
    Ok(())
}

pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiOk<UserPublicRow>>), ApiError> {
    auth.require_admin()?;

    let email = validate_email(&req.email)?;
    let first_name = validate_name("firstName", &req.first_name)?;
    let last_name = validate_name("lastName", &req.last_name)?;
    validate_password(&req.password)?;
    let is_active = req.is_active.unwrap_or(true);

    let pw_hash = hash_password(req.password.trim()).map_err(ApiError::Internal)?;

    let user: UserPublicRow = sqlx::query_as::<_, UserPublicRow>(
        r#"
        INSERT INTO app_user (email, first_name, last_name, password_hash, role, is_active)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING user_id, email, first_name, last_name, role, is_active, created_at
        "#,
    )
    .bind(&email)
    .bind(&first_name)
    .bind(&last_name)
    .bind(&pw_hash)
    .bind(req.role)
    .bind(is_active)
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Conflict("EMAIL_TAKEN", "email is already in use".into(), vec![])
        } else {
            ApiError::db(e)
        }
    })?;

    tracing::info!(user_id = %user.user_id, role = user.role.as_str(), "user created");
    Ok((StatusCode::CREATED, Json(ApiOk::new(user))))
}

pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<ApiOk<UserPublicRow>>, ApiError> {
    auth.require_admin()?;

    let existing: UserPublicRow = sqlx::query_as::<_, UserPublicRow>(
        r#"
        SELECT user_id, email, first_name, last_name, role, is_active, created_at
        FROM app_user
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(user_not_found)?;

    let first_name = match req.first_name.as_deref() {
        Some(s) => validate_name("firstName", s)?,
        None => existing.first_name,
    };
    let last_name = match req.last_name.as_deref() {
        Some(s) => validate_name("lastName", s)?,
        None => existing.last_name,
    };
    let role = req.role.unwrap_or(existing.role);
    let is_active = req.is_active.unwrap_or(existing.is_active);

    if user_id == auth.user_id && (role != Role::Admin || !is_active) {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "admins cannot demote or disable themselves".into(),
        ));
    }

    let updated: UserPublicRow = sqlx::query_as::<_, UserPublicRow>(
        r#"
        UPDATE app_user
        SET first_name = $1,
            last_name = $2,
            role = $3,
            is_active = $4
        WHERE user_id = $5
        RETURNING user_id, email, first_name, last_name, role, is_active, created_at
        "#,
    )
    .bind(&first_name)
    .bind(&last_name)
    .bind(role)
    .bind(is_active)
    .bind(user_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    if !is_active {
        // a disabled account keeps no live tokens
        sqlx::query(
            r#"
            UPDATE refresh_token
            SET revoked_at = now()
            WHERE user_id = $1
              AND revoked_at IS NULL
            "#,
        )
        .bind(user_id)
        .execute(&state.db)
        .await
        .map_err(ApiError::db)?;
    }

    Ok(Json(ApiOk::new(updated)))
}

/// Patients and documents of the user lose their owner; bookings and tokens
/// are removed.
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    auth.require_admin()?;
    if user_id == auth.user_id {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "admins cannot delete themselves".into(),
        ));
    }

    let res = sqlx::query(
        r#"
        DELETE FROM app_user
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(user_not_found());
    }

    tracing::info!(user_id = %user_id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email(" Anna@Clinic.org ").unwrap(), "anna@clinic.org");
        assert!(validate_email("anna").is_err());
        assert!(validate_email("@clinic.org").is_err());
        assert!(validate_email("anna@clinic").is_err());
        assert!(validate_email("an na@clinic.org").is_err());
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("firstName", " Anna ").unwrap(), "Anna");
        assert!(validate_name("firstName", "").is_err());
        assert!(validate_name("firstName", "  ").is_err()); // Only whitespace
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("password123").is_ok());
        assert!(validate_password("short").is_err()); // Too short
        assert!(validate_password("").is_err());
    }

    #[test]
    fn test_role_wire_format() {
        let req: CreateUserRequest = serde_json::from_str(
            r#"{"email":"a@b.co","firstName":"A","lastName":"B","password":"password1","role":"admin"}"#,
        )
        .unwrap();
        assert_eq!(req.role, Role::Admin);
        assert!(serde_json::from_str::<Role>(r#""doctor""#).is_err());
    }
}
