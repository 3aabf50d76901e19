use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::{Duration, Utc};

use crate::{
    auth::{generate_refresh_token, hash_refresh_token, verify_password},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::*,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/auth/logout", post(logout))
        // Rotate the token of the current session and push its expiry out
        .route("/auth/refresh", post(refresh))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiOk<LoginResponseData>>, ApiError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "email and password are required".into(),
        ));
    }

    // 1) Load user
    let user: UserRow = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT user_id, email, first_name, last_name, password_hash, role, is_active
        FROM app_user
        WHERE email = $1
        "#,
    )
    .bind(&email)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::invalid_credentials)?;

    // 2) Verify password before revealing anything about the account
    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::invalid_credentials());
    }

    if !user.is_active {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Account is disabled".into(),
        ));
    }

    // 3) Issue refresh token
    let token = generate_refresh_token();
    let token_hash = hash_refresh_token(&token);
    let expires_at = Utc::now() + Duration::hours(state.token_ttl_hours);

    let row: TokenRow = sqlx::query_as::<_, TokenRow>(
        r#"
        INSERT INTO refresh_token
            (user_id, token_hash, device_name, expires_at)
        VALUES
            ($1, $2, $3, $4)
        RETURNING token_id, expires_at
        "#,
    )
    .bind(user.user_id)
    .bind(&token_hash)
    .bind(req.device_name.as_deref())
    .bind(expires_at)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    tracing::info!(user_id = %user.user_id, token_id = %row.token_id, "login");

    Ok(Json(ApiOk::new(LoginResponseData {
        access_token: token,
        expires_at: row.expires_at,
        user: user.profile(),
    })))
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<MeResponseData>>, ApiError> {
    let user: UserRow = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT user_id, email, first_name, last_name, password_hash, role, is_active
        FROM app_user
        WHERE user_id = $1
        "#,
    )
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::session_expired)?;

    let token: TokenRow = sqlx::query_as::<_, TokenRow>(
        r#"
        SELECT token_id, expires_at
        FROM refresh_token
        WHERE token_id = $1
          AND user_id = $2
          AND revoked_at IS NULL
          AND expires_at > now()
        "#,
    )
    .bind(auth.token_id)
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::session_expired)?;

    Ok(Json(ApiOk::new(MeResponseData {
        user: user.profile(),
        token: TokenInfo {
            token_id: token.token_id,
            expires_at: token.expires_at,
        },
    })))
}

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let rows = sqlx::query(
        r#"
        UPDATE refresh_token
        SET revoked_at = now()
        WHERE token_id = $1
          AND user_id = $2
          AND revoked_at IS NULL
        "#,
    )
    .bind(auth.token_id)
    .bind(auth.user_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if rows.rows_affected() == 0 {
        return Err(ApiError::session_expired());
    }

    Ok(Json(ApiOk::new(OkData { ok: true })))
}

/// POST /auth/refresh
/// Swaps the token of the current session for a new one; the old one stops
/// working immediately.
pub async fn refresh(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<RefreshData>>, ApiError> {
    let new_token = generate_refresh_token();
    let new_hash = hash_refresh_token(&new_token);
    let expires_at = Utc::now() + Duration::hours(state.token_ttl_hours);

    let row: TokenRow = sqlx::query_as::<_, TokenRow>(
        r#"
        UPDATE refresh_token
        SET token_hash = $1,
            expires_at = $2,
            last_seen_at = now()
        WHERE token_id = $3
          AND user_id = $4
          AND revoked_at IS NULL
          AND expires_at > now()
        RETURNING token_id, expires_at
        "#,
    )
    .bind(new_hash)
    .bind(expires_at)
    .bind(auth.token_id)
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::session_expired)?;

    Ok(Json(ApiOk::new(RefreshData {
        access_token: new_token,
        expires_at: row.expires_at,
    })))
}
