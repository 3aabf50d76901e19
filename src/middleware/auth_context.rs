use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use uuid::Uuid;

use crate::auth::hash_refresh_token;
use crate::error::ApiError;
use crate::models::{AppState, Role};

/// The acting user, resolved from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
    pub token_id: Uuid,
}

impl AuthContext {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "FORBIDDEN",
                "Only admins can do this".into(),
            ))
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TokenLookupRow {
    token_id: Uuid,
    user_id: Uuid,
    role: Role,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|_| ApiError::session_expired())?;

            let token_hash = hash_refresh_token(authz.token());

            let row: TokenLookupRow = sqlx::query_as::<_, TokenLookupRow>(
                r#"
                SELECT t.token_id, t.user_id, u.role
                FROM refresh_token t
                JOIN app_user u ON u.user_id = t.user_id
                WHERE t.token_hash = $1
                  AND t.revoked_at IS NULL
                  AND t.expires_at > now()
                  AND u.is_active = true
                "#,
            )
            .bind(&token_hash)
            .fetch_optional(&state.db)
            .await
            .map_err(ApiError::db)?
            .ok_or_else(ApiError::session_expired)?;

            // best-effort
            if let Err(e) = sqlx::query(
                r#"
                UPDATE refresh_token
                SET last_seen_at = now()
                WHERE token_id = $1
                "#,
            )
            .bind(row.token_id)
            .execute(&state.db)
            .await
            {
                tracing::warn!(error = %e, "could not touch refresh token");
            }

            Ok(AuthContext {
                user_id: row.user_id,
                role: row.role,
                token_id: row.token_id,
            })
        }
    }
}
