// src/routes/room_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::is_unique_violation,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/{room_id}", get(get_room).patch(rename_room).delete(delete_room))
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RoomRow {
    pub room_id: Uuid,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RoomNameRequest {
    pub name: String,
}

fn validate_room_name(name: &str) -> Result<String, ApiError> {
    let n = name.trim();
    if n.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "name is required".into(),
        ));
    }
    if n.chars().count() > 64 {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "name is too long (max 64)".into(),
        ));
    }
    Ok(n.to_string())
}

fn room_exists(name: &str) -> ApiError {
    ApiError::Conflict(
        "ROOM_ALREADY_EXISTS",
        format!("a room named '{name}' already exists"),
        vec![],
    )
}

fn room_not_found() -> ApiError {
    ApiError::NotFound("ROOM_NOT_FOUND", "room not found".into())
}

pub async fn list_rooms(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<RoomRow>>>, ApiError> {
    let rooms: Vec<RoomRow> = sqlx::query_as::<_, RoomRow>(
        r#"
        SELECT room_id, name, created_at
        FROM room
        ORDER BY name
        "#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk::new(rooms)))
}

pub async fn get_room(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(room_id): Path<Uuid>,
) -> Result<Json<ApiOk<RoomRow>>, ApiError> {
    let room: RoomRow = sqlx::query_as::<_, RoomRow>(
        r#"
        SELECT room_id, name, created_at
        FROM room
        WHERE room_id = $1
        "#,
    )
    .bind(room_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(room_not_found)?;

    Ok(Json(ApiOk::new(room)))
}

pub async fn create_room(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<RoomNameRequest>,
) -> Result<(StatusCode, Json<ApiOk<RoomRow>>), ApiError> {
    auth.require_admin()?;
    let name = validate_room_name(&req.name)?;

    let room: RoomRow = sqlx::query_as::<_, RoomRow>(
        r#"
        INSERT INTO room (name)
        VALUES ($1)
        RETURNING room_id, name, created_at
        "#,
    )
    .bind(&name)
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            room_exists(&name)
        } else {
            ApiError::db(e)
        }
    })?;

    tracing::info!(room_id = %room.room_id, "room created");
    Ok((StatusCode::CREATED, Json(ApiOk::new(room))))
}

pub async fn rename_room(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(room_id): Path<Uuid>,
    Json(req): Json<RoomNameRequest>,
) -> Result<Json<ApiOk<RoomRow>>, ApiError> {
    auth.require_admin()?;
    let name = validate_room_name(&req.name)?;

    let room: RoomRow = sqlx::query_as::<_, RoomRow>(
        r#"
        UPDATE room
        SET name = $1
        WHERE room_id = $2
        RETURNING room_id, name, created_at
        "#,
    )
    .bind(&name)
    .bind(room_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            room_exists(&name)
        } else {
            ApiError::db(e)
        }
    })?
    .ok_or_else(room_not_found)?;

    Ok(Json(ApiOk::new(room)))
}

/// Bookings of the room go with it.
pub async fn delete_room(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(room_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    auth.require_admin()?;

    let res = sqlx::query(
        r#"
        DELETE FROM room
        WHERE room_id = $1
        "#,
    )
    .bind(room_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(room_not_found());
    }

    tracing::info!(room_id = %room_id, "room deleted");
    Ok(StatusCode::NO_CONTENT)
}
