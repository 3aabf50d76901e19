// src/routes/booking_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_extra::extract::Query;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    booking::{BookingSlot, BookingView, DayAvailability},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState},
    services::booking_service::{self, CreateBookings},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/Bookings/Get", get(list_bookings))
        .route("/Bookings/GetFree", get(get_free))
        .route("/Bookings/Create", post(create_bookings))
        .route(
            "/Bookings/{booking_id}",
            get(get_booking).put(edit_booking).delete(delete_booking),
        )
}

/* =========================
   Queries
========================= */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBookingsQuery {
    pub date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

pub async fn list_bookings(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<ListBookingsQuery>,
) -> Result<Json<ApiOk<Vec<BookingView>>>, ApiError> {
    let bookings =
        booking_service::list_bookings(state.bookings.as_ref(), auth.user_id, q.date, q.end_date)
            .await?;
    Ok(Json(ApiOk::new(bookings)))
}

/// `?roomId=..&dates[]=2025-01-10&dates[]=2025-01-11`; plain `dates` works too.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeHoursQuery {
    pub room_id: Uuid,
    #[serde(default, rename = "dates[]", alias = "dates")]
    pub dates: Vec<NaiveDate>,
}

pub async fn get_free(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<FreeHoursQuery>,
) -> Result<Json<ApiOk<Vec<DayAvailability>>>, ApiError> {
    let free = booking_service::free_hours(state.bookings.as_ref(), q.room_id, &q.dates).await?;
    Ok(Json(ApiOk::new(free)))
}

pub async fn get_booking(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<ApiOk<BookingView>>, ApiError> {
    let booking =
        booking_service::get_booking(state.bookings.as_ref(), auth.user_id, booking_id).await?;
    Ok(Json(ApiOk::new(booking)))
}

/* =========================
   Mutations
========================= */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingsRequest {
    pub room_id: Uuid,
    pub patient_id: Uuid,
    pub bookings: Vec<BookingSlot>,
}

pub async fn create_bookings(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateBookingsRequest>,
) -> Result<Json<ApiOk<Vec<BookingView>>>, ApiError> {
    let created = booking_service::create_bookings(
        state.bookings.as_ref(),
        auth.user_id,
        CreateBookings {
            room_id: req.room_id,
            patient_id: req.patient_id,
            slots: req.bookings,
        },
    )
    .await?;
    Ok(Json(ApiOk::new(created)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditBookingRequest {
    pub patient_id: Uuid,
    pub room_id: Uuid,
}

pub async fn edit_booking(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<EditBookingRequest>,
) -> Result<Json<ApiOk<BookingView>>, ApiError> {
    let booking = booking_service::edit_booking(
        state.bookings.as_ref(),
        auth.user_id,
        booking_id,
        req.room_id,
        req.patient_id,
    )
    .await?;
    Ok(Json(ApiOk::new(booking)))
}

pub async fn delete_booking(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(booking_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    booking_service::delete_booking(state.bookings.as_ref(), auth.user_id, booking_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
