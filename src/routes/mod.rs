use crate::models::AppState;
use axum::Router;

pub mod auth_routes;
pub mod booking_routes;
pub mod document_routes;
pub mod health_routes;
pub mod patient_routes;
pub mod room_routes;
pub mod user_routes;

pub fn router(state: AppState) -> Router {
    let max_upload_bytes = state.max_upload_bytes;
    Router::new()
        .merge(auth_routes::router())
        .merge(booking_routes::router())
        .merge(document_routes::router(max_upload_bytes))
        .merge(patient_routes::router())
        .merge(room_routes::router())
        .merge(user_routes::router())
        .merge(health_routes::router())
        .with_state(state)
}
