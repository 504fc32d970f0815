use axum::{http::StatusCode, response::IntoResponse};

use super::error_responses::error_response;

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK").into_response()
}

pub async fn not_found() -> impl IntoResponse {
    error_response(StatusCode::NOT_FOUND, "NOT_FOUND")
}
