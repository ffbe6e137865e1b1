use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Uniform response wrapper returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub data: Option<T>,
    pub message: String,
}

pub fn envelope<T: Serialize>(
    status: StatusCode,
    data: Option<T>,
    message: impl Into<String>,
) -> (StatusCode, Json<ApiResponse<T>>) {
    (
        status,
        Json(ApiResponse {
            code: status.as_u16(),
            data,
            message: message.into(),
        }),
    )
}

pub fn ok<T: Serialize>(data: T, message: impl Into<String>) -> (StatusCode, Json<ApiResponse<T>>) {
    envelope(StatusCode::OK, Some(data), message)
}

/// 200 with `data: null`.
pub fn ok_empty(message: impl Into<String>) -> (StatusCode, Json<ApiResponse<()>>) {
    envelope(StatusCode::OK, None, message)
}

pub fn created<T: Serialize>(
    data: T,
    message: impl Into<String>,
) -> (StatusCode, Json<ApiResponse<T>>) {
    envelope(StatusCode::CREATED, Some(data), message)
}
