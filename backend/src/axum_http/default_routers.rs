use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

pub async fn not_found() -> impl IntoResponse {
    debug!("backend router: not_found handler invoked");
    (StatusCode::NOT_FOUND, "NOT_FOUND").into_response()
}

pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthBody {
            status: "ok",
            service: "checkout-backend",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
        .into_response()
}
