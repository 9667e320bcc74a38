use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use crates::domain::value_objects::checkout::CheckoutRequest;
use serde::Serialize;
use thiserror::Error;

use crate::usecases::{checkout::CheckoutError, payment_callback::CallbackError};

const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl From<CallbackError> for AppError {
    fn from(value: CallbackError) -> Self {
        match value {
            CallbackError::MissingReference => AppError::BadRequest(value.to_string()),
            CallbackError::NotFound => AppError::NotFound(value.to_string()),
            CallbackError::Internal(err) => AppError::Internal(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string()),
        };

        let body = Json(ErrorResponse {
            code: status.as_u16(),
            message,
        });

        (status, body).into_response()
    }
}

/// Error body for checkout submissions. Field and gateway errors echo the submitted form
/// so the client can re-render it.
#[derive(Debug, Serialize)]
pub struct CheckoutErrorResponse {
    pub code: &'static str,
    pub message: String,
    pub field: Option<&'static str>,
    pub input: Option<CheckoutRequest>,
}

#[derive(Debug)]
pub struct CheckoutFailure {
    pub error: CheckoutError,
    pub input: CheckoutRequest,
}

impl IntoResponse for CheckoutFailure {
    fn into_response(self) -> Response {
        let status = self.error.status_code();

        let body = match &self.error {
            CheckoutError::Internal(_) => CheckoutErrorResponse {
                code: self.error.code(),
                message: INTERNAL_MESSAGE.to_string(),
                field: None,
                input: None,
            },
            CheckoutError::CheckoutInProgress => CheckoutErrorResponse {
                code: self.error.code(),
                message: self.error.to_string(),
                field: None,
                input: None,
            },
            _ => CheckoutErrorResponse {
                code: self.error.code(),
                message: self.error.to_string(),
                field: self.error.field(),
                input: Some(self.input),
            },
        };

        (status, Json(body)).into_response()
    }
}
