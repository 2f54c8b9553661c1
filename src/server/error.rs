// SPDX-License-Identifier: GPL-3.0-only

//! JSON error responses of the proxy service

use super::supabase::BackendFailure;
use crate::errors::AppError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Message returned when the hosted backend is not configured
pub const MISSING_ENV_MESSAGE: &str =
    "Supabase server env is missing (SUPABASE_URL, SUPABASE_SERVICE_ROLE_KEY)";

/// Handler error, rendered as `{status: "error", message, detail?}`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ServerError {
    pub status: StatusCode,
    pub message: String,
    pub detail: Option<String>,
}

impl ServerError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            detail: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Backend not configured
    pub fn missing_env() -> Self {
        Self::internal(MISSING_ENV_MESSAGE)
    }

    /// Backend call failed; its raw body becomes the detail
    pub fn backend(message: impl Into<String>, failure: BackendFailure) -> Self {
        Self {
            detail: Some(failure.detail),
            ..Self::internal(message)
        }
    }
}

impl From<BackendFailure> for ServerError {
    fn from(failure: BackendFailure) -> Self {
        Self::internal(failure.detail)
    }
}

impl From<ServerError> for AppError {
    fn from(err: ServerError) -> Self {
        AppError::Other(err.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let body = match self.detail {
            Some(detail) => json!({
                "status": "error",
                "message": self.message,
                "detail": detail,
            }),
            None => json!({ "status": "error", "message": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
