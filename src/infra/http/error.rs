use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::{AppError, ErrorReport};

#[derive(Debug, Serialize)]
pub struct JsonErrorBody {
    pub error: String,
}

/// `{"error": "..."}` response used by the internal listener.
#[derive(Debug)]
pub struct JsonError {
    status: StatusCode,
    message: String,
    report: ErrorReport,
}

impl JsonError {
    pub fn new(source: &'static str, status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status,
            report: ErrorReport::from_message(source, status, message.clone()),
            message,
        }
    }

    pub fn not_found(source: &'static str, message: &'static str) -> Self {
        Self::new(source, StatusCode::NOT_FOUND, message)
    }

    /// Client errors keep their detail; server errors are reduced to a
    /// generic message with the chain kept in the report.
    pub fn from_app(source: &'static str, err: AppError) -> Self {
        let status = err.status_code();
        let message = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            err.to_string()
        };
        Self {
            status,
            message,
            report: ErrorReport::from_error(source, status, &err),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for JsonError {
    fn into_response(self) -> Response {
        let body = JsonErrorBody {
            error: self.message,
        };
        let mut response = (self.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}
