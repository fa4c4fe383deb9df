use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::errors::{ErrorKind, PriceError};

/// Error body returned by every price endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub message: String,
    pub error_code: &'static str,
    pub timestamp: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error_code: &'static str,
    message: String,
    retry_after_secs: Option<u64>,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error_code: "NOT_FOUND",
            message: message.into(),
            retry_after_secs: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error_code: ErrorKind::InvalidInput.code(),
            message: message.into(),
            retry_after_secs: None,
        }
    }

    /// Adds a `Retry-After` header, rounded up to whole seconds (at least 1)
    pub fn with_retry_after(mut self, wait: std::time::Duration) -> Self {
        let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
        self.retry_after_secs = Some(secs.max(1));
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<PriceError> for ApiError {
    fn from(e: PriceError) -> Self {
        let kind = e.kind();
        let (status, message) = match kind {
            ErrorKind::InvalidInput => (StatusCode::BAD_REQUEST, e.to_string()),
            ErrorKind::RateLimited => (StatusCode::TOO_MANY_REQUESTS, e.to_string()),
            ErrorKind::Upstream => {
                match e.upstream_status() {
                    Some(code) => log::warn!("Exchange responded with HTTP {}: {}", code, e),
                    None => log::warn!("Exchange unavailable: {}", e),
                }
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            ErrorKind::Internal => {
                log::error!("Unexpected error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred. Please try again later.".to_string(),
                )
            }
        };

        Self {
            status,
            error_code: kind.code(),
            message,
            retry_after_secs: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorResponse {
            message: self.message,
            error_code: self.error_code,
            timestamp: chrono::Utc::now().to_rfc3339(),
        });

        let mut response = (self.status, body).into_response();
        if let Some(secs) = self.retry_after_secs {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
