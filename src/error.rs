/// Unified error types for the toolhub marketplace
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the marketplace
#[derive(Error, Debug)]
pub enum MarketError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Bad credentials, missing or expired bearer token
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Ownership or role mismatch
    #[error("Not authorized: {0}")]
    Forbidden(String),

    /// Missing or invalid fields, out-of-range values, oversized content
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing tool, comment, media or user
    #[error("Not found: {0}")]
    NotFound(String),

    /// Already rated, voted, reported or registered
    #[error("Duplicate action: {0}")]
    DuplicateAction(String),

    /// Every slug suffix up to the attempt bound is taken
    #[error("Could not generate a unique slug for '{0}'")]
    SlugGenerationExhausted(String),

    /// Cache, media storage or identity provider failure
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<validator::ValidationErrors> for MarketError {
    fn from(errors: validator::ValidationErrors) -> Self {
        MarketError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert MarketError to HTTP response
impl IntoResponse for MarketError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            MarketError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
            ),
            MarketError::Forbidden(_) => (StatusCode::FORBIDDEN, "Forbidden", self.to_string()),
            MarketError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
            ),
            MarketError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound", self.to_string()),
            MarketError::DuplicateAction(_) => (
                StatusCode::CONFLICT,
                "DuplicateAction",
                self.to_string(),
            ),
            MarketError::SlugGenerationExhausted(_) => (
                StatusCode::CONFLICT,
                "SlugGenerationExhausted",
                self.to_string(),
            ),
            MarketError::UpstreamUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "UpstreamUnavailable",
                self.to_string(),
            ),
            MarketError::RateLimitExceeded { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RateLimitExceeded",
                "Rate limit exceeded".to_string(),
            ),
            MarketError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalServerError",
                    "Internal server error".to_string(), // Don't leak details
                )
            }
            MarketError::Internal(ref e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalServerError",
                    "Internal server error".to_string(),
                )
            }
            MarketError::Io(ref e) => {
                tracing::error!("IO error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalServerError",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for marketplace operations
pub type MarketResult<T> = Result<T, MarketError>;
