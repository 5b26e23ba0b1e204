use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Insufficient stock for {sku}: requested {requested}, available {available}")]
    InsufficientStock {
        sku: String,
        requested: i64,
        available: i64,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limited, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Carrier unavailable: {0}")]
    CarrierUnavailable(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("Decryption failed: ciphertext authentication error")]
    DecryptionAuthFailed,

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a field-scoped validation failure.
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Machine-readable code surfaced in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "VALIDATION",
            Error::NotFound(_) => "NOT_FOUND",
            Error::AlreadyExists(_) => "ALREADY_EXISTS",
            Error::InvalidState(_) => "INVALID_STATE",
            Error::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            Error::Unauthorized(_) => "UNAUTHORIZED",
            Error::Forbidden(_) => "FORBIDDEN",
            Error::RateLimited { .. } => "RATE_LIMITED",
            Error::CarrierUnavailable(_) => "CARRIER_UNAVAILABLE",
            Error::Encryption(_) => "ENCRYPTION_FAILED",
            Error::Decryption(_) => "DECRYPTION_FAILED",
            Error::DecryptionAuthFailed => "DECRYPTION_AUTH_FAILED",
            Error::Configuration(_) => "CONFIGURATION",
            _ => "INTERNAL",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Error::NotFound(_) => 404,
            Error::AlreadyExists(_) | Error::InvalidState(_) => 409,
            Error::InsufficientStock { .. } => 409,
            Error::Unauthorized(_) => 401,
            Error::Forbidden(_) | Error::RateLimited { .. } => 403,
            Error::Validation { .. } => 400,
            Error::CarrierUnavailable(_) => 503,
            _ => 500,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Internal failure details stay in the logs, never in the body
        let body = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            crate::types::ApiResponse::<()>::error(self.code(), "internal error")
        } else {
            crate::types::ApiResponse::<()>::error(self.code(), self.to_string())
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_http_mapping() {
        assert_eq!(Error::NotFound("x".into()).status_code(), 404);
        assert_eq!(Error::validation("quantity", "must be positive").status_code(), 400);
        assert_eq!(Error::Unauthorized("missing signature".into()).status_code(), 401);
        assert_eq!(Error::Forbidden("inactive".into()).status_code(), 403);
        assert_eq!(Error::RateLimited { retry_after_secs: 30 }.status_code(), 403);
        assert_eq!(Error::InvalidState("already completed".into()).status_code(), 409);
        assert_eq!(Error::DecryptionAuthFailed.status_code(), 500);
        assert_eq!(Error::CarrierUnavailable("fedex".into()).status_code(), 503);
    }

    #[test]
    fn insufficient_stock_carries_quantities() {
        let err = Error::InsufficientStock {
            sku: "SKU-001".into(),
            requested: 5,
            available: 2,
        };
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");
        assert!(err.to_string().contains("requested 5"));
    }
}
