use crate::providers::ProviderKind;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use std::{fmt, time::Duration};
use thiserror::Error;

/// Failures produced by the migration core.
///
/// Every variant keeps enough detail (provider name, underlying message) for
/// the caller to render a diagnostic. Nothing here is retried internally.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("{provider} unavailable: {message}")]
    ProviderUnavailable {
        provider: ProviderKind,
        message: String,
    },
    #[error("{provider} did not respond within {}s", after.as_secs_f64())]
    Timeout {
        provider: ProviderKind,
        after: Duration,
    },
    #[error("{provider} call cancelled before completion")]
    Cancelled { provider: ProviderKind },
    #[error("{provider} object `{id}` not found")]
    NotFound { provider: ProviderKind, id: String },
}

pub type MigrationResult<T> = Result<T, MigrationError>;

impl MigrationError {
    pub fn unavailable(provider: ProviderKind, message: impl fmt::Display) -> Self {
        Self::ProviderUnavailable {
            provider,
            message: message.to_string(),
        }
    }

    /// Coarse classification surfaced to callers. Timeouts and cancellations
    /// are reported as provider unavailability.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Configuration(_) => FailureKind::ConfigurationError,
            Self::Validation(_) => FailureKind::ValidationError,
            Self::ProviderUnavailable { .. } | Self::Timeout { .. } | Self::Cancelled { .. } => {
                FailureKind::ProviderUnavailable
            }
            Self::NotFound { .. } => FailureKind::NotFound,
        }
    }
}

/// Serializable failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    ConfigurationError,
    ValidationError,
    ProviderUnavailable,
    NotFound,
}

impl FailureKind {
    /// Caller mistakes are client errors; everything else is a server error.
    pub fn status_code(self) -> StatusCode {
        match self {
            Self::ValidationError => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// HTTP-facing error: a short summary plus the underlying detail.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub detail: String,
}

impl AppError {
    pub fn new(status: StatusCode, msg: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            detail: detail.into(),
        }
    }

    /// Wrap a core failure under a caller-chosen summary line.
    pub fn from_migration(summary: impl Into<String>, err: MigrationError) -> Self {
        Self::new(err.kind().status_code(), summary, err.to_string())
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.message, self.detail)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "detail": self.detail,
        }));

        (self.status, body).into_response()
    }
}
