//! Gateway error types.
//!
//! Two families with opposite exposure rules: [`StartupError`] aborts the
//! process before anything is served and prints full detail;
//! [`ApiError`] is returned to HTTP callers and is deliberately generic —
//! the cause is logged server-side before the variant is built.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use portcullis_kernel::ConfigError;

// ─────────────────────────────────────────────────────────────────────────────
// StartupError
// ─────────────────────────────────────────────────────────────────────────────

/// Fatal construction-time failure — nothing was served.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A telemetry provider failed to initialise. The gateway never starts
    /// partially instrumented.
    #[error("telemetry init failed ({name}): {message}")]
    ProviderInit { name: &'static str, message: String },

    #[error("failed to build upstream client: {0}")]
    Client(String),

    #[error("failed to bind listener: {0}")]
    Bind(std::io::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// ApiError
// ─────────────────────────────────────────────────────────────────────────────

/// Request-time errors surfaced to HTTP callers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication failed under the route's policy.
    #[error("unauthorized: {message}")]
    Unauthorized { message: String, login_url: String },

    /// The upstream could not be reached or the exchange failed. Upstream
    /// addresses and failure detail never appear in the response.
    #[error("upstream unavailable")]
    BadGateway,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized { message, login_url } => (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": {
                        "code": "UNAUTHORIZED",
                        "message": message,
                        "login_url": login_url,
                    }
                })),
            )
                .into_response(),
            ApiError::BadGateway => (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "error": {
                        "code": "BAD_GATEWAY",
                        "message": "upstream service unavailable",
                    }
                })),
            )
                .into_response(),
        }
    }
}
