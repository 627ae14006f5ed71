//! Construction-time error types for `portcullis-kernel`.
//!
//! [`ConfigError`] covers every failure mode that can be detected *before*
//! the listener opens — unreadable files, malformed YAML, missing required
//! fields, broken route tables. Runtime failures (unreachable upstreams,
//! rejected tokens) belong to the gateway runtime crate.

use thiserror::Error;

/// Configuration / construction error.
///
/// These always abort startup and carry full diagnostic detail — nothing in
/// them is ever sent to an HTTP caller, so there is no exposure risk.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    // ── Loading ──────────────────────────────────────────────────────────────
    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration could not be parsed, or an environment override
    /// carried an unparseable value. Unknown provider kinds land here too:
    /// the kind fields are closed enums, so an unrecognised string is a
    /// parse failure, never a silently substituted variant.
    #[error("failed to parse config: {0}")]
    Parse(String),

    // ── Server ───────────────────────────────────────────────────────────────
    /// `server.port` was never set, by file or environment.
    #[error("server.port must be set")]
    MissingPort,

    // ── Routes ───────────────────────────────────────────────────────────────
    /// A route was declared without a path.
    #[error("each route must have a path")]
    EmptyRoutePath,

    /// A route path is syntactically unusable.
    #[error("route path '{0}' is invalid: {1}")]
    InvalidRoutePath(String, String),

    /// Two routes share the same path.
    #[error("route '{0}' is declared more than once")]
    DuplicateRoute(String),

    /// A route collides with a path the gateway serves itself.
    #[error("route path '{0}' is reserved by the gateway")]
    ReservedRoutePath(String),

    /// A route was declared without an upstream.
    #[error("route '{0}' must have an upstream")]
    MissingUpstream(String),

    /// A route's upstream is not a usable http(s) URL.
    #[error("route '{0}' has an invalid upstream URL: {1}")]
    InvalidUpstream(String, String),

    // ── SSO ──────────────────────────────────────────────────────────────────
    /// The enabled SSO kind requires a field that was not provided.
    #[error("sso config is missing required field: {0}")]
    MissingSsoField(&'static str),

    /// An SSO field was provided but is unusable.
    #[error("sso config field {0} is invalid: {1}")]
    InvalidSsoField(&'static str, String),

    // ── Telemetry ────────────────────────────────────────────────────────────
    /// An enabled telemetry provider requires a field that was not provided.
    #[error("telemetry provider '{name}' is missing required field: {field}")]
    MissingTelemetryField {
        name: &'static str,
        field: &'static str,
    },

    /// A diagnostic path must be rooted to register as a route.
    #[error("telemetry promPath '{0}' must start with '/'")]
    InvalidPromPath(String),
}
