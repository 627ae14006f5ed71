//! Authentication contract: the provider trait, the per-request identity,
//! and the per-route policy.
//!
//! Exactly one [`AuthProvider`] exists per process (possibly the no-op
//! variant) and is shared read-only across all requests. The middleware in
//! the runtime crate consults it per the route's [`AuthPolicy`] and attaches
//! the resulting [`AuthContext`] to the request — downstream code never
//! observes an *absent* identity, only the anonymous one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// AuthPolicy
// ─────────────────────────────────────────────────────────────────────────────

/// Per-route rule controlling whether authentication is enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthPolicy {
    /// A valid token is mandatory; without one the proxy is never reached.
    Required,
    /// A missing token degrades to the anonymous identity. A token that *is*
    /// presented must still verify — an invalid one is rejected, not
    /// downgraded.
    #[default]
    Optional,
    /// The provider is never consulted; the anonymous identity is attached.
    None,
}

// ─────────────────────────────────────────────────────────────────────────────
// AuthContext
// ─────────────────────────────────────────────────────────────────────────────

/// Identity resolved for one request.
///
/// Created per request, attached to the request's extensions, and discarded
/// when the request ends. Never shared across requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Stable subject identifier (`sub` claim), or `"anonymous"`.
    pub user_id: String,
    /// Email claim, when the issuer provides one.
    pub email: Option<String>,
    /// Roles granted to the subject. Anonymous requests carry `["public"]`.
    pub roles: Vec<String>,
    /// Raw bearer token the identity was derived from, when there was one.
    pub token: Option<String>,
}

impl AuthContext {
    /// The identity attached to unauthenticated requests.
    pub fn anonymous() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            email: None,
            roles: vec!["public".to_string()],
            token: None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id == "anonymous"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AuthError
// ─────────────────────────────────────────────────────────────────────────────

/// Per-request authentication failure.
///
/// Always recovered: the middleware converts these into a 401 response (or a
/// downgrade to anonymous, per policy) — never a crash. The full message is
/// logged server-side; callers see a generic summary.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The route requires a token and none was presented.
    #[error("authorization token missing")]
    MissingToken,

    /// Verification failed: bad signature, wrong issuer or audience,
    /// expired, or malformed claims.
    #[error("token rejected: {0}")]
    InvalidToken(String),

    /// The identity service could not be reached to verify the token.
    #[error("identity provider unavailable: {0}")]
    ProviderUnavailable(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// AuthProvider trait
// ─────────────────────────────────────────────────────────────────────────────

/// Contract for a single-sign-on backend.
///
/// Implementations must be `Send + Sync`: one instance is constructed at
/// startup and shared across every request task without further
/// synchronization. Constructors validate their required configuration
/// fields — a missing field is a fatal construction error, never a
/// per-request one.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Stable identifier for this provider (used in logs).
    fn name(&self) -> &'static str;

    /// Where a browser should be sent to obtain a token. Surfaced as a
    /// login hint in 401 responses.
    fn login_url(&self) -> String;

    /// Verify `token` and resolve the identity it carries.
    async fn authenticate(&self, token: &str) -> Result<AuthContext, AuthError>;
}

// =============================================================================
// Tests
// =============================================================================
