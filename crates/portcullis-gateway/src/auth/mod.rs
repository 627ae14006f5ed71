//! SSO provider implementations and the per-route authentication gate.
//!
//! | Kind | Implementation |
//! |------|----------------|
//! | `none` (or SSO disabled) | [`NoAuthProvider`] |
//! | `azure` | [`AzureProvider`] |
//! | `google` | [`GoogleProvider`] |
//! | `okta` | [`OktaProvider`] |
//!
//! The OIDC-backed providers share one verification capability,
//! [`OidcVerifier`], which owns JWKS fetching/caching and JWT validation —
//! provider code only knows its issuer, audience, and claim conventions.

mod azure;
mod google;
mod middleware;
mod noauth;
mod oidc;
mod okta;

pub use azure::AzureProvider;
pub use google::GoogleProvider;
pub use middleware::{AuthGate, context_for, enforce_policy};
pub use noauth::NoAuthProvider;
pub use oidc::{OidcClaims, OidcVerifier};
pub use okta::OktaProvider;

use std::sync::Arc;

use portcullis_kernel::{AuthProvider, ConfigError, SsoConfig, SsoKind};

/// Select a provider for the validated SSO block.
///
/// A disabled block or the explicit `none` kind resolves to
/// [`NoAuthProvider`] — never a silently skipped middleware. Unknown kind
/// strings cannot reach this function: [`SsoKind`] is a closed enum and
/// rejects them at parse time.
pub fn provider_for(sso: &SsoConfig) -> Result<Arc<dyn AuthProvider>, ConfigError> {
    if !sso.enabled {
        return Ok(Arc::new(NoAuthProvider));
    }
    match sso.kind {
        SsoKind::None => Ok(Arc::new(NoAuthProvider)),
        SsoKind::Azure => Ok(Arc::new(AzureProvider::new(sso)?)),
        SsoKind::Google => Ok(Arc::new(GoogleProvider::new(sso)?)),
        SsoKind::Okta => Ok(Arc::new(OktaProvider::new(sso)?)),
    }
}
