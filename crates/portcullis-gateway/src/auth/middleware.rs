//! Per-route authentication gate.
//!
//! Applied to each proxied route with that route's policy. Whatever the
//! policy, the downstream handler always finds an [`AuthContext`] in the
//! request extensions — unauthenticated requests carry the anonymous value,
//! never nothing.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use portcullis_kernel::{AuthContext, AuthError, AuthPolicy, AuthProvider};

use crate::error::ApiError;

/// State carried by the middleware for one route.
#[derive(Clone)]
pub struct AuthGate {
    pub provider: Arc<dyn AuthProvider>,
    pub policy: AuthPolicy,
}

/// Read the identity attached to a request, defaulting to anonymous.
///
/// Handlers use this instead of unwrapping the extension, so a missing
/// context can never fail a request.
pub fn context_for(request: &Request) -> AuthContext {
    request
        .extensions()
        .get::<AuthContext>()
        .cloned()
        .unwrap_or_else(AuthContext::anonymous)
}

/// Middleware enforcing the route's [`AuthPolicy`].
///
/// Rejections short-circuit with a 401 carrying the provider's login hint;
/// everything else proceeds downstream with the resolved identity attached.
pub async fn enforce_policy(
    State(gate): State<AuthGate>,
    mut request: Request,
    next: Next,
) -> Response {
    let context = match resolve(&gate, request.headers()).await {
        Ok(context) => context,
        Err(err) => {
            warn!(
                provider = gate.provider.name(),
                policy = ?gate.policy,
                path = %request.uri().path(),
                error = %err,
                "request rejected"
            );
            return ApiError::Unauthorized {
                message: safe_message(&err),
                login_url: gate.provider.login_url(),
            }
            .into_response();
        }
    };

    request.extensions_mut().insert(context);
    next.run(request).await
}

async fn resolve(gate: &AuthGate, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
    if gate.policy == AuthPolicy::None {
        return Ok(AuthContext::anonymous());
    }
    match bearer_token(headers)? {
        // A presented token must verify under either remaining policy; an
        // invalid one is rejected, not downgraded to anonymous.
        Some(token) => gate.provider.authenticate(token).await,
        None => match gate.policy {
            AuthPolicy::Required => Err(AuthError::MissingToken),
            _ => Ok(AuthContext::anonymous()),
        },
    }
}

/// Extract the bearer token from the `Authorization` header.
///
/// `Ok(None)` when the header is absent; an error when it is present but is
/// not a bearer credential.
fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AuthError::InvalidToken("authorization header is not valid UTF-8".to_string()))?;
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(Some(token.trim()))
        }
        _ => Err(AuthError::InvalidToken(
            "authorization header is not a bearer token".to_string(),
        )),
    }
}

/// Caller-safe summary; the full error stays in the server log.
fn safe_message(err: &AuthError) -> String {
    match err {
        AuthError::MissingToken => "missing bearer token".to_string(),
        AuthError::InvalidToken(_) => "invalid or expired token".to_string(),
        AuthError::ProviderUnavailable(_) => "authentication temporarily unavailable".to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================
