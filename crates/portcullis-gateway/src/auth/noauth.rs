//! The no-op provider used when SSO is disabled or declared `none`.

use async_trait::async_trait;

use portcullis_kernel::{AuthContext, AuthError, AuthProvider};

/// Provider that never fails: every request resolves to the anonymous
/// identity, whatever the token says.
#[derive(Debug, Default)]
pub struct NoAuthProvider;

#[async_trait]
impl AuthProvider for NoAuthProvider {
    fn name(&self) -> &'static str {
        "none"
    }

    fn login_url(&self) -> String {
        "/login".to_string()
    }

    async fn authenticate(&self, token: &str) -> Result<AuthContext, AuthError> {
        let mut context = AuthContext::anonymous();
        if !token.is_empty() {
            context.token = Some(token.to_string());
        }
        Ok(context)
    }
}
