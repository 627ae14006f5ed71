//! Azure AD (Entra ID) SSO provider.

use async_trait::async_trait;

use portcullis_kernel::{AuthContext, AuthError, AuthProvider, ConfigError, SsoConfig};

use super::oidc::OidcVerifier;

/// Verifies Azure AD v2.0 ID tokens for the configured tenant.
pub struct AzureProvider {
    verifier: OidcVerifier,
}

impl AzureProvider {
    /// Required fields: `clientId`, `tenantId`. The issuer defaults to the
    /// tenant's v2.0 endpoint when `issuerUrl` is not given.
    pub fn new(sso: &SsoConfig) -> Result<Self, ConfigError> {
        if sso.client_id.trim().is_empty() {
            return Err(ConfigError::MissingSsoField("clientId"));
        }
        if sso.tenant_id.trim().is_empty() {
            return Err(ConfigError::MissingSsoField("tenantId"));
        }

        let issuer = if sso.issuer_url.trim().is_empty() {
            format!("https://login.microsoftonline.com/{}/v2.0", sso.tenant_id)
        } else {
            sso.issuer_url.clone()
        };
        let jwks_url = format!(
            "https://login.microsoftonline.com/{}/discovery/v2.0/keys",
            sso.tenant_id
        );

        Ok(Self {
            verifier: OidcVerifier::new(issuer, sso.client_id.clone(), jwks_url),
        })
    }
}

#[async_trait]
impl AuthProvider for AzureProvider {
    fn name(&self) -> &'static str {
        "azure"
    }

    fn login_url(&self) -> String {
        "https://login.microsoftonline.com/".to_string()
    }

    async fn authenticate(&self, token: &str) -> Result<AuthContext, AuthError> {
        let claims = self.verifier.verify(token).await?;
        Ok(claims.into_context("azure-user", token))
    }
}
