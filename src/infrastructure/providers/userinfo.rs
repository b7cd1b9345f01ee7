use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::entities::UserIdentity;
use crate::domain::errors::IdentityError;
use crate::domain::ports::IdentityProvider;

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    email: Option<String>,
    // OIDC userinfo uses `sub`, Google's v2 endpoint uses `id`
    sub: Option<String>,
    id: Option<String>,
    name: Option<String>,
}

/// Identity lookup against the provider's userinfo endpoint.
#[derive(Clone)]
pub struct HttpIdentityProvider {
    http_client: reqwest::Client,
    userinfo_endpoint: String,
}

impl HttpIdentityProvider {
    pub fn new(http_client: reqwest::Client, userinfo_endpoint: impl Into<String>) -> Self {
        Self {
            http_client,
            userinfo_endpoint: userinfo_endpoint.into(),
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn fetch_identity(&self, access_token: &str) -> Result<UserIdentity, IdentityError> {
        let response = self
            .http_client
            .get(&self.userinfo_endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| IdentityError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Userinfo request failed");
            return Err(IdentityError::Status(status.as_u16()));
        }

        let info: UserInfoResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::MalformedResponse(e.to_string()))?;

        let identity = UserIdentity {
            email: info.email.filter(|e| !e.is_empty()),
            subject: info.sub.or(info.id).filter(|s| !s.is_empty()),
            name: info.name.filter(|n| !n.is_empty()),
        };

        if identity.display_id().is_none() {
            return Err(IdentityError::MissingIdentity);
        }

        Ok(identity)
    }
}
