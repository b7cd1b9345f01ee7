use reqwest::Url;

use crate::config::{ClientConfig, ConfigError};
use crate::domain::entities::PendingAuthorization;
use crate::services::pending_auth_registry::PendingAuthRegistry;
use crate::services::state_token_codec::StateTokenCodec;

/// Query keys owned by the builder; extra parameters may not override them.
const RESERVED_PARAMS: [&str; 5] = ["client_id", "redirect_uri", "response_type", "scope", "state"];

/// Produces the provider URL for one sign-in attempt.
#[derive(Clone)]
pub struct AuthorizationRequestBuilder {
    codec: StateTokenCodec,
}

impl AuthorizationRequestBuilder {
    pub fn new(codec: StateTokenCodec) -> Self {
        Self { codec }
    }

    /// Return the authorization URL for this session.
    ///
    /// While an attempt is pending, its URL comes back unchanged, so repeated
    /// clicks or retries never replace the state the browser already carries.
    pub fn build(
        &self,
        client: &ClientConfig,
        registry: &mut PendingAuthRegistry,
    ) -> Result<String, ConfigError> {
        if let Some(pending) = registry.get() {
            tracing::debug!(
                state = %pending.state_token.log_prefix(),
                "Reusing in-flight authorization URL"
            );
            return Ok(pending.authorization_url.clone());
        }
        registry.prune_expired();

        client.validate()?;

        let token = self.codec.issue()?;
        let state = token.encode();

        let mut url = Url::parse(&client.authorization_endpoint).map_err(|e| {
            ConfigError::InvalidUrl {
                field: "authorization_endpoint",
                reason: e.to_string(),
            }
        })?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &client.client_id)
                .append_pair("redirect_uri", &client.redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("scope", &client.scope_param())
                .append_pair("state", &state);
            for (key, value) in &client.extra_authorization_params {
                if RESERVED_PARAMS.contains(&key.as_str()) {
                    tracing::warn!(param = %key, "Ignoring extra authorization parameter");
                    continue;
                }
                query.append_pair(key, value);
            }
        }
        let authorization_url = url.to_string();

        tracing::info!(
            state = %token.log_prefix(),
            "Issued new authorization request"
        );

        let issued_at = token.issued_at;
        registry.set(PendingAuthorization::new(
            token,
            authorization_url.clone(),
            issued_at,
        ));

        Ok(authorization_url)
    }

    pub fn codec(&self) -> &StateTokenCodec {
        &self.codec
    }
}
