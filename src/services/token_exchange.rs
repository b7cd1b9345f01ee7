use serde::Deserialize;
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::domain::entities::TokenSet;
use crate::domain::errors::{ExchangeError, RefreshError};
use crate::domain::ports::Clock;
use crate::services::callback_verifier::VerifiedCode;

/// Longest provider error description kept in an error value.
const MAX_DESCRIPTION_CHARS: usize = 240;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<serde_json::Value>,
    scope: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

/// Client for the provider token endpoint.
///
/// Neither grant is retried: a spent code stays spent, and a revoked refresh
/// token stays revoked.
#[derive(Clone)]
pub struct TokenExchangeClient {
    http_client: reqwest::Client,
    clock: Arc<dyn Clock>,
}

impl TokenExchangeClient {
    pub fn new(http_client: reqwest::Client, clock: Arc<dyn Clock>) -> Self {
        Self { http_client, clock }
    }

    /// Authorization-code grant.
    pub async fn exchange(
        &self,
        verified: &VerifiedCode,
        client: &ClientConfig,
    ) -> Result<TokenSet, ExchangeError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", verified.code()),
            ("redirect_uri", client.redirect_uri.as_str()),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
        ];

        tracing::debug!(endpoint = %client.token_endpoint, "Exchanging authorization code");
        let tokens = self.post_form(&client.token_endpoint, &form).await?;
        tracing::info!(
            expires_at = ?tokens.expires_at,
            has_refresh_token = tokens.has_refresh_token(),
            "Authorization code exchanged"
        );

        Ok(tokens)
    }

    /// Refresh-token grant. A response without a new refresh token keeps the
    /// old one.
    pub async fn refresh(
        &self,
        current: &TokenSet,
        client: &ClientConfig,
    ) -> Result<TokenSet, RefreshError> {
        let refresh_token = current
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(RefreshError::NoRefreshToken)?;

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
        ];

        tracing::debug!(endpoint = %client.token_endpoint, "Refreshing access token");
        let mut tokens = self.post_form(&client.token_endpoint, &form).await?;
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = current.refresh_token.clone();
        }
        if tokens.scope.is_none() {
            tokens.scope = current.scope.clone();
        }

        Ok(tokens)
    }

    async fn post_form(
        &self,
        endpoint: &str,
        form: &[(&str, &str)],
    ) -> Result<TokenSet, ExchangeError> {
        let response = self
            .http_client
            .post(endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| ExchangeError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExchangeError::Network(e.to_string()))?;

        if !status.is_success() {
            let details: TokenErrorResponse = serde_json::from_str(&body).unwrap_or_default();
            let error = ExchangeError::Rejected {
                status: status.as_u16(),
                error: details.error.unwrap_or_else(|| "unknown_error".to_string()),
                description: details
                    .error_description
                    .map(|d| d.chars().take(MAX_DESCRIPTION_CHARS).collect()),
            };
            tracing::warn!(status = status.as_u16(), error = %error, "Token endpoint rejected request");
            return Err(error);
        }

        self.parse_token_response(&body)
    }

    fn parse_token_response(&self, body: &str) -> Result<TokenSet, ExchangeError> {
        let parsed: TokenResponse = serde_json::from_str(body)
            .map_err(|e| ExchangeError::MalformedResponse(e.to_string()))?;

        let access_token = parsed
            .access_token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ExchangeError::MalformedResponse("missing access_token".to_string()))?;

        let refresh_token = parsed
            .refresh_token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let now = self.clock.now_unix();
        let expires_at = parsed
            .expires_in
            .as_ref()
            .and_then(parse_seconds)
            .filter(|seconds| *seconds > 0)
            .map(|seconds| now.saturating_add(seconds));

        Ok(TokenSet {
            access_token,
            refresh_token,
            token_type: parsed.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_at,
            scope: parsed.scope,
        })
    }
}

// Some providers send expires_in as a string
fn parse_seconds(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
