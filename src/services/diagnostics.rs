use serde::Serialize;

use crate::domain::entities::log_prefix;
use crate::domain::ports::StateSourceKind;
use crate::services::auth_flow::AuthFlowService;
use crate::services::session_auth_context::{AuthPhase, SessionAuthContext};

/// Redacted view of one session's sign-in state for operators.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsSnapshot {
    pub phase: AuthPhase,
    pub pending_authorization: bool,
    pub pending_age_seconds: Option<i64>,
    pub pending_state_prefix: Option<String>,
    pub state_cookie_present: bool,
    pub enabled_sources: Vec<StateSourceKind>,
    pub has_access_token: bool,
    pub seconds_until_expiry: Option<i64>,
    pub has_refresh_token: bool,
    pub user: Option<String>,
    pub config: ConfigSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub client_id: String,
    pub client_secret_set: bool,
    pub redirect_uri: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub scopes: Vec<String>,
    pub state_max_age_seconds: i64,
    pub signing_key_configured: bool,
    pub warnings: Vec<String>,
}

impl DiagnosticsSnapshot {
    pub fn capture(
        context: &SessionAuthContext,
        flow: &AuthFlowService,
        state_cookie_present: bool,
        warnings: Vec<String>,
    ) -> Self {
        let now = flow.now();
        let pending = context.pending();
        let tokens = context.token_set();
        let client = flow.client();

        Self {
            phase: context.phase(),
            pending_authorization: pending.is_some(),
            pending_age_seconds: pending.map(|p| p.age(now)),
            pending_state_prefix: pending.map(|p| p.state_token.log_prefix()),
            state_cookie_present,
            enabled_sources: flow.enabled_sources(),
            has_access_token: tokens.is_some(),
            seconds_until_expiry: tokens.and_then(|t| t.seconds_until_expiry(now)),
            has_refresh_token: tokens.is_some_and(|t| t.has_refresh_token()),
            user: context
                .user_identity()
                .and_then(|i| i.display_id())
                .map(str::to_string),
            config: ConfigSummary {
                client_id: log_prefix(&client.client_id),
                client_secret_set: !client.client_secret.is_empty(),
                redirect_uri: client.redirect_uri.clone(),
                authorization_endpoint: client.authorization_endpoint.clone(),
                token_endpoint: client.token_endpoint.clone(),
                scopes: client.scopes.clone(),
                state_max_age_seconds: flow.codec().max_age(),
                signing_key_configured: flow.codec().has_key(),
                warnings,
            },
        }
    }
}
