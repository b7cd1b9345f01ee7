#![allow(dead_code)]
use fieldmap::config::{ClientConfig, Config};
use fieldmap::domain::entities::{CallbackRequest, UserIdentity};
use fieldmap::domain::errors::SignInFailure;
use fieldmap::domain::ports::{
    CapturedState, Clock, ExpectedStateSource, IdentityProvider, ManualClock, StateSourceKind,
};
use fieldmap::infrastructure::providers::HttpIdentityProvider;
use fieldmap::services::{
    AuthFlowService, PendingAuthRegistry, SessionAuthContext, StateTokenCodec, TokenExchangeClient,
};
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const START: i64 = 1_700_000_000;
pub const MAX_AGE: i64 = 300;
pub const REDIRECT_URI: &str = "https://fieldmap.example.com/oauth2callback";
pub const AUTHORIZATION_ENDPOINT: &str = "https://accounts.example.com/o/oauth2/auth";

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(START))
}

/// Client registration pointing the token and userinfo endpoints at `server`.
pub fn client_config(server: &MockServer) -> ClientConfig {
    let mut client = ClientConfig::new("fieldmap-client", "fieldmap-secret", REDIRECT_URI);
    client.authorization_endpoint = AUTHORIZATION_ENDPOINT.to_string();
    client.token_endpoint = format!("{}/token", server.uri());
    client.userinfo_endpoint = format!("{}/userinfo", server.uri());
    client
}

pub fn codec(clock: Arc<ManualClock>) -> StateTokenCodec {
    StateTokenCodec::new(TEST_SECRET, MAX_AGE, clock)
}

pub fn build_flow(server: &MockServer, clock: Arc<ManualClock>) -> AuthFlowService {
    let http_client = reqwest::Client::new();
    let identity = Arc::new(HttpIdentityProvider::new(
        http_client.clone(),
        format!("{}/userinfo", server.uri()),
    )) as Arc<dyn IdentityProvider>;

    AuthFlowService::new(
        client_config(server),
        codec(clock.clone()),
        TokenExchangeClient::new(http_client, clock.clone() as Arc<dyn Clock>),
        identity,
        clock,
    )
}

pub fn new_context(clock: Arc<ManualClock>) -> SessionAuthContext {
    SessionAuthContext::new(PendingAuthRegistry::new(MAX_AGE, clock))
}

/// Value of one query parameter of `url`.
pub fn query_param(url: &str, name: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

pub fn state_param(url: &str) -> String {
    query_param(url, "state").unwrap_or_default()
}

/// Token endpoint answering the authorization-code grant for `code`.
pub async fn mount_code_exchange(server: &MockServer, code: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains(format!("code={}", code).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "token_type": "Bearer",
            "expires_in": 3600,
            "scope": "openid email"
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Token endpoint that must never be called.
pub async fn mount_no_token_calls(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(server)
        .await;
}

pub async fn mount_userinfo(server: &MockServer, access_token: &str, email: &str) {
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("authorization", format!("Bearer {}", access_token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "1234567890",
            "email": email,
            "name": "Field Tester"
        })))
        .mount(server)
        .await;
}

/// Deployment config with every endpoint on `server`.
pub fn app_config(server: &MockServer, extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("GOOGLE_CLIENT_ID".into(), "fieldmap-client".into());
    vars.insert("GOOGLE_CLIENT_SECRET".into(), "fieldmap-secret".into());
    vars.insert("OAUTH_REDIRECT_URI".into(), REDIRECT_URI.into());
    vars.insert(
        "OAUTH_AUTHORIZATION_ENDPOINT".into(),
        AUTHORIZATION_ENDPOINT.into(),
    );
    vars.insert("OAUTH_TOKEN_ENDPOINT".into(), format!("{}/token", server.uri()));
    vars.insert(
        "OAUTH_USERINFO_ENDPOINT".into(),
        format!("{}/userinfo", server.uri()),
    );
    vars.insert("OAUTH_STATE_SECRET".into(), TEST_SECRET.into());
    vars.insert("SECURE_COOKIES".into(), "false".into());
    for (key, value) in extra {
        vars.insert(key.to_string(), value.to_string());
    }

    match Config::from_lookup(|key| vars.get(key).cloned()) {
        Ok(config) => config,
        Err(e) => panic!("test config should be valid: {e}"),
    }
}

/// Expected state as the session registry holds it right now.
pub fn registry_source(context: &SessionAuthContext) -> CapturedState {
    CapturedState::new(
        StateSourceKind::SessionRegistry,
        context.pending().map(|p| p.expected_state()),
    )
}

pub fn cookie_source(value: &str) -> CapturedState {
    CapturedState::new(StateSourceKind::RequestCorrelation, Some(value.to_string()))
}

/// Full round-trip: begin, then call back with the issued state in both the
/// cookie and the session registry.
pub async fn sign_in(
    flow: &AuthFlowService,
    context: &mut SessionAuthContext,
    code: &str,
) -> Result<UserIdentity, SignInFailure> {
    let url = match flow.begin_sign_in(context) {
        Ok(url) => url,
        Err(e) => panic!("begin_sign_in failed: {e}"),
    };
    let state = state_param(&url);

    let cookie = cookie_source(&state);
    let registry = registry_source(context);
    let sources: [&dyn ExpectedStateSource; 2] = [&cookie, &registry];

    let request = CallbackRequest::success(code, state.as_str());
    let result = flow.handle_callback(context, &request, &sources).await;
    result
}
