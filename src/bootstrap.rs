use crate::config::Config;
use crate::domain::ports::{Clock, IdentityProvider, SystemClock, TokenSink};
use crate::infrastructure::http::middleware::{AppState, HttpSettings};
use crate::infrastructure::http::router::RESERVED_ROUTES;
use crate::infrastructure::persistence::SessionStore;
use crate::infrastructure::providers::HttpIdentityProvider;
use crate::infrastructure::storage::LocalTokenSink;
use crate::services::{AuthFlowService, StateTokenCodec, TokenExchangeClient};
use std::sync::Arc;
use std::time::Duration;

const HTTP_TIMEOUT_SECONDS: u64 = 30;

pub async fn build_app_state(config: &Config) -> Result<AppState, Box<dyn std::error::Error>> {
    build_app_state_with_clock(config, Arc::new(SystemClock)).await
}

pub async fn build_app_state_with_clock(
    config: &Config,
    clock: Arc<dyn Clock>,
) -> Result<AppState, Box<dyn std::error::Error>> {
    config.client.validate()?;

    let callback_path = config.client.redirect_path()?;
    if RESERVED_ROUTES.contains(&callback_path.as_str()) {
        return Err(format!(
            "redirect_uri path {} collides with a built-in route",
            callback_path
        )
        .into());
    }

    let redirect_warnings = config.redirect_uri_warnings();
    for warning in &redirect_warnings {
        tracing::warn!("{}", warning);
    }

    // Shared HTTP client for the token and userinfo endpoints
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECONDS))
        .build()?;

    let codec = StateTokenCodec::from_config(
        config.state_signing_secret.as_deref(),
        config.environment,
        config.state_max_age_seconds,
        clock.clone(),
    );

    let identity = Arc::new(HttpIdentityProvider::new(
        http_client.clone(),
        config.client.userinfo_endpoint.clone(),
    )) as Arc<dyn IdentityProvider>;

    let exchange = TokenExchangeClient::new(http_client, clock.clone());

    let mut flow = AuthFlowService::new(
        config.client.clone(),
        codec,
        exchange,
        identity,
        clock.clone(),
    )
    .with_refresh_margin(config.refresh_margin_seconds)
    .with_trusted_signed_state(config.trust_signed_state);

    for warning in config.security_warnings() {
        tracing::warn!(security = true, "{}", warning);
    }

    if let Some(dir) = &config.token_store_dir {
        tokio::fs::create_dir_all(dir).await?;
        flow = flow.with_token_sink(Arc::new(LocalTokenSink::new(dir)) as Arc<dyn TokenSink>);
        tracing::info!("Token copies will be written under {}", dir);
    }

    let sessions = SessionStore::new(config.state_max_age_seconds, clock)
        .with_idle_timeout(config.session_idle_timeout_seconds);

    tracing::info!(
        callback_path = %callback_path,
        sources = ?flow.enabled_sources(),
        "OAuth sign-in flow initialized"
    );

    Ok(AppState {
        flow: Arc::new(flow),
        sessions,
        settings: Arc::new(HttpSettings {
            secure_cookies: config.secure_cookies,
            state_max_age: config.state_max_age_seconds,
            diagnostics_enabled: !config.environment.is_production(),
            callback_path,
            redirect_warnings,
        }),
    })
}
