mod helpers;

use fieldmap::config::ConfigError;
use fieldmap::domain::errors::BeginSignInError;
use fieldmap::services::{AuthPhase, AuthorizationRequestBuilder, PendingAuthRegistry};
use helpers::*;
use std::collections::HashSet;
use tokio_test::assert_ok;
use wiremock::MockServer;

#[tokio::test]
async fn test_build_is_idempotent_until_cleared() {
    let server = MockServer::start().await;
    let clock = manual_clock();
    let builder = AuthorizationRequestBuilder::new(codec(clock.clone()));
    let client = client_config(&server);
    let mut registry = PendingAuthRegistry::new(MAX_AGE, clock.clone());

    let first = assert_ok!(builder.build(&client, &mut registry));
    clock.advance(5);
    let second = assert_ok!(builder.build(&client, &mut registry));
    assert_eq!(first, second);

    let mut seen = HashSet::new();
    seen.insert(state_param(&first));
    for _ in 0..5 {
        registry.clear();
        let url = assert_ok!(builder.build(&client, &mut registry));
        assert!(seen.insert(state_param(&url)), "state value was reused");
    }
}

#[tokio::test]
async fn test_expired_pending_request_is_replaced() {
    let server = MockServer::start().await;
    let clock = manual_clock();
    let builder = AuthorizationRequestBuilder::new(codec(clock.clone()));
    let client = client_config(&server);
    let mut registry = PendingAuthRegistry::new(MAX_AGE, clock.clone());

    let first = builder.build(&client, &mut registry).unwrap();
    clock.advance(MAX_AGE + 1);
    let second = builder.build(&client, &mut registry).unwrap();

    assert_ne!(state_param(&first), state_param(&second));
}

#[tokio::test]
async fn test_authorization_url_carries_client_parameters() {
    let server = MockServer::start().await;
    let clock = manual_clock();
    let flow = build_flow(&server, clock.clone());
    let mut context = new_context(clock);

    let url = flow.begin_sign_in(&mut context).unwrap();

    assert_eq!(query_param(&url, "client_id").as_deref(), Some("fieldmap-client"));
    assert_eq!(query_param(&url, "redirect_uri").as_deref(), Some(REDIRECT_URI));
    assert_eq!(query_param(&url, "response_type").as_deref(), Some("code"));
    assert_eq!(query_param(&url, "prompt").as_deref(), Some("consent"));
    assert!(query_param(&url, "scope").unwrap().contains("drive.file"));
    assert!(!url.contains("fieldmap-secret"));
}

#[tokio::test]
async fn test_invalid_client_config_blocks_sign_in() {
    let server = MockServer::start().await;
    let clock = manual_clock();
    let builder = AuthorizationRequestBuilder::new(codec(clock.clone()));
    let mut context = new_context(clock);

    let mut client = client_config(&server);
    client.client_id = "<your-client-id>".to_string();

    let result = context.begin_sign_in(&builder, &client);
    assert!(matches!(
        result,
        Err(BeginSignInError::Configuration(ConfigError::Placeholder("client_id")))
    ));
    assert_eq!(context.phase(), AuthPhase::Unauthenticated);
    assert!(context.pending().is_none());
}
