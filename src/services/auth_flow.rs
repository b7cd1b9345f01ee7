use async_trait::async_trait;
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::domain::entities::{CallbackRequest, TokenSet, UserIdentity};
use crate::domain::errors::{BeginSignInError, SignInFailure, Unauthenticated};
use crate::domain::ports::{
    AccessTokenProvider, Clock, ExpectedStateSource, IdentityProvider, StateSourceKind, TokenSink,
};
use crate::infrastructure::persistence::SessionStore;
use crate::services::authorization_request::AuthorizationRequestBuilder;
use crate::services::callback_verifier::CallbackVerifier;
use crate::services::session_auth_context::{AuthPhase, SessionAuthContext, VerifiedSignIn};
use crate::services::state_token_codec::StateTokenCodec;
use crate::services::token_exchange::TokenExchangeClient;

/// Runs the sign-in flow against one session context at a time.
///
/// Callers hold the session's lock for the whole call, so a callback and a
/// repeated login click of the same browser never interleave.
pub struct AuthFlowService {
    client: ClientConfig,
    builder: AuthorizationRequestBuilder,
    verifier: CallbackVerifier,
    exchange: TokenExchangeClient,
    identity: Arc<dyn IdentityProvider>,
    token_sink: Option<Arc<dyn TokenSink>>,
    clock: Arc<dyn Clock>,
    refresh_margin: i64,
    trust_signed_state: bool,
}

impl AuthFlowService {
    pub fn new(
        client: ClientConfig,
        codec: StateTokenCodec,
        exchange: TokenExchangeClient,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            builder: AuthorizationRequestBuilder::new(codec.clone()),
            verifier: CallbackVerifier::new(codec),
            exchange,
            identity,
            token_sink: None,
            clock,
            refresh_margin: crate::config::DEFAULT_REFRESH_MARGIN_SECONDS,
            trust_signed_state: false,
        }
    }

    pub fn with_token_sink(mut self, sink: Arc<dyn TokenSink>) -> Self {
        self.token_sink = Some(sink);
        self
    }

    pub fn with_refresh_margin(mut self, seconds: i64) -> Self {
        self.refresh_margin = seconds.max(0);
        self
    }

    /// Accept the returned state itself as a last-resort expected state,
    /// relying on its signature alone.
    pub fn with_trusted_signed_state(mut self, enabled: bool) -> Self {
        self.trust_signed_state = enabled;
        self
    }

    pub fn client(&self) -> &ClientConfig {
        &self.client
    }

    pub fn codec(&self) -> &StateTokenCodec {
        self.builder.codec()
    }

    pub fn trusts_signed_state(&self) -> bool {
        self.trust_signed_state
    }

    pub fn now(&self) -> i64 {
        self.clock.now_unix()
    }

    /// Expected-state locations consulted on callback, in priority order.
    pub fn enabled_sources(&self) -> Vec<StateSourceKind> {
        let mut sources = vec![
            StateSourceKind::RequestCorrelation,
            StateSourceKind::SessionRegistry,
        ];
        if self.trust_signed_state {
            sources.push(StateSourceKind::TransportEmbedded);
        }
        sources
    }

    pub fn begin_sign_in(
        &self,
        context: &mut SessionAuthContext,
    ) -> Result<String, BeginSignInError> {
        context.begin_sign_in(&self.builder, &self.client)
    }

    /// Verify the callback, exchange the code, look up the user, and store
    /// the result. Any failure leaves the session signed out (or untouched
    /// when it was already signed in).
    pub async fn handle_callback(
        &self,
        context: &mut SessionAuthContext,
        request: &CallbackRequest,
        sources: &[&dyn ExpectedStateSource],
    ) -> Result<UserIdentity, SignInFailure> {
        let verified = match self.verifier.verify(request, sources) {
            Ok(verified) => verified,
            Err(reason) => return Err(self.fail(context, reason.into())),
        };

        if context.phase() == AuthPhase::Authenticated {
            return Err(self.fail(context, SignInFailure::AlreadyAuthenticated));
        }

        let tokens = match self.exchange.exchange(&verified, &self.client).await {
            Ok(tokens) => tokens,
            Err(e) => return Err(self.fail(context, e.into())),
        };

        let identity = match self.identity.fetch_identity(&tokens.access_token).await {
            Ok(identity) => identity,
            Err(e) => return Err(self.fail(context, e.into())),
        };

        let signed_in = VerifiedSignIn::new(&verified, tokens, identity);
        if let Some(sink) = self.token_sink.as_ref() {
            persist_best_effort(sink.as_ref(), signed_in.identity(), signed_in.tokens()).await;
        }

        let identity = signed_in.identity().clone();
        if let Err(e) = context.complete_sign_in(signed_in) {
            tracing::warn!(error = %e, "Session changed while completing sign-in");
            return Err(self.fail(context, SignInFailure::AlreadyAuthenticated));
        }

        metrics::counter!("oauth_sign_in_completed_total").increment(1);
        Ok(identity)
    }

    /// Current access token, refreshed first when it is inside the margin.
    /// A failed refresh signs the session out.
    pub async fn access_token(
        &self,
        context: &mut SessionAuthContext,
    ) -> Result<String, Unauthenticated> {
        if context.phase() != AuthPhase::Authenticated {
            return Err(Unauthenticated);
        }
        let current = context.token_set().cloned().ok_or(Unauthenticated)?;

        if !current.needs_refresh(self.clock.now_unix(), self.refresh_margin) {
            return Ok(current.access_token);
        }

        match self.exchange.refresh(&current, &self.client).await {
            Ok(renewed) => {
                metrics::counter!("oauth_token_refresh_total", "outcome" => "success").increment(1);
                tracing::info!(expires_at = ?renewed.expires_at, "Access token refreshed");

                if let (Some(sink), Some(identity)) =
                    (self.token_sink.as_ref(), context.user_identity())
                {
                    persist_best_effort(sink.as_ref(), identity, &renewed).await;
                }

                let access_token = renewed.access_token.clone();
                context.replace_tokens(renewed)?;
                Ok(access_token)
            }
            Err(e) => {
                metrics::counter!("oauth_token_refresh_total", "outcome" => "failure").increment(1);
                context.refresh_failed(&e);
                Err(Unauthenticated)
            }
        }
    }

    pub fn sign_out(&self, context: &mut SessionAuthContext) {
        context.sign_out();
    }

    fn fail(&self, context: &mut SessionAuthContext, failure: SignInFailure) -> SignInFailure {
        // Rejections were already logged by the verifier
        if !matches!(failure, SignInFailure::Rejected(_)) {
            tracing::warn!(reason = failure.as_str(), error = %failure, "Sign-in failed");
        }
        context.fail_sign_in(&failure);
        failure
    }
}

async fn persist_best_effort(sink: &dyn TokenSink, identity: &UserIdentity, tokens: &TokenSet) {
    if let Err(e) = sink.persist(identity, tokens).await {
        tracing::warn!(error = %e, "Failed to store token copy");
    }
}

/// Hands bearer tokens to the photo-storage collaborator, keyed by session.
#[derive(Clone)]
pub struct SessionTokenProvider {
    flow: Arc<AuthFlowService>,
    sessions: SessionStore,
}

impl SessionTokenProvider {
    pub fn new(flow: Arc<AuthFlowService>, sessions: SessionStore) -> Self {
        Self { flow, sessions }
    }
}

#[async_trait]
impl AccessTokenProvider for SessionTokenProvider {
    async fn get_current_access_token(&self, session_id: &str) -> Result<String, Unauthenticated> {
        let context = self.sessions.get(session_id).await.ok_or(Unauthenticated)?;
        let mut context = context.lock().await;
        self.flow.access_token(&mut context).await
    }
}
