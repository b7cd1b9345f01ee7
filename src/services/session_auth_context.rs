use serde::Serialize;
use thiserror::Error;

use crate::config::ClientConfig;
use crate::domain::entities::{PendingAuthorization, TokenSet, UserIdentity};
use crate::domain::errors::{BeginSignInError, RefreshError, SignInFailure, Unauthenticated};
use crate::domain::ports::StateSourceKind;
use crate::services::authorization_request::AuthorizationRequestBuilder;
use crate::services::callback_verifier::VerifiedCode;
use crate::services::pending_auth_registry::PendingAuthRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    Unauthenticated,
    AuthorizationPending,
    Authenticated,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: AuthPhase, to: AuthPhase },
}

/// Validates if a phase transition is allowed
pub fn validate_transition(from: AuthPhase, to: AuthPhase) -> Result<(), TransitionError> {
    use AuthPhase::*;

    match (from, to) {
        // Re-entry while pending and sign-out while signed out are no-ops
        (AuthorizationPending, AuthorizationPending) => Ok(()),
        (Unauthenticated, Unauthenticated) => Ok(()),

        (Unauthenticated, AuthorizationPending) => Ok(()),
        (AuthorizationPending, Authenticated) => Ok(()),
        (AuthorizationPending, Unauthenticated) => Ok(()),
        (Authenticated, Unauthenticated) => Ok(()),

        // Session storage was lost during the redirect; the verified callback
        // alone carries the sign-in
        (Unauthenticated, Authenticated) => Ok(()),

        _ => Err(TransitionError::InvalidTransition { from, to }),
    }
}

/// What the UI gate renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UiState {
    Unauthenticated,
    AuthorizationPending { authorization_url: String },
    Authenticated { identity: UserIdentity },
}

/// Tokens and identity obtained through a verified callback.
///
/// Built only from a [`VerifiedCode`], so an identity can never enter a
/// session without passing the state checks.
#[derive(Debug, Clone)]
pub struct VerifiedSignIn {
    tokens: TokenSet,
    identity: UserIdentity,
    source: StateSourceKind,
}

impl VerifiedSignIn {
    pub fn new(verified: &VerifiedCode, tokens: TokenSet, identity: UserIdentity) -> Self {
        Self {
            tokens,
            identity,
            source: verified.source(),
        }
    }

    pub fn tokens(&self) -> &TokenSet {
        &self.tokens
    }

    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }
}

/// One user session's authentication state.
pub struct SessionAuthContext {
    phase: AuthPhase,
    registry: PendingAuthRegistry,
    token_set: Option<TokenSet>,
    user_identity: Option<UserIdentity>,
}

impl SessionAuthContext {
    pub fn new(registry: PendingAuthRegistry) -> Self {
        Self {
            phase: AuthPhase::Unauthenticated,
            registry,
            token_set: None,
            user_identity: None,
        }
    }

    /// Current phase, with an expired pending authorization read as signed out.
    pub fn phase(&self) -> AuthPhase {
        match self.phase {
            AuthPhase::AuthorizationPending if !self.registry.is_active() => {
                AuthPhase::Unauthenticated
            }
            phase => phase,
        }
    }

    pub fn token_set(&self) -> Option<&TokenSet> {
        self.token_set.as_ref()
    }

    pub fn user_identity(&self) -> Option<&UserIdentity> {
        self.user_identity.as_ref()
    }

    pub fn pending(&self) -> Option<&PendingAuthorization> {
        self.registry.get()
    }

    pub fn current_state(&self) -> UiState {
        match (self.phase(), &self.user_identity) {
            (AuthPhase::Authenticated, Some(identity)) => UiState::Authenticated {
                identity: identity.clone(),
            },
            (AuthPhase::AuthorizationPending, _) => match self.registry.get() {
                Some(pending) => UiState::AuthorizationPending {
                    authorization_url: pending.authorization_url.clone(),
                },
                None => UiState::Unauthenticated,
            },
            _ => UiState::Unauthenticated,
        }
    }

    /// Move to pending and return the URL to send the browser to. Repeated
    /// calls while pending return the same URL.
    pub fn begin_sign_in(
        &mut self,
        builder: &AuthorizationRequestBuilder,
        client: &ClientConfig,
    ) -> Result<String, BeginSignInError> {
        let from = self.phase();
        if from == AuthPhase::Authenticated {
            return Err(BeginSignInError::AlreadyAuthenticated);
        }

        let url = match builder.build(client, &mut self.registry) {
            Ok(url) => url,
            Err(e) => {
                self.phase = AuthPhase::Unauthenticated;
                return Err(e.into());
            }
        };

        self.transition(from, AuthPhase::AuthorizationPending);
        Ok(url)
    }

    /// Store the result of a verified callback.
    pub fn complete_sign_in(&mut self, signed_in: VerifiedSignIn) -> Result<(), TransitionError> {
        let from = self.phase();
        validate_transition(from, AuthPhase::Authenticated)?;

        self.registry.clear();
        tracing::info!(
            user = signed_in.identity.display_id().unwrap_or("unknown"),
            source = signed_in.source.as_str(),
            "Sign-in completed"
        );
        self.token_set = Some(signed_in.tokens);
        self.user_identity = Some(signed_in.identity);
        self.transition(from, AuthPhase::Authenticated);

        Ok(())
    }

    /// Abandon the attempt. A signed-in session ignores a stray failed
    /// callback rather than being signed out by it.
    pub fn fail_sign_in(&mut self, failure: &SignInFailure) {
        let from = self.phase();
        if from == AuthPhase::Authenticated {
            tracing::debug!(reason = failure.as_str(), "Ignoring failed callback for signed-in session");
            return;
        }

        self.registry.clear();
        self.transition(from, AuthPhase::Unauthenticated);
    }

    pub fn sign_out(&mut self) {
        let from = self.phase();
        self.token_set = None;
        self.user_identity = None;
        self.registry.clear();
        self.transition(from, AuthPhase::Unauthenticated);
    }

    /// Swap in tokens from a successful refresh.
    pub fn replace_tokens(&mut self, tokens: TokenSet) -> Result<(), Unauthenticated> {
        if self.phase != AuthPhase::Authenticated {
            return Err(Unauthenticated);
        }
        self.token_set = Some(tokens);
        Ok(())
    }

    /// A failed refresh ends the session; it is never retried.
    pub fn refresh_failed(&mut self, error: &RefreshError) {
        tracing::warn!(error = %error, "Token refresh failed; signing out");
        self.sign_out();
    }

    /// Drop a pending authorization that outlived its max age.
    pub fn expire_stale(&mut self) -> bool {
        if self.registry.prune_expired() && self.phase == AuthPhase::AuthorizationPending {
            self.phase = AuthPhase::Unauthenticated;
            return true;
        }
        false
    }

    /// Signed out with nothing in flight.
    pub fn is_idle(&self) -> bool {
        self.phase() == AuthPhase::Unauthenticated && !self.registry.is_active()
    }

    fn transition(&mut self, from: AuthPhase, to: AuthPhase) {
        if from != to {
            tracing::info!("Session auth transition from {:?} to {:?}", from, to);
        }
        self.phase = to;
    }
}
