use thiserror::Error;

use crate::config::ConfigError;

/// Why an inbound callback was not accepted as a continuation of a sign-in.
///
/// Every variant is recoverable by starting sign-in again. The variants stay
/// distinct in logs and metrics; the end user only ever sees one generic
/// message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    #[error("provider denied the authorization: {0}")]
    ProviderDenied(String),
    #[error("callback is missing the code or state parameter")]
    MalformedCallback,
    #[error("expected state could not be recovered from any source")]
    ExpectedStateUnavailable,
    #[error("expected state failed signature or age verification")]
    ExpiredOrForged,
    #[error("returned state does not match the expected state")]
    StateMismatch,
}

impl RejectionReason {
    /// Stable code used as log field and metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::ProviderDenied(_) => "provider_denied",
            RejectionReason::MalformedCallback => "malformed_callback",
            RejectionReason::ExpectedStateUnavailable => "expected_state_unavailable",
            RejectionReason::ExpiredOrForged => "expired_or_forged",
            RejectionReason::StateMismatch => "state_mismatch",
        }
    }

    /// Rejections that may indicate an attack rather than lost storage.
    pub fn is_security_signal(&self) -> bool {
        matches!(
            self,
            RejectionReason::ExpiredOrForged | RejectionReason::StateMismatch
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("token endpoint request failed: {0}")]
    Network(String),
    #[error("token endpoint returned status {status}: {error}")]
    Rejected {
        status: u16,
        error: String,
        description: Option<String>,
    },
    #[error("token endpoint response is malformed: {0}")]
    MalformedResponse(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("no refresh token available")]
    NoRefreshToken,
    #[error("refresh request failed: {0}")]
    Network(String),
    #[error("refresh rejected with status {status}: {error}")]
    Rejected {
        status: u16,
        error: String,
        description: Option<String>,
    },
    #[error("refresh response is malformed: {0}")]
    MalformedResponse(String),
}

impl From<ExchangeError> for RefreshError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::Network(msg) => RefreshError::Network(msg),
            ExchangeError::Rejected {
                status,
                error,
                description,
            } => RefreshError::Rejected {
                status,
                error,
                description,
            },
            ExchangeError::MalformedResponse(msg) => RefreshError::MalformedResponse(msg),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("userinfo request failed: {0}")]
    Network(String),
    #[error("userinfo endpoint returned status {0}")]
    Status(u16),
    #[error("userinfo response has neither email nor subject")]
    MissingIdentity,
    #[error("userinfo response is malformed: {0}")]
    MalformedResponse(String),
}

/// Everything that can end one callback attempt without a session.
#[derive(Error, Debug)]
pub enum SignInFailure {
    #[error(transparent)]
    Rejected(#[from] RejectionReason),
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("callback arrived for a session that is already signed in")]
    AlreadyAuthenticated,
}

impl SignInFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignInFailure::Rejected(reason) => reason.as_str(),
            SignInFailure::Exchange(_) => "exchange_failed",
            SignInFailure::Identity(_) => "identity_unavailable",
            SignInFailure::AlreadyAuthenticated => "already_authenticated",
        }
    }
}

/// Returned to the storage collaborator and the UI gate when no usable
/// access token exists.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("not authenticated")]
pub struct Unauthenticated;

/// Failure to start a sign-in.
#[derive(Error, Debug)]
pub enum BeginSignInError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("already signed in")]
    AlreadyAuthenticated,
}
