use std::fmt;

use crate::domain::entities::{log_prefix, CallbackRequest};
use crate::domain::errors::RejectionReason;
use crate::domain::ports::{ExpectedStateSource, StateSourceKind};
use crate::services::state_token_codec::{constant_time_eq, StateTokenCodec};

/// An authorization code that passed every state check.
///
/// Only the verifier mints these, so holding one proves the callback was
/// checked.
#[derive(Clone, PartialEq, Eq)]
pub struct VerifiedCode {
    code: String,
    source: StateSourceKind,
}

impl VerifiedCode {
    pub(crate) fn new(code: impl Into<String>, source: StateSourceKind) -> Self {
        Self {
            code: code.into(),
            source,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Which location supplied the expected state.
    pub fn source(&self) -> StateSourceKind {
        self.source
    }
}

impl fmt::Debug for VerifiedCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifiedCode")
            .field("code", &log_prefix(&self.code))
            .field("source", &self.source)
            .finish()
    }
}

/// Decides whether a redirect-back request continues an attempt we started.
#[derive(Clone)]
pub struct CallbackVerifier {
    codec: StateTokenCodec,
}

impl CallbackVerifier {
    pub fn new(codec: StateTokenCodec) -> Self {
        Self { codec }
    }

    /// Run the checks in a fixed order: provider error, presence, expected
    /// state lookup, signature and age, then equality.
    ///
    /// Sources are consulted by priority (`StateSourceKind` order) whatever
    /// order the caller passes them in; the first one holding a value wins.
    pub fn verify(
        &self,
        request: &CallbackRequest,
        sources: &[&dyn ExpectedStateSource],
    ) -> Result<VerifiedCode, RejectionReason> {
        if let Some(error) = request.error() {
            tracing::info!(
                error = %error,
                description = request.error_description.as_deref().unwrap_or(""),
                "Provider returned an error to the callback"
            );
            return Err(reject(RejectionReason::ProviderDenied(error.to_string()), None));
        }

        let (code, returned_state) = match (request.code(), request.returned_state()) {
            (Some(code), Some(state)) => (code, state),
            _ => return Err(reject(RejectionReason::MalformedCallback, None)),
        };

        let mut ordered: Vec<&dyn ExpectedStateSource> = sources.to_vec();
        ordered.sort_by_key(|source| source.kind());

        let resolved = ordered
            .iter()
            .find_map(|source| source.expected_state().map(|value| (source.kind(), value)));

        let (source, expected_state) = match resolved {
            Some(found) => found,
            None => {
                let consulted: Vec<&str> = ordered.iter().map(|s| s.kind().as_str()).collect();
                tracing::debug!(sources = ?consulted, "No source held an expected state");
                return Err(reject(RejectionReason::ExpectedStateUnavailable, None));
            }
        };

        tracing::debug!(
            source = source.as_str(),
            expected = %log_prefix(&expected_state),
            "Resolved expected state"
        );

        if let Err(invalid) = self.codec.verify(&expected_state) {
            tracing::debug!(source = source.as_str(), cause = %invalid, "Expected state rejected by codec");
            return Err(reject(RejectionReason::ExpiredOrForged, Some(source)));
        }

        if !constant_time_eq(&expected_state, returned_state) {
            return Err(reject(RejectionReason::StateMismatch, Some(source)));
        }

        tracing::info!(
            source = source.as_str(),
            code = %log_prefix(code),
            "Callback verified"
        );

        Ok(VerifiedCode::new(code, source))
    }
}

fn reject(reason: RejectionReason, source: Option<StateSourceKind>) -> RejectionReason {
    let source_name = source.map(|s| s.as_str()).unwrap_or("none");

    if reason.is_security_signal() {
        tracing::warn!(
            reason = reason.as_str(),
            source = source_name,
            security_signal = true,
            "Callback rejected"
        );
    } else {
        tracing::warn!(
            reason = reason.as_str(),
            source = source_name,
            "Callback rejected"
        );
    }

    metrics::counter!("oauth_callback_rejections_total", "reason" => reason.as_str()).increment(1);

    reason
}
