use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use std::sync::Arc;

use crate::config::{ConfigError, Environment};
use crate::domain::entities::{StateToken, NONCE_LEN};
use crate::domain::ports::Clock;

type HmacSha256 = Hmac<Sha256>;

/// Tolerated distance into the future of `issued_at`.
const CLOCK_SKEW_SECONDS: i64 = 30;

/// Secrets shorter than this are accepted but logged.
const RECOMMENDED_SECRET_LEN: usize = 32;

/// Why a candidate state value was refused. Expected and frequent; never a
/// defect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidState {
    #[error("state token is malformed")]
    Malformed,
    #[error("state token signature does not verify")]
    BadSignature,
    #[error("state token is older than the allowed age")]
    Expired,
    #[error("state token is issued in the future")]
    NotYetValid,
    #[error("no signing key is configured")]
    NoKey,
}

/// Mints and checks signed, time-limited state tokens.
///
/// Verification needs only the process secret, so a token can be checked
/// even when the server-side session that issued it is gone.
#[derive(Clone)]
pub struct StateTokenCodec {
    key: Option<Arc<[u8]>>,
    max_age: i64,
    clock: Arc<dyn Clock>,
}

impl StateTokenCodec {
    pub fn new(secret: impl AsRef<[u8]>, max_age: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            key: Some(Arc::from(secret.as_ref())),
            max_age,
            clock,
        }
    }

    /// Build from deployment settings.
    ///
    /// Without a configured secret, development gets a random per-process
    /// key (tokens die with the process); production gets no key, and
    /// [`issue`](Self::issue) reports a configuration error.
    pub fn from_config(
        secret: Option<&str>,
        environment: Environment,
        max_age: i64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let key: Option<Arc<[u8]>> = match secret {
            Some(secret) => {
                if secret.len() < RECOMMENDED_SECRET_LEN {
                    tracing::warn!(
                        length = secret.len(),
                        "OAUTH_STATE_SECRET is shorter than {} bytes",
                        RECOMMENDED_SECRET_LEN
                    );
                }
                Some(Arc::from(secret.as_bytes()))
            }
            None if environment.is_production() => None,
            None => {
                tracing::warn!(
                    "OAUTH_STATE_SECRET not set; using an ephemeral signing key for this process"
                );
                let generated: [u8; 32] = rand::thread_rng().gen();
                Some(Arc::from(&generated[..]))
            }
        };

        Self {
            key,
            max_age,
            clock,
        }
    }

    pub fn max_age(&self) -> i64 {
        self.max_age
    }

    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    /// Mint a fresh token stamped with the current time.
    pub fn issue(&self) -> Result<StateToken, ConfigError> {
        let key = self.key.as_ref().ok_or(ConfigError::MissingSigningSecret)?;

        let nonce: [u8; NONCE_LEN] = rand::thread_rng().gen();
        let issued_at = self.clock.now_unix();
        let signature = sign(key, &nonce, issued_at);

        Ok(StateToken {
            nonce,
            issued_at,
            signature,
        })
    }

    /// Parse and authenticate an encoded token, then check its age.
    pub fn verify(&self, candidate: &str) -> Result<StateToken, InvalidState> {
        let key = self.key.as_ref().ok_or(InvalidState::NoKey)?;
        let token = StateToken::parse(candidate).ok_or(InvalidState::Malformed)?;

        let mut mac = new_mac(key);
        mac.update(&StateToken::signing_input(&token.nonce, token.issued_at));
        // verify_slice compares in constant time
        mac.verify_slice(&token.signature)
            .map_err(|_| InvalidState::BadSignature)?;

        let now = self.clock.now_unix();
        if token.issued_at > now.saturating_add(CLOCK_SKEW_SECONDS) {
            return Err(InvalidState::NotYetValid);
        }
        if now.saturating_sub(token.issued_at) > self.max_age {
            return Err(InvalidState::Expired);
        }

        Ok(token)
    }
}

fn new_mac(key: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(key).expect("HMAC can take key of any size")
}

fn sign(key: &[u8], nonce: &[u8; NONCE_LEN], issued_at: i64) -> [u8; 32] {
    let mut mac = new_mac(key);
    mac.update(&StateToken::signing_input(nonce, issued_at));
    mac.finalize().into_bytes().into()
}

/// Constant-time string comparison to prevent timing attacks.
///
/// Length is not secret (state tokens have a fixed shape); for equal lengths
/// every byte is visited regardless of where the first difference is.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
