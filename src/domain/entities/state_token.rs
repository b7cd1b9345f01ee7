use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::fmt;

/// Random bytes per authorization attempt.
pub const NONCE_LEN: usize = 32;
/// HMAC-SHA256 output length.
pub const SIGNATURE_LEN: usize = 32;

const SEPARATOR: &str = ".";

/// CSRF correlation token carried through the provider round-trip.
///
/// Wire form: `base64url(nonce).issued_at.base64url(signature)`, all
/// characters URL-safe so the value survives query strings and cookies
/// untouched.
#[derive(Clone, PartialEq, Eq)]
pub struct StateToken {
    pub nonce: [u8; NONCE_LEN],
    pub issued_at: i64,
    pub signature: [u8; SIGNATURE_LEN],
}

impl StateToken {
    /// Bytes covered by the signature.
    pub fn signing_input(nonce: &[u8; NONCE_LEN], issued_at: i64) -> Vec<u8> {
        let mut input = Vec::with_capacity(NONCE_LEN + 8);
        input.extend_from_slice(nonce);
        input.extend_from_slice(&issued_at.to_be_bytes());
        input
    }

    pub fn encode(&self) -> String {
        [
            URL_SAFE_NO_PAD.encode(self.nonce),
            self.issued_at.to_string(),
            URL_SAFE_NO_PAD.encode(self.signature),
        ]
        .join(SEPARATOR)
    }

    /// Structural parse only. Says nothing about authenticity.
    pub fn parse(candidate: &str) -> Option<Self> {
        let mut parts = candidate.split(SEPARATOR);
        let nonce_part = parts.next()?;
        let issued_part = parts.next()?;
        let signature_part = parts.next()?;
        if parts.next().is_some() {
            return None;
        }

        // Reject "+5", " 5" and friends so each token has exactly one encoding
        if issued_part.is_empty() || !issued_part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let issued_at: i64 = issued_part.parse().ok()?;

        let nonce: [u8; NONCE_LEN] = URL_SAFE_NO_PAD.decode(nonce_part).ok()?.try_into().ok()?;
        let signature: [u8; SIGNATURE_LEN] = URL_SAFE_NO_PAD
            .decode(signature_part)
            .ok()?
            .try_into()
            .ok()?;

        Some(Self {
            nonce,
            issued_at,
            signature,
        })
    }

    /// Short prefix safe to put in logs.
    pub fn log_prefix(&self) -> String {
        log_prefix(&self.encode())
    }
}

impl fmt::Debug for StateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateToken")
            .field("nonce", &format!("{}...", &hex::encode(&self.nonce[..4])))
            .field("issued_at", &self.issued_at)
            .finish_non_exhaustive()
    }
}

/// First eight characters of a secret-ish value, for log correlation.
pub fn log_prefix(value: &str) -> String {
    let prefix: String = value.chars().take(8).collect();
    format!("{prefix}...")
}
