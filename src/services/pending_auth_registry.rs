use std::sync::Arc;

use crate::domain::entities::PendingAuthorization;
use crate::domain::ports::Clock;

/// Per-session record of the one sign-in currently in flight.
///
/// Entries expire on their own once older than `max_age`; nothing has to
/// cancel an abandoned attempt.
pub struct PendingAuthRegistry {
    pending: Option<PendingAuthorization>,
    max_age: i64,
    clock: Arc<dyn Clock>,
}

impl PendingAuthRegistry {
    pub fn new(max_age: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            pending: None,
            max_age,
            clock,
        }
    }

    pub fn is_active(&self) -> bool {
        self.get().is_some()
    }

    pub fn set(&mut self, pending: PendingAuthorization) {
        if let Some(previous) = self.pending.as_ref() {
            tracing::debug!(
                state = %previous.state_token.log_prefix(),
                "Replacing stale pending authorization"
            );
        }
        self.pending = Some(pending);
    }

    pub fn clear(&mut self) {
        if let Some(previous) = self.pending.take() {
            tracing::debug!(
                state = %previous.state_token.log_prefix(),
                "Cleared pending authorization"
            );
        }
    }

    /// The live pending authorization; an expired entry reads as absent.
    pub fn get(&self) -> Option<&PendingAuthorization> {
        let now = self.clock.now_unix();
        self.pending
            .as_ref()
            .filter(|pending| !pending.is_expired(now, self.max_age))
    }

    /// Drop an entry that has outlived `max_age`. Returns true if one was dropped.
    pub fn prune_expired(&mut self) -> bool {
        let now = self.clock.now_unix();
        match self.pending.as_ref() {
            Some(pending) if pending.is_expired(now, self.max_age) => {
                tracing::debug!(
                    state = %pending.state_token.log_prefix(),
                    age = pending.age(now),
                    "Pending authorization expired"
                );
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    pub fn max_age(&self) -> i64 {
        self.max_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{StateToken, NONCE_LEN, SIGNATURE_LEN};
    use crate::domain::ports::ManualClock;

    fn pending(created_at: i64, url: &str) -> PendingAuthorization {
        let token = StateToken {
            nonce: [3u8; NONCE_LEN],
            issued_at: created_at,
            signature: [4u8; SIGNATURE_LEN],
        };
        PendingAuthorization::new(token, url.to_string(), created_at)
    }

    #[test]
    fn test_idle_by_default() {
        let registry = PendingAuthRegistry::new(300, Arc::new(ManualClock::new(0)));
        assert!(!registry.is_active());
        assert!(registry.get().is_none());
    }

    #[test]
    fn test_set_then_clear() {
        let clock = Arc::new(ManualClock::new(1_000));
        let mut registry = PendingAuthRegistry::new(300, clock);

        registry.set(pending(1_000, "https://idp.example.com/a"));
        assert!(registry.is_active());
        assert_eq!(
            registry.get().map(|p| p.authorization_url.as_str()),
            Some("https://idp.example.com/a")
        );

        registry.clear();
        assert!(!registry.is_active());
    }

    #[test]
    fn test_self_expires_after_max_age() {
        let clock = Arc::new(ManualClock::new(1_000));
        let mut registry = PendingAuthRegistry::new(300, clock.clone());
        registry.set(pending(1_000, "https://idp.example.com/a"));

        clock.advance(300);
        assert!(registry.is_active());
        assert!(!registry.prune_expired());

        clock.advance(1);
        assert!(!registry.is_active());
        assert!(registry.get().is_none());
        assert!(registry.prune_expired());
    }
}
