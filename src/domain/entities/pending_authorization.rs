use super::state_token::StateToken;

/// Record of a sign-in whose browser round-trip has not completed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    pub state_token: StateToken,
    pub authorization_url: String,
    pub created_at: i64,
}

impl PendingAuthorization {
    pub fn new(state_token: StateToken, authorization_url: String, created_at: i64) -> Self {
        Self {
            state_token,
            authorization_url,
            created_at,
        }
    }

    pub fn age(&self, now: i64) -> i64 {
        now.saturating_sub(self.created_at)
    }

    /// Expired once older than `max_age` seconds; exactly `max_age` is still live.
    pub fn is_expired(&self, now: i64, max_age: i64) -> bool {
        self.age(now) > max_age
    }

    /// Encoded state value the provider is expected to echo back.
    pub fn expected_state(&self) -> String {
        self.state_token.encode()
    }
}
