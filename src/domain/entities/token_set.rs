use serde::{Deserialize, Serialize};
use std::fmt;

/// Bearer credentials obtained from the token endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    /// Unix seconds. `None` when the provider did not report a lifetime.
    pub expires_at: Option<i64>,
    pub scope: Option<String>,
}

impl TokenSet {
    /// True once `now >= expires_at - margin`.
    pub fn needs_refresh(&self, now: i64, margin: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at.saturating_sub(margin.max(0)),
            None => false,
        }
    }

    pub fn seconds_until_expiry(&self, now: i64) -> Option<i64> {
        self.expires_at.map(|expires_at| expires_at.saturating_sub(now))
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Who the tokens belong to, as reported by the userinfo endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub email: Option<String>,
    pub subject: Option<String>,
    pub name: Option<String>,
}

impl UserIdentity {
    /// Email when known, otherwise the provider subject.
    pub fn display_id(&self) -> Option<&str> {
        self.email
            .as_deref()
            .filter(|e| !e.is_empty())
            .or_else(|| self.subject.as_deref().filter(|s| !s.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(expires_at: Option<i64>) -> TokenSet {
        TokenSet {
            access_token: "ya29.access".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            token_type: "Bearer".to_string(),
            expires_at,
            scope: None,
        }
    }

    #[test]
    fn test_needs_refresh_honours_margin() {
        let set = tokens(Some(1_000));
        assert!(!set.needs_refresh(939, 60));
        assert!(set.needs_refresh(940, 60));
        assert!(set.needs_refresh(2_000, 60));
    }

    #[test]
    fn test_no_expiry_never_refreshes() {
        assert!(!tokens(None).needs_refresh(i64::MAX, 60));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let rendered = format!("{:?}", tokens(Some(1)));
        assert!(!rendered.contains("ya29.access"));
        assert!(!rendered.contains("1//refresh"));
    }

    #[test]
    fn test_display_id_prefers_email() {
        let identity = UserIdentity {
            email: Some("surveyor@example.com".to_string()),
            subject: Some("1234".to_string()),
            name: None,
        };
        assert_eq!(identity.display_id(), Some("surveyor@example.com"));

        let identity = UserIdentity {
            email: None,
            subject: Some("1234".to_string()),
            name: None,
        };
        assert_eq!(identity.display_id(), Some("1234"));
    }
}
