use async_trait::async_trait;

use crate::domain::errors::Unauthenticated;

/// The one capability the photo-storage subsystem needs from sign-in:
/// a fresh bearer token for the given user session.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn get_current_access_token(&self, session_id: &str) -> Result<String, Unauthenticated>;
}
