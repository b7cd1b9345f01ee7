use async_trait::async_trait;

use crate::domain::entities::UserIdentity;
use crate::domain::errors::IdentityError;

/// Resolves who an access token belongs to.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn fetch_identity(&self, access_token: &str) -> Result<UserIdentity, IdentityError>;
}
