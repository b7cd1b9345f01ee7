use async_trait::async_trait;

use crate::domain::entities::{TokenSet, UserIdentity};

/// Optional durable copy of the user's tokens (e.g. a file in their cloud
/// storage). Best-effort: failures are logged by the caller and never change
/// the sign-in outcome.
#[async_trait]
pub trait TokenSink: Send + Sync {
    async fn persist(&self, identity: &UserIdentity, tokens: &TokenSet) -> anyhow::Result<()>;
}
