use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

use crate::domain::entities::{TokenSet, UserIdentity};
use crate::domain::ports::TokenSink;

const TOKEN_FILE_NAME: &str = "token.json";

/// Keeps a copy of each user's tokens at `<base>/<user>/token.json`.
#[derive(Clone)]
pub struct LocalTokenSink {
    base_path: PathBuf,
}

impl LocalTokenSink {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Directory for one user. The id is reduced to a safe file name so it
    /// can never climb out of the base path.
    fn user_dir(&self, identity: &UserIdentity) -> anyhow::Result<PathBuf> {
        let id = identity
            .display_id()
            .ok_or_else(|| anyhow::anyhow!("identity has neither email nor subject"))?;

        let safe: String = id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let safe = safe.trim_start_matches('.');
        if safe.is_empty() {
            anyhow::bail!("identity does not map to a usable directory name");
        }

        Ok(self.base_path.join(safe))
    }

    pub fn token_path(&self, identity: &UserIdentity) -> anyhow::Result<PathBuf> {
        Ok(self.user_dir(identity)?.join(TOKEN_FILE_NAME))
    }
}

#[async_trait]
impl TokenSink for LocalTokenSink {
    async fn persist(&self, identity: &UserIdentity, tokens: &TokenSet) -> anyhow::Result<()> {
        let dir = self.user_dir(identity)?;
        fs::create_dir_all(&dir).await?;

        let body = serde_json::to_vec_pretty(tokens)?;
        let path = dir.join(TOKEN_FILE_NAME);
        fs::write(&path, body).await?;

        tracing::debug!(path = %path.display(), "Stored token copy");
        Ok(())
    }
}
