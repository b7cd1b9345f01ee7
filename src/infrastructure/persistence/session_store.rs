use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::domain::ports::Clock;
use crate::services::{PendingAuthRegistry, SessionAuthContext};

/// Bytes of randomness in a session id (hex encoded on the wire).
const SESSION_ID_BYTES: usize = 32;

/// Sessions untouched for this long are dropped whatever their phase.
pub const DEFAULT_SESSION_IDLE_TIMEOUT_SECONDS: i64 = 8 * 60 * 60;

/// Signed-out sessions younger than this survive a sweep, so a request that
/// just created one can still lock it.
const SIGNED_OUT_GRACE_SECONDS: i64 = 120;

pub type SharedContext = Arc<Mutex<SessionAuthContext>>;

struct SessionEntry {
    context: SharedContext,
    last_seen: AtomicI64,
}

impl SessionEntry {
    fn new(context: SharedContext, now: i64) -> Self {
        Self {
            context,
            last_seen: AtomicI64::new(now),
        }
    }

    fn touch(&self, now: i64) -> SharedContext {
        self.last_seen.store(now, Ordering::Relaxed);
        self.context.clone()
    }

    fn idle_for(&self, now: i64) -> i64 {
        now - self.last_seen.load(Ordering::Relaxed)
    }
}

/// In-memory map of user sessions.
///
/// Each session sits behind its own mutex so interleaved requests of one
/// browser (double clicks, back-button resubmits) run one after another.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
    state_max_age: i64,
    idle_timeout: i64,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(state_max_age: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            state_max_age,
            idle_timeout: DEFAULT_SESSION_IDLE_TIMEOUT_SECONDS,
            clock,
        }
    }

    pub fn with_idle_timeout(mut self, seconds: i64) -> Self {
        self.idle_timeout = seconds.max(SIGNED_OUT_GRACE_SECONDS);
        self
    }

    /// Create a fresh, signed-out session.
    pub async fn create(&self) -> (String, SharedContext) {
        let session_id = generate_session_id();
        let context = Arc::new(Mutex::new(self.new_context()));

        self.sessions.write().await.insert(
            session_id.clone(),
            SessionEntry::new(context.clone(), self.clock.now_unix()),
        );

        tracing::debug!(session = %&session_id[..8], "Created session");
        (session_id, context)
    }

    /// Look up a session and mark it as seen.
    pub async fn get(&self, session_id: &str) -> Option<SharedContext> {
        let now = self.clock.now_unix();
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|entry| entry.touch(now))
    }

    /// Look up a session by id, creating a new one when the id is absent or
    /// unknown. The returned id may differ from the one passed in.
    pub async fn get_or_create(&self, session_id: Option<&str>) -> (String, SharedContext) {
        if let Some(id) = session_id {
            if let Some(context) = self.get(id).await {
                return (id.to_string(), context);
            }
        }
        self.create().await
    }

    /// Move `context` to a freshly generated id and forget `old_id`.
    ///
    /// Called when a session changes privilege so an id known before
    /// sign-in never names a signed-in session. The context is registered
    /// even if a sweep already dropped the old entry.
    pub async fn rotate(&self, old_id: &str, context: &SharedContext) -> String {
        let new_id = generate_session_id();
        let mut sessions = self.sessions.write().await;
        sessions.remove(old_id);
        sessions.insert(
            new_id.clone(),
            SessionEntry::new(context.clone(), self.clock.now_unix()),
        );

        tracing::debug!(
            old = %&old_id[..old_id.len().min(8)],
            new = %&new_id[..8],
            "Rotated session id"
        );
        new_id
    }

    pub async fn remove(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop sessions unused for longer than the idle timeout, and signed-out
    /// sessions with nothing pending once they are past the grace period.
    /// Sessions in use by a request are skipped.
    pub async fn cleanup_idle(&self) -> usize {
        let now = self.clock.now_unix();
        let idle_timeout = self.idle_timeout;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|_, entry| {
            let idle_for = entry.idle_for(now);
            if idle_for > idle_timeout {
                return false;
            }
            match entry.context.try_lock() {
                Ok(mut guard) => {
                    guard.expire_stale();
                    !(guard.is_idle() && idle_for > SIGNED_OUT_GRACE_SECONDS)
                }
                Err(_) => true,
            }
        });

        let removed = before - sessions.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = sessions.len(), "Cleaned up idle sessions");
        }
        removed
    }

    /// A signed-out context that is not registered in the store.
    pub fn new_context(&self) -> SessionAuthContext {
        SessionAuthContext::new(PendingAuthRegistry::new(
            self.state_max_age,
            self.clock.clone(),
        ))
    }
}

fn generate_session_id() -> String {
    let bytes: [u8; SESSION_ID_BYTES] = rand::thread_rng().gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::domain::entities::{TokenSet, UserIdentity};
    use crate::domain::ports::{ManualClock, StateSourceKind};
    use crate::services::{
        AuthPhase, AuthorizationRequestBuilder, StateTokenCodec, VerifiedCode, VerifiedSignIn,
    };

    fn store() -> (SessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        (SessionStore::new(300, clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_session_ids_are_random_hex() {
        let (store, _clock) = store();
        let (a, _) = store.create().await;
        let (b, _) = store.create().await;

        assert_eq!(a.len(), SESSION_ID_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_get_or_create_reuses_known_id() {
        let (store, _clock) = store();
        let (id, _) = store.create().await;

        let (same, _) = store.get_or_create(Some(&id)).await;
        assert_eq!(same, id);

        let (fresh, _) = store.get_or_create(Some("unknown")).await;
        assert_ne!(fresh, "unknown");
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_pending_and_drops_idle() {
        let (store, clock) = store();
        let codec = StateTokenCodec::new("store-test-secret-0123456789abcdefgh", 300, clock.clone());
        let builder = AuthorizationRequestBuilder::new(codec);
        let client = ClientConfig::new("id", "secret", "https://app.example.com/cb");

        let (_idle, _) = store.create().await;
        let (_pending, context) = store.create().await;
        context
            .lock()
            .await
            .begin_sign_in(&builder, &client)
            .unwrap();

        // Freshly created sessions survive the first sweep
        assert_eq!(store.cleanup_idle().await, 0);

        clock.advance(SIGNED_OUT_GRACE_SECONDS + 1);
        assert_eq!(store.cleanup_idle().await, 1);
        assert_eq!(store.len().await, 1);

        clock.advance(300 - SIGNED_OUT_GRACE_SECONDS);
        assert_eq!(store.cleanup_idle().await, 1);
        assert!(store.is_empty().await);
    }

    fn signed_in() -> VerifiedSignIn {
        let verified = VerifiedCode::new("4/code", StateSourceKind::SessionRegistry);
        let tokens = TokenSet {
            access_token: "ya29.a".to_string(),
            refresh_token: Some("1//r".to_string()),
            token_type: "Bearer".to_string(),
            expires_at: Some(1_700_003_600),
            scope: None,
        };
        let identity = UserIdentity {
            email: Some("surveyor@example.com".to_string()),
            subject: Some("42".to_string()),
            name: None,
        };
        VerifiedSignIn::new(&verified, tokens, identity)
    }

    #[tokio::test]
    async fn test_cleanup_evicts_signed_in_sessions_past_idle_timeout() {
        let (store, clock) = store();
        let store = store.with_idle_timeout(3600);

        for _ in 0..10 {
            let (_, context) = store.create().await;
            context.lock().await.complete_sign_in(signed_in()).unwrap();
        }
        let (active, _) = store.create().await;
        store
            .get(&active)
            .await
            .unwrap()
            .lock()
            .await
            .complete_sign_in(signed_in())
            .unwrap();

        clock.advance(3000);
        assert_eq!(store.cleanup_idle().await, 0);

        // One browser keeps using its session
        assert!(store.get(&active).await.is_some());
        clock.advance(601);
        assert_eq!(store.cleanup_idle().await, 10);
        assert_eq!(store.len().await, 1);
        assert!(store.get(&active).await.is_some());

        clock.advance(3601);
        assert_eq!(store.cleanup_idle().await, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_rotate_moves_context_to_new_id() {
        let (store, _clock) = store();
        let (old_id, context) = store.create().await;
        context.lock().await.complete_sign_in(signed_in()).unwrap();

        let new_id = store.rotate(&old_id, &context).await;

        assert_ne!(new_id, old_id);
        assert!(store.get(&old_id).await.is_none());
        let moved = store.get(&new_id).await.unwrap();
        assert_eq!(moved.lock().await.phase(), AuthPhase::Authenticated);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_rotate_reinserts_swept_context() {
        let (store, clock) = store();
        let (old_id, context) = store.create().await;

        clock.advance(SIGNED_OUT_GRACE_SECONDS + 1);
        assert_eq!(store.cleanup_idle().await, 1);

        let new_id = store.rotate(&old_id, &context).await;
        assert!(store.get(&new_id).await.is_some());
    }
}
