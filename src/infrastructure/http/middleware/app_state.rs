use std::sync::Arc;

use crate::infrastructure::persistence::SessionStore;
use crate::services::AuthFlowService;

/// Request-independent settings the handlers need.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub secure_cookies: bool,
    pub state_max_age: i64,
    pub diagnostics_enabled: bool,
    pub callback_path: String,
    pub redirect_warnings: Vec<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub flow: Arc<AuthFlowService>,
    pub sessions: SessionStore,
    pub settings: Arc<HttpSettings>,
}
