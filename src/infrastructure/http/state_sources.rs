use axum_extra::extract::cookie::CookieJar;

use crate::domain::entities::CallbackRequest;
use crate::domain::ports::{ExpectedStateSource, StateSourceKind};
use crate::infrastructure::http::cookies;
use crate::services::SessionAuthContext;

/// State cookie set on login, sent back by the browser with the callback.
#[derive(Debug, Clone)]
pub struct StateCookieSource {
    value: Option<String>,
}

impl StateCookieSource {
    pub fn from_jar(jar: &CookieJar) -> Self {
        Self {
            value: cookies::get_state(jar),
        }
    }

    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }
}

impl ExpectedStateSource for StateCookieSource {
    fn kind(&self) -> StateSourceKind {
        StateSourceKind::RequestCorrelation
    }

    fn expected_state(&self) -> Option<String> {
        self.value.clone()
    }
}

/// Pending authorization of the server-side session, read under its lock.
#[derive(Debug, Clone)]
pub struct SessionRegistrySource {
    value: Option<String>,
}

impl SessionRegistrySource {
    pub fn capture(context: &SessionAuthContext) -> Self {
        Self {
            value: context.pending().map(|p| p.expected_state()),
        }
    }
}

impl ExpectedStateSource for SessionRegistrySource {
    fn kind(&self) -> StateSourceKind {
        StateSourceKind::SessionRegistry
    }

    fn expected_state(&self) -> Option<String> {
        self.value.clone()
    }
}

/// The returned state taken at face value. Only its signature and age
/// protect it, so it is consulted last and only when enabled.
#[derive(Debug, Clone)]
pub struct TransportEmbeddedSource {
    value: Option<String>,
}

impl TransportEmbeddedSource {
    pub fn from_request(request: &CallbackRequest) -> Self {
        Self {
            value: request.returned_state().map(str::to_string),
        }
    }
}

impl ExpectedStateSource for TransportEmbeddedSource {
    fn kind(&self) -> StateSourceKind {
        StateSourceKind::TransportEmbedded
    }

    fn expected_state(&self) -> Option<String> {
        self.value.clone().filter(|v| !v.is_empty())
    }
}
