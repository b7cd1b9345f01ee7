use serde::Serialize;

/// Where an expected state value was recovered from.
///
/// Declaration order is the lookup priority: most durable across the
/// provider redirect first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateSourceKind {
    /// Correlation value attached to the callback request itself (state cookie).
    RequestCorrelation,
    /// Pending authorization held in the server-side user session.
    SessionRegistry,
    /// Value carried by the redirect transport, trusted only on signature.
    TransportEmbedded,
}

impl StateSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateSourceKind::RequestCorrelation => "request_correlation",
            StateSourceKind::SessionRegistry => "session_registry",
            StateSourceKind::TransportEmbedded => "transport_embedded",
        }
    }
}

/// One candidate location of the state value issued for this attempt.
pub trait ExpectedStateSource: Send + Sync {
    fn kind(&self) -> StateSourceKind;

    /// The stored value, or `None` when this location did not survive.
    fn expected_state(&self) -> Option<String>;
}

/// A value captured from a request before verification runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedState {
    pub kind: StateSourceKind,
    pub value: Option<String>,
}

impl CapturedState {
    pub fn new(kind: StateSourceKind, value: Option<String>) -> Self {
        Self { kind, value }
    }
}

impl ExpectedStateSource for CapturedState {
    fn kind(&self) -> StateSourceKind {
        self.kind
    }

    fn expected_state(&self) -> Option<String> {
        self.value.clone().filter(|v| !v.is_empty())
    }
}
