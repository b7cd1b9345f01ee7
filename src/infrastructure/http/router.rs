use crate::infrastructure::http::controllers::oauth;
use crate::infrastructure::http::middleware::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Paths owned by the router; the callback path must not collide with them.
pub const RESERVED_ROUTES: &[&str] = &[
    "/health",
    "/auth/login",
    "/auth/logout",
    "/auth/status",
    "/auth/diagnostics",
];

pub fn build_router(state: AppState) -> Router {
    let callback_path = state.settings.callback_path.clone();

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/auth/login", get(oauth::login))
        .route("/auth/logout", post(oauth::logout))
        .route("/auth/status", get(oauth::status))
        .route("/auth/diagnostics", get(oauth::diagnostics))
        .route(&callback_path, get(oauth::callback));

    // With the app root as redirect URI the callback handler serves home too
    if callback_path != "/" {
        router = router.route("/", get(oauth::home));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

async fn health_handler() -> &'static str {
    "OK"
}
