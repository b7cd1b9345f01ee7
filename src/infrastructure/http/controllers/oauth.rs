use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;

use crate::domain::entities::CallbackRequest;
use crate::domain::ports::ExpectedStateSource;
use crate::infrastructure::http::cookies;
use crate::infrastructure::http::middleware::{ApiError, ApiResult, AppState};
use crate::infrastructure::http::state_sources::{
    SessionRegistrySource, StateCookieSource, TransportEmbeddedSource,
};
use crate::services::{AuthPhase, DiagnosticsSnapshot, UiState};

/// Start (or resume) sign-in and send the browser to the provider.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Redirect)> {
    let secure = state.settings.secure_cookies;
    let existing = cookies::get_session_id(&jar);
    let (session_id, context) = state.sessions.get_or_create(existing.as_deref()).await;
    let jar = jar.add(cookies::session_cookie(&session_id, secure));

    let mut context = context.lock().await;
    if context.phase() == AuthPhase::Authenticated {
        return Ok((jar, Redirect::to("/")));
    }

    let authorization_url = state.flow.begin_sign_in(&mut context)?;
    let expected_state = context
        .pending()
        .map(|p| p.expected_state())
        .ok_or_else(|| ApiError::Internal("authorization request was not recorded".to_string()))?;

    let jar = jar.add(cookies::state_cookie(
        &expected_state,
        state.settings.state_max_age,
        secure,
    ));

    Ok((jar, Redirect::to(&authorization_url)))
}

/// Redirect-back target registered with the provider.
pub async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(request): Query<CallbackRequest>,
) -> Response {
    if !request.is_callback() {
        return home(State(state), jar).await.into_response();
    }

    let state_cookie = StateCookieSource::from_jar(&jar);
    let existing = cookies::get_session_id(&jar);
    let (session_id, context) = state.sessions.get_or_create(existing.as_deref()).await;

    let secure = state.settings.secure_cookies;

    // The state cookie is single-use whatever the outcome
    let jar = jar.add(cookies::clear_state_cookie());

    let mut guard = context.lock().await;
    let registry = SessionRegistrySource::capture(&guard);
    let transport = TransportEmbeddedSource::from_request(&request);

    let mut sources: Vec<&dyn ExpectedStateSource> = Vec::with_capacity(3);
    sources.push(&state_cookie);
    sources.push(&registry);
    if state.flow.trusts_signed_state() {
        sources.push(&transport);
    }

    let result = state
        .flow
        .handle_callback(&mut guard, &request, &sources)
        .await;
    drop(guard);

    match result {
        Ok(_) => {
            // A signed-in session never keeps the id it had while signed out
            let fresh_id = state.sessions.rotate(&session_id, &context).await;
            let jar = jar.add(cookies::session_cookie(&fresh_id, secure));
            (jar, Redirect::to("/")).into_response()
        }
        Err(failure) => {
            let jar = jar.add(cookies::session_cookie(&session_id, secure));
            (jar, ApiError::from(failure)).into_response()
        }
    }
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(session_id) = cookies::get_session_id(&jar) {
        if let Some(context) = state.sessions.get(&session_id).await {
            let mut context = context.lock().await;
            state.flow.sign_out(&mut context);
        }
        state.sessions.remove(&session_id).await;
    }

    let jar = jar
        .add(cookies::clear_session_cookie())
        .add(cookies::clear_state_cookie());
    (jar, Redirect::to("/"))
}

/// Current UI state. Never creates a session.
pub async fn status(State(state): State<AppState>, jar: CookieJar) -> Json<UiState> {
    Json(current_ui_state(&state, &jar).await)
}

pub async fn home(State(state): State<AppState>, jar: CookieJar) -> Json<UiState> {
    Json(current_ui_state(&state, &jar).await)
}

pub async fn diagnostics(
    State(state): State<AppState>,
    jar: CookieJar,
) -> ApiResult<Json<DiagnosticsSnapshot>> {
    if !state.settings.diagnostics_enabled {
        return Err(ApiError::NotFound("Not found".to_string()));
    }

    let state_cookie_present = StateCookieSource::from_jar(&jar).is_present();
    let warnings = state.settings.redirect_warnings.clone();

    let session = match cookies::get_session_id(&jar) {
        Some(id) => state.sessions.get(&id).await,
        None => None,
    };

    let snapshot = match session {
        Some(context) => {
            let context = context.lock().await;
            DiagnosticsSnapshot::capture(&context, &state.flow, state_cookie_present, warnings)
        }
        None => DiagnosticsSnapshot::capture(
            &state.sessions.new_context(),
            &state.flow,
            state_cookie_present,
            warnings,
        ),
    };

    Ok(Json(snapshot))
}

async fn current_ui_state(state: &AppState, jar: &CookieJar) -> UiState {
    let Some(session_id) = cookies::get_session_id(jar) else {
        return UiState::Unauthenticated;
    };
    match state.sessions.get(&session_id).await {
        Some(context) => context.lock().await.current_state(),
        None => UiState::Unauthenticated,
    }
}
