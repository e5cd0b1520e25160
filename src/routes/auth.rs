// SPDX-License-Identifier: MIT

//! OAuth1 authentication routes.
//!
//! The handshake spans two redirects: `/auth/start` fetches a request token
//! and sends the browser to the provider; the provider sends it back to
//! `/auth/callback` with an `oauth_token` + `oauth_verifier` pair. Both
//! callback outcomes redirect to the frontend with a clean query string, so
//! a page refresh can never replay a stale callback.

use axum::{
    extract::{Extension, Query, State},
    response::Redirect,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::middleware::SessionHandle;
use crate::services::CallbackParams;
use crate::session::AuthState;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/start", get(auth_start))
        .route("/auth/callback", get(auth_callback))
        .route("/auth/session", get(auth_session))
        .route("/auth/reset", get(auth_reset))
        .route("/auth/logout", get(logout))
}

/// Start the handshake: fetch a request token and redirect the browser to
/// the provider's authorization page.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
) -> Result<Redirect> {
    let mut session = handle.session.lock().await;
    let authorize_url = state.flow.start(&mut session).await?;

    tracing::info!("Redirecting to provider authorization page");
    Ok(Redirect::temporary(&authorize_url))
}

/// Callback query parameters. Twitter sends `denied` instead of the token
/// pair when the user cancels at the provider.
#[derive(Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    oauth_token: Option<String>,
    #[serde(default)]
    oauth_verifier: Option<String>,
    #[serde(default)]
    denied: Option<String>,
}

/// Callback leg: exchange the request token + verifier for access
/// credentials, then redirect to the frontend.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
    Query(params): Query<CallbackQuery>,
) -> Result<Redirect> {
    let frontend = state.config.frontend_url.trim_end_matches('/').to_string();

    if params.denied.is_some() {
        tracing::warn!("User denied authorization at the provider");
        let mut session = handle.session.lock().await;
        session.clear();
        return Ok(Redirect::temporary(&format!("{}/?error=denied", frontend)));
    }

    let callback = CallbackParams {
        oauth_token: params.oauth_token,
        oauth_verifier: params.oauth_verifier,
    };

    let mut session = handle.session.lock().await;
    let user_id = state
        .flow
        .advance(&callback, &mut session, &state.store)
        .await?;

    match user_id {
        Some(user_id) => {
            tracing::info!(user_id, "Callback completed, session authenticated");
            Ok(Redirect::temporary(&format!(
                "{}/?authenticated=1",
                frontend
            )))
        }
        None => {
            tracing::warn!(phase = session.auth.phase(), "Callback did not authenticate");
            Ok(Redirect::temporary(&format!(
                "{}/?error=auth_failed",
                frontend
            )))
        }
    }
}

/// Session status response.
#[derive(Serialize)]
pub struct SessionResponse {
    pub phase: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Current auth phase, re-validating credentials when authenticated.
async fn auth_session(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
) -> Result<Json<SessionResponse>> {
    let mut session = handle.session.lock().await;
    let user_id = state
        .flow
        .advance(&CallbackParams::default(), &mut session, &state.store)
        .await?;

    let error = match &session.auth {
        AuthState::Error { message } => Some(message.clone()),
        _ => None,
    };

    Ok(Json(SessionResponse {
        phase: session.auth.phase(),
        user_id,
        error,
    }))
}

/// Reset authentication: clear the session and redirect to a bare frontend
/// URL, stripping any provider query parameters the browser may still hold.
async fn auth_reset(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
) -> Redirect {
    let mut session = handle.session.lock().await;
    session.clear();
    tracing::info!("Session reset");
    Redirect::temporary(&format!(
        "{}/",
        state.config.frontend_url.trim_end_matches('/')
    ))
}

/// Logout: drop the server-side session entirely.
async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
) -> Redirect {
    state.sessions.remove(&handle.id);
    tracing::info!("Session removed");
    Redirect::temporary(&format!(
        "{}/",
        state.config.frontend_url.trim_end_matches('/')
    ))
}
