// SPDX-License-Identifier: MIT

//! Session cookie middleware.
//!
//! `attach_session` gives every request a server-side session, minting the
//! cookie on first touch. `require_user` re-enters the OAuth flow controller
//! (identity probe included) and rejects requests without a validated
//! authenticated session.

use crate::services::CallbackParams;
use crate::session::Session;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const SESSION_COOKIE: &str = "coach_session";

/// The request's session, shared behind a per-session mutex.
#[derive(Clone)]
pub struct SessionHandle {
    pub id: String,
    pub session: Arc<Mutex<Session>>,
}

/// Authenticated user id extracted by `require_user`.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: String,
}

/// Attach a session to the request, creating one (and its cookie) on first
/// touch.
pub async fn attach_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let (jar, session_id) = match jar.get(SESSION_COOKIE) {
        Some(cookie) => (jar.clone(), cookie.value().to_string()),
        None => {
            let session_id = state.sessions.new_session_id();
            let cookie = Cookie::build((SESSION_COOKIE, session_id.clone()))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .build();
            (jar.add(cookie), session_id)
        }
    };

    let session = state.sessions.get_or_create(&session_id);
    request.extensions_mut().insert(SessionHandle {
        id: session_id.clone(),
        session: session.clone(),
    });

    let response = next.run(request).await;

    // Mirror any auth transition this request made into the store's active
    // map (the handler has released the lock by now, so this is brief).
    state.sessions.note_auth(&session_id, &*session.lock().await);

    (jar, response).into_response()
}

/// Require a validated authenticated session.
///
/// Runs the flow controller's probe leg; a session whose credentials fail
/// validation is silently reset and the request rejected with 401.
pub async fn require_user(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, crate::error::AppError> {
    let handle = request
        .extensions()
        .get::<SessionHandle>()
        .cloned()
        .ok_or(crate::error::AppError::Unauthorized)?;

    let user_id = {
        let mut session = handle.session.lock().await;
        state
            .flow
            .advance(&CallbackParams::default(), &mut session, &state.store)
            .await?
    };

    match user_id {
        Some(user_id) => {
            request.extensions_mut().insert(CurrentUser { user_id });
            Ok(next.run(request).await)
        }
        None => Err(crate::error::AppError::Unauthorized),
    }
}
