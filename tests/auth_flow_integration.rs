// SPDX-License-Identifier: MIT

//! End-to-end OAuth handshake tests over the HTTP surface.
//!
//! The handshake is two independent request/response exchanges held
//! together only by the session cookie; these tests drive both legs the way
//! a browser would.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use std::sync::atomic::Ordering;
use tower::ServiceExt; // for oneshot

/// Extract the session cookie pair from a response.
fn session_cookie(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("set-cookie header")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

fn get(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_full_handshake_via_http() {
    let (app, _state, _mocks, _dir) = common::create_test_app();

    // Leg one: start redirects to the provider with the request token
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/auth/start").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.contains("oauth_token=rt1"), "got {location}");
    let cookie = session_cookie(&response);

    // Pending: the session endpoint reports awaiting_callback
    let response = app
        .clone()
        .oneshot(get("/auth/session", &cookie))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["phase"], "awaiting_callback");

    // Leg two: the provider redirects back with token + verifier
    let response = app
        .clone()
        .oneshot(get(
            "/auth/callback?oauth_token=rt1&oauth_verifier=v1",
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.ends_with("?authenticated=1"), "got {location}");

    // The session is authenticated as alice
    let response = app
        .clone()
        .oneshot(get("/auth/session", &cookie))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["phase"], "authenticated");
    assert_eq!(json["user_id"], "alice");
}

#[tokio::test]
async fn test_callback_with_wrong_token_reports_error_phase() {
    let (app, _state, _mocks, _dir) = common::create_test_app();

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/auth/start").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let cookie = session_cookie(&response);

    let response = app
        .clone()
        .oneshot(get(
            "/auth/callback?oauth_token=stolen&oauth_verifier=v1",
            &cookie,
        ))
        .await
        .unwrap();
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.contains("error=auth_failed"), "got {location}");

    let response = app
        .clone()
        .oneshot(get("/auth/session", &cookie))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["phase"], "error");
    assert!(json["user_id"].is_null());
}

#[tokio::test]
async fn test_callback_without_session_does_not_authenticate() {
    let (app, _state, _mocks, _dir) = common::create_test_app();

    // Replayed callback with a fresh session: no pending request token
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/auth/callback?oauth_token=rt1&oauth_verifier=v1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.contains("error=auth_failed"), "got {location}");
}

#[tokio::test]
async fn test_denied_callback_clears_session() {
    let (app, _state, _mocks, _dir) = common::create_test_app();

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/auth/start").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let cookie = session_cookie(&response);

    let response = app
        .clone()
        .oneshot(get("/auth/callback?denied=rt1", &cookie))
        .await
        .unwrap();
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.contains("error=denied"), "got {location}");

    let response = app
        .clone()
        .oneshot(get("/auth/session", &cookie))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["phase"], "not_started");
}

#[tokio::test]
async fn test_revoked_credentials_silently_reprompt() {
    let (app, _state, mocks, _dir) = common::create_test_app();

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/auth/start").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let cookie = session_cookie(&response);
    app.clone()
        .oneshot(get(
            "/auth/callback?oauth_token=rt1&oauth_verifier=v1",
            &cookie,
        ))
        .await
        .unwrap();

    // The provider revokes the token after authentication
    mocks.identity.revoked.store(true, Ordering::SeqCst);

    let response = app
        .clone()
        .oneshot(get("/auth/session", &cookie))
        .await
        .unwrap();
    let json = body_json(response).await;
    // Back to the start, ready to re-prompt, with no error surfaced
    assert_eq!(json["phase"], "not_started");
    assert!(json["user_id"].is_null());
}

#[tokio::test]
async fn test_sweep_never_deletes_record_of_session_in_use() {
    let (app, state, _mocks, _dir) = common::create_test_app();

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/auth/start").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let cookie = session_cookie(&response);
    app.clone()
        .oneshot(get(
            "/auth/callback?oauth_token=rt1&oauth_verifier=v1",
            &cookie,
        ))
        .await
        .unwrap();

    // Hold alice's session mutex the way an in-flight request would
    let session_id = cookie.strip_prefix("coach_session=").unwrap().to_string();
    let session = state.sessions.get(&session_id).expect("session exists");
    let _in_flight = session.lock().await;

    // The active set sees her despite the held lock, so even a zero
    // retention window removes nothing
    let active = state.sessions.active_user_ids();
    assert_eq!(active, vec!["alice".to_string()]);
    let removed = state
        .store
        .sweep(std::time::Duration::ZERO, &active)
        .unwrap();
    assert_eq!(removed, 0);
}

#[tokio::test]
async fn test_reset_clears_session_but_not_durable_state() {
    let (app, state, _mocks, _dir) = common::create_test_app();

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/auth/start").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let cookie = session_cookie(&response);
    app.clone()
        .oneshot(get(
            "/auth/callback?oauth_token=rt1&oauth_verifier=v1",
            &cookie,
        ))
        .await
        .unwrap();

    // Say something so there is durable conversation state
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::COOKIE, &cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"text":"hello coach"}"#))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Reset the session
    let response = app
        .clone()
        .oneshot(get("/auth/reset", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let response = app
        .clone()
        .oneshot(get("/auth/session", &cookie))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["phase"], "not_started");

    // Durable state survived the session reset
    let log = state.store.load_conversation("alice").unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].content, "hello coach");
}
