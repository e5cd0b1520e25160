// SPDX-License-Identifier: MIT

//! API routes for authenticated users.

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;
use crate::middleware::{CurrentUser, SessionHandle};
use crate::models::{ConversationTurn, UserProfile};
use crate::AppState;

/// API routes (require an authenticated session).
/// The session middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/history", get(get_history))
        .route("/api/profile", get(get_profile).put(put_profile))
        .route("/api/attributes", get(get_attributes).put(put_attributes))
        .route("/api/research", get(get_research))
}

// ─── Chat ────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ChatRequest {
    pub text: String,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

/// Submit one conversation turn, gated on an active subscription.
async fn chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Extension(handle): Extension<SessionHandle>,
    Json(request): Json<ChatRequest>,
) -> Result<Response> {
    if request.text.trim().is_empty() {
        return Err(crate::error::AppError::BadRequest(
            "empty message".to_string(),
        ));
    }

    // The gate fails closed: a billing error propagates as a visible error
    // and the turn is not submitted.
    if !state.gate.is_entitled(&user.user_id).await? {
        tracing::info!(user_id = %user.user_id, "Chat refused, no active subscription");
        let body = serde_json::json!({ "error": "subscription_required" });
        return Ok((StatusCode::PAYMENT_REQUIRED, Json(body)).into_response());
    }

    let mut session = handle.session.lock().await;
    let reply = state
        .dialogue
        .submit_turn(&state.store, &mut session, &user.user_id, &request.text)
        .await?;

    Ok(Json(ChatResponse { reply }).into_response())
}

// ─── History ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HistoryResponse {
    pub conversation: Vec<ConversationTurn>,
}

/// Persisted conversation log. May contain a trailing user turn with no
/// assistant reply (a model call failed); renderers tolerate that.
async fn get_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<HistoryResponse>> {
    let conversation = state.store.load_conversation(&user.user_id)?;
    Ok(Json(HistoryResponse { conversation }))
}

// ─── Profile ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ProfileResponse {
    pub profile_text: Option<String>,
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ProfileResponse>> {
    let profile = state.store.load_profile(&user.user_id)?;
    Ok(Json(ProfileResponse {
        profile_text: profile.map(|p| p.profile_text),
    }))
}

#[derive(Deserialize)]
pub struct ProfileUpdate {
    pub profile_text: String,
}

async fn put_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>> {
    state.store.save_profile(
        &user.user_id,
        &UserProfile {
            profile_text: update.profile_text.clone(),
        },
    )?;
    tracing::info!(user_id = %user.user_id, "Profile updated");
    Ok(Json(ProfileResponse {
        profile_text: Some(update.profile_text),
    }))
}

// ─── Personality attributes ──────────────────────────────────

#[derive(Serialize)]
pub struct AttributesResponse {
    /// Full catalog: attribute key -> instruction text
    pub catalog: BTreeMap<String, String>,
    /// The user's current selection
    pub selected: Vec<String>,
}

async fn get_attributes(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<AttributesResponse>> {
    let catalog = state.dialogue.catalog();
    let selected = state.store.load_attributes(&user.user_id)?;
    Ok(Json(AttributesResponse {
        catalog: catalog
            .keys()
            .into_iter()
            .map(|key| {
                let text = catalog.instruction(&key).to_string();
                (key, text)
            })
            .collect(),
        selected,
    }))
}

#[derive(Deserialize)]
pub struct AttributesUpdate {
    pub attributes: Vec<String>,
}

async fn put_attributes(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(update): Json<AttributesUpdate>,
) -> Result<Json<serde_json::Value>> {
    state
        .store
        .save_attributes(&user.user_id, &update.attributes)?;
    tracing::info!(user_id = %user.user_id, count = update.attributes.len(), "Attributes saved");
    Ok(Json(serde_json::json!({ "saved": update.attributes })))
}

// ─── Latest research ─────────────────────────────────────────

#[derive(Serialize)]
pub struct ResearchLink {
    pub label: &'static str,
    pub url: &'static str,
}

/// Curated recent-research links shown alongside the chat.
async fn get_research() -> Json<Vec<ResearchLink>> {
    Json(vec![
        ResearchLink {
            label: "Intentional health",
            url: "https://grok.com/share/72297e01-7fbb-49f8-8452-3b013d90d0ad",
        },
        ResearchLink {
            label: "Fitness benefits of housework",
            url: "https://grok.com/share/f7a9dca9-d1ad-4d7b-a562-2f28627897d1",
        },
    ])
}
