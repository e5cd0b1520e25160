// SPDX-License-Identifier: MIT

//! Health-Coach: a personal health assistant backed by the xAI API
//!
//! This crate provides the backend for the coach web app: Twitter OAuth1
//! sign-in, durable per-user records (profile, personality attributes,
//! conversation history), a Stripe subscription gate, and the dialogue loop
//! against the chat-completions API.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod session;
pub mod store;

use config::Config;
use services::{AuthFlow, DialogueService, SubscriptionGate};
use session::SessionStore;
use store::UserStore;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: UserStore,
    pub sessions: SessionStore,
    pub flow: AuthFlow,
    pub gate: SubscriptionGate,
    pub dialogue: DialogueService,
}
