// SPDX-License-Identifier: MIT

//! Health-Coach API Server
//!
//! Authenticates users via Twitter OAuth1, persists per-user coaching state,
//! and forwards conversation turns to the xAI chat-completions API behind a
//! Stripe subscription gate.

use health_coach::{
    config::Config,
    models::AttributeCatalog,
    services::{AuthFlow, DialogueService, StripeClient, SubscriptionGate, TwitterClient, XaiClient},
    session::SessionStore,
    store::UserStore,
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Server-side sessions idle this long are dropped; the user signs in again.
const SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    // Load configuration from environment; missing keys are fatal here
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Health-Coach API");

    // Durable per-user storage
    let store = UserStore::new(&config.data_dir).expect("Failed to initialize user store");
    tracing::info!(data_dir = %config.data_dir.display(), "User store initialized");

    // In-memory session map
    let sessions = SessionStore::new();

    // Attribute catalog (file override under the data dir, else built-in)
    let catalog = AttributeCatalog::load_or_default(&config.data_dir);

    // Provider clients
    let twitter = Arc::new(TwitterClient::new(
        config.twitter_consumer_key.clone(),
        config.twitter_consumer_secret.clone(),
    ));
    let stripe = Arc::new(StripeClient::new(config.stripe_api_key.clone()));
    let xai = Arc::new(XaiClient::new(
        config.xai_api_key.clone(),
        config.model.clone(),
    ));

    let flow = AuthFlow::new(twitter, config.callback_url());
    let gate = SubscriptionGate::new(stripe, store.clone());
    let dialogue = DialogueService::new(xai, catalog);

    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        sessions,
        flow,
        gate,
        dialogue,
    });

    // Periodic retention sweep for stale user records
    spawn_sweep(state.clone());

    // Build router
    let app = health_coach::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Spawn the daily sweep: expire idle sessions, then remove user records
/// past the retention window.
fn spawn_sweep(state: Arc<AppState>) {
    let retention = Duration::from_secs(state.config.retention_days * 24 * 60 * 60);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let expired = state.sessions.expire_idle(SESSION_TTL);
            if expired > 0 {
                tracing::info!(expired, "Expired idle sessions");
            }
            let active = state.sessions.active_user_ids();
            match state.store.sweep(retention, &active) {
                Ok(removed) if removed > 0 => {
                    tracing::info!(removed, "Retention sweep removed stale user records")
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Retention sweep failed"),
            }
        }
    });
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("health_coach=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
