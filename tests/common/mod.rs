// SPDX-License-Identifier: MIT

//! Shared test harness: a full app wired to scriptable provider mocks.

use async_trait::async_trait;
use health_coach::config::Config;
use health_coach::error::AppError;
use health_coach::models::AttributeCatalog;
use health_coach::routes::create_router;
use health_coach::services::{
    AccessToken, AuthFlow, BillingProvider, ChatMessage, ChatModel, DialogueService,
    IdentityProvider, RequestToken, SubscriptionGate,
};
use health_coach::session::SessionStore;
use health_coach::store::UserStore;
use health_coach::AppState;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Identity provider that completes the handshake for user `alice` with the
/// fixed token pairs ("rt1","rts1") -> ("at1","ats1").
#[derive(Default)]
pub struct MockIdentity {
    pub revoked: AtomicBool,
    pub request_token_fetches: AtomicUsize,
}

#[async_trait]
impl IdentityProvider for MockIdentity {
    async fn fetch_request_token(&self, _callback: &str) -> Result<RequestToken, AppError> {
        self.request_token_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(RequestToken {
            token: "rt1".to_string(),
            secret: "rts1".to_string(),
        })
    }

    fn authorize_url(&self, request_token: &str) -> String {
        format!("https://provider.test/authorize?oauth_token={request_token}")
    }

    async fn exchange_access_token(
        &self,
        request_token: &str,
        request_token_secret: &str,
        _verifier: &str,
    ) -> Result<AccessToken, AppError> {
        if request_token != "rt1" || request_token_secret != "rts1" {
            return Err(AppError::Provider("unknown request token".to_string()));
        }
        Ok(AccessToken {
            token: "at1".to_string(),
            secret: "ats1".to_string(),
        })
    }

    async fn verify_credentials(&self, _token: &str, _secret: &str) -> Result<String, AppError> {
        if self.revoked.load(Ordering::SeqCst) {
            return Err(AppError::Provider("credential revoked".to_string()));
        }
        Ok("alice".to_string())
    }
}

/// Billing provider with a switchable subscription status.
pub struct MockBilling {
    pub active: AtomicBool,
    pub creates: AtomicUsize,
}

impl Default for MockBilling {
    fn default() -> Self {
        Self {
            active: AtomicBool::new(true),
            creates: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl BillingProvider for MockBilling {
    async fn create_customer(&self, _email: &str) -> Result<String, AppError> {
        let n = self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(format!("cus_test_{n}"))
    }

    async fn has_active_subscription(&self, _customer_id: &str) -> Result<bool, AppError> {
        Ok(self.active.load(Ordering::SeqCst))
    }
}

/// Model that echoes the last user message.
#[derive(Default)]
pub struct MockModel;

#[async_trait]
impl ChatModel for MockModel {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, AppError> {
        let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        Ok(format!("coach heard: {last}"))
    }
}

/// Handles to the mocks wired into a test app.
pub struct TestMocks {
    pub identity: Arc<MockIdentity>,
    pub billing: Arc<MockBilling>,
}

/// Create a test app over a temp data directory with mock providers.
/// Returns the router, the shared state, the mock handles, and the temp dir
/// guard (dropping it deletes the data directory).
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, TestMocks, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = Config::test_default();
    config.data_dir = dir.path().to_path_buf();

    let store = UserStore::new(&config.data_dir).expect("user store");
    let sessions = SessionStore::new();

    let identity = Arc::new(MockIdentity::default());
    let billing = Arc::new(MockBilling::default());

    let flow = AuthFlow::new(identity.clone(), config.callback_url());
    let gate = SubscriptionGate::new(billing.clone(), store.clone());
    let dialogue = DialogueService::new(Arc::new(MockModel), AttributeCatalog::default());

    let state = Arc::new(AppState {
        config,
        store,
        sessions,
        flow,
        gate,
        dialogue,
    });

    let app = create_router(state.clone());
    (app, state, TestMocks { identity, billing }, dir)
}
