// SPDX-License-Identifier: MIT

//! Stripe billing client and the subscription gate.

use crate::error::AppError;
use crate::models::BillingCustomer;
use crate::store::UserStore;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Billing provider seam, mockable in tests.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Create a customer record; returns the provider's customer id.
    async fn create_customer(&self, email: &str) -> Result<String, AppError>;

    /// Whether the customer has a subscription with status `active`.
    async fn has_active_subscription(&self, customer_id: &str) -> Result<bool, AppError>;
}

/// Stripe REST API client.
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl StripeClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, "https://api.stripe.com")
    }

    /// Override the API base URL (tests point this at a local mock).
    pub fn with_base_url(api_key: String, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .expect("failed building HTTP client"),
            base_url: base_url.into(),
            api_key,
        }
    }

    async fn check_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Billing(format!("HTTP {}: {}", status, body)));
        }
        response
            .json()
            .await
            .map_err(|e| AppError::Billing(format!("JSON parse error: {}", e)))
    }
}

#[derive(Deserialize)]
struct CustomerResponse {
    id: String,
}

#[derive(Deserialize)]
struct SubscriptionList {
    data: Vec<Subscription>,
}

#[derive(Deserialize)]
struct Subscription {
    status: String,
}

#[async_trait]
impl BillingProvider for StripeClient {
    async fn create_customer(&self, email: &str) -> Result<String, AppError> {
        let url = format!("{}/v1/customers", self.base_url);
        // Not retried: a repeat would create a second customer record
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .form(&[("email", email)])
            .send()
            .await
            .map_err(|e| AppError::Billing(e.to_string()))?;

        let customer: CustomerResponse = Self::check_json(response).await?;
        tracing::info!(customer_id = %customer.id, "Created billing customer");
        Ok(customer.id)
    }

    async fn has_active_subscription(&self, customer_id: &str) -> Result<bool, AppError> {
        let url = format!("{}/v1/subscriptions", self.base_url);
        let request = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&[("customer", customer_id)]);

        let response = super::send_with_retry(request)
            .await
            .map_err(|e| AppError::Billing(e.to_string()))?;

        let list: SubscriptionList = Self::check_json(response).await?;
        Ok(list.data.iter().any(|s| s.status == "active"))
    }
}

/// Gates the chat feature behind an active subscription.
///
/// The billing customer id is created lazily, persisted one-to-one with the
/// user id, and never created twice. Any provider error surfaces to the
/// caller; the gate fails closed.
#[derive(Clone)]
pub struct SubscriptionGate {
    billing: Arc<dyn BillingProvider>,
    store: UserStore,
}

impl SubscriptionGate {
    pub fn new(billing: Arc<dyn BillingProvider>, store: UserStore) -> Self {
        Self { billing, store }
    }

    /// Look up the stored billing customer id, creating one on first use.
    ///
    /// Idempotent: once a customer id is persisted, repeated calls return it
    /// without touching the provider.
    pub async fn get_or_create_customer(&self, user_id: &str) -> Result<String, AppError> {
        if let Some(customer) = self.store.load_billing_customer(user_id)? {
            return Ok(customer.customer_id);
        }

        let email = format!("{}@example.com", user_id);
        let customer_id = self.billing.create_customer(&email).await?;
        self.store.save_billing_customer(
            user_id,
            &BillingCustomer {
                customer_id: customer_id.clone(),
            },
        )?;
        Ok(customer_id)
    }

    /// Whether the user's billing status permits use of the chat feature.
    pub async fn is_entitled(&self, user_id: &str) -> Result<bool, AppError> {
        let customer_id = self.get_or_create_customer(user_id).await?;
        self.billing.has_active_subscription(&customer_id).await
    }
}
