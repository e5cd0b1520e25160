// SPDX-License-Identifier: MIT

//! Services module - business logic layer.

pub mod auth_flow;
pub mod billing;
pub mod dialogue;
pub mod model;
pub mod twitter;

pub use auth_flow::{AuthFlow, CallbackParams};
pub use billing::{BillingProvider, StripeClient, SubscriptionGate};
pub use dialogue::DialogueService;
pub use model::{ChatMessage, ChatModel, XaiClient};
pub use twitter::{AccessToken, IdentityProvider, RequestToken, TwitterClient};

/// Send a request, retrying once on a transient network failure.
///
/// Only used for calls that are safe to repeat (identity probe, billing
/// queries, model calls). The OAuth token fetch and exchange are never
/// retried: re-issuing a request-token fetch invalidates the pending one.
pub(crate) async fn send_with_retry(
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response, reqwest::Error> {
    let retry = request.try_clone();
    match request.send().await {
        Err(e) if e.is_timeout() || e.is_connect() => match retry {
            Some(retry) => {
                tracing::warn!(error = %e, "Transient network failure, retrying once");
                retry.send().await
            }
            None => Err(e),
        },
        other => other,
    }
}
