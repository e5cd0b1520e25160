// SPDX-License-Identifier: MIT

//! OAuth flow controller: the auth lifecycle state machine.
//!
//! The three-legged handshake spans two independent stateless HTTP
//! exchanges (the authorize redirect, then the callback redirect), so on
//! every request the controller reconstructs intent purely from the callback
//! parameters present in the request plus what the previous request stashed
//! in session state. The request-token secret must survive in the session:
//! the provider does not return it on callback and the access-token exchange
//! cannot complete without it.
//!
//! Phase transitions:
//! - `start`: NotStarted/Error -> AwaitingCallback (request-token fetch)
//! - callback with verifier + matching token: AwaitingCallback ->
//!   Authenticated, or Error on any exchange/probe failure
//! - `advance` while Authenticated: identity probe; a stale or revoked token
//!   silently re-enters NotStarted so the user is simply re-prompted

use crate::error::AppError;
use crate::services::IdentityProvider;
use crate::session::{AuthState, Session};
use crate::store::UserStore;
use std::sync::Arc;

/// Provider-side callback parameters, if present on the current request.
#[derive(Debug, Clone, Default)]
pub struct CallbackParams {
    pub oauth_token: Option<String>,
    pub oauth_verifier: Option<String>,
}

impl CallbackParams {
    /// Both parameters present: this request is the callback leg.
    fn callback(&self) -> Option<(&str, &str)> {
        match (&self.oauth_token, &self.oauth_verifier) {
            (Some(token), Some(verifier)) => Some((token, verifier)),
            _ => None,
        }
    }
}

/// Drives the five-phase handshake and reconciles session state with the
/// provider and the user directory store.
#[derive(Clone)]
pub struct AuthFlow {
    identity: Arc<dyn IdentityProvider>,
    callback_url: String,
}

impl AuthFlow {
    pub fn new(identity: Arc<dyn IdentityProvider>, callback_url: String) -> Self {
        Self {
            identity,
            callback_url,
        }
    }

    /// Explicit handshake trigger: fetch a request-token pair, stash it in
    /// the session, and return the provider's authorization URL.
    ///
    /// Idempotence: a pending request-token pair is discarded explicitly
    /// before a new fetch, never silently orphaned.
    pub async fn start(&self, session: &mut Session) -> Result<String, AppError> {
        if let AuthState::AwaitingCallback { request_token, .. } = &session.auth {
            tracing::info!(request_token, "Discarding pending request token before restart");
        }
        session.auth = AuthState::NotStarted;

        let pair = match self.identity.fetch_request_token(&self.callback_url).await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!(error = %e, "Request-token fetch failed");
                session.auth = AuthState::Error {
                    message: e.to_string(),
                };
                return Err(e);
            }
        };

        let authorize_url = self.identity.authorize_url(&pair.token);
        session.auth = AuthState::AwaitingCallback {
            request_token: pair.token,
            request_token_secret: pair.secret,
        };
        tracing::info!("Handshake started, awaiting provider callback");
        Ok(authorize_url)
    }

    /// Advance the state machine for one request.
    ///
    /// Returns the authenticated user id when the session holds (or has just
    /// obtained) validated credentials, `None` otherwise. Provider failures
    /// are mapped to a consistent phase with all credential fields cleared;
    /// they never propagate as errors and never leave a contradictory state.
    pub async fn advance(
        &self,
        params: &CallbackParams,
        session: &mut Session,
        store: &UserStore,
    ) -> Result<Option<String>, AppError> {
        if let Some((token, verifier)) = params.callback() {
            return self.handle_callback(token, verifier, session, store).await;
        }

        match session.auth.clone() {
            AuthState::Authenticated {
                access_token,
                access_token_secret,
                user_id,
            } => {
                match self
                    .identity
                    .verify_credentials(&access_token, &access_token_secret)
                    .await
                {
                    Ok(_handle) => Ok(Some(user_id)),
                    Err(e) => {
                        // Stale or revoked token: silent re-prompt, not a
                        // hard failure
                        tracing::warn!(user_id, error = %e, "Token validation failed, resetting auth");
                        session.auth = AuthState::NotStarted;
                        Ok(None)
                    }
                }
            }
            AuthState::NotStarted
            | AuthState::AwaitingCallback { .. }
            | AuthState::Error { .. } => Ok(None),
        }
    }

    /// Process the callback leg: exchange the request token + verifier for
    /// an access-token pair, probe the caller's identity, and reconcile the
    /// session with the durable user record.
    async fn handle_callback(
        &self,
        oauth_token: &str,
        verifier: &str,
        session: &mut Session,
        store: &UserStore,
    ) -> Result<Option<String>, AppError> {
        let request_token_secret = match &session.auth {
            AuthState::AwaitingCallback {
                request_token,
                request_token_secret,
            } if request_token == oauth_token => request_token_secret.clone(),
            AuthState::AwaitingCallback { request_token, .. } => {
                tracing::error!(
                    expected = %request_token,
                    received = %oauth_token,
                    "Callback token does not match pending request token"
                );
                session.auth = AuthState::Error {
                    message: "callback token mismatch".to_string(),
                };
                return Ok(None);
            }
            _ => {
                tracing::error!("Callback received with no pending request token");
                session.auth = AuthState::Error {
                    message: "no handshake in progress".to_string(),
                };
                return Ok(None);
            }
        };

        let access = match self
            .identity
            .exchange_access_token(oauth_token, &request_token_secret, verifier)
            .await
        {
            Ok(access) => access,
            Err(e) => {
                tracing::error!(error = %e, "Access-token exchange failed");
                session.auth = AuthState::Error {
                    message: e.to_string(),
                };
                return Ok(None);
            }
        };

        // Verify the fresh credential by fetching the caller's own identity
        let user_id = match self
            .identity
            .verify_credentials(&access.token, &access.secret)
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, "Identity probe failed after exchange");
                session.auth = AuthState::Error {
                    message: e.to_string(),
                };
                return Ok(None);
            }
        };

        // Materialize the user record (directory plus default attribute
        // selection) and reconcile the conversation log: a persisted log
        // wins over the (pre-auth) session log.
        store.ensure(&user_id)?;
        store.load_attributes(&user_id)?;
        let persisted = store.load_conversation(&user_id)?;
        if persisted.is_empty() && !session.conversation.is_empty() {
            store.save_conversation(&user_id, &session.conversation)?;
        } else {
            session.conversation = persisted;
        }

        tracing::info!(user_id, "Authentication successful");
        session.auth = AuthState::Authenticated {
            access_token: access.token,
            access_token_secret: access.secret,
            user_id: user_id.clone(),
        };
        Ok(Some(user_id))
    }
}
