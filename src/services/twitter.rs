// SPDX-License-Identifier: MIT

//! Twitter OAuth1 client.
//!
//! Implements the three provider-side legs of the three-legged handshake:
//! - request-token fetch (with callback URL)
//! - access-token exchange (request token + secret + verifier)
//! - identity probe (`verify_credentials`, returns the caller's handle)
//!
//! Requests are signed with HMAC-SHA1 per RFC 5849. The token fetch and
//! exchange are never retried; the identity probe retries once on a
//! transient network failure.

use crate::error::AppError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use serde::Deserialize;
use sha1::Sha1;
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha1 = Hmac<Sha1>;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Short-lived credential pair authorizing the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    pub token: String,
    pub secret: String,
}

/// Long-lived credential pair for the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub secret: String,
}

/// OAuth1 identity provider seam, mockable in tests.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Fetch a request-token pair, registering the callback URL.
    async fn fetch_request_token(&self, callback_url: &str) -> Result<RequestToken, AppError>;

    /// Browser-mediated authorization URL for a request token.
    fn authorize_url(&self, request_token: &str) -> String;

    /// Exchange request token + secret + verifier for an access-token pair.
    async fn exchange_access_token(
        &self,
        request_token: &str,
        request_token_secret: &str,
        verifier: &str,
    ) -> Result<AccessToken, AppError>;

    /// Lightweight identity probe; returns the caller's stable handle.
    async fn verify_credentials(
        &self,
        access_token: &str,
        access_token_secret: &str,
    ) -> Result<String, AppError>;
}

/// Twitter API client with OAuth1 request signing.
#[derive(Clone)]
pub struct TwitterClient {
    http: reqwest::Client,
    base_url: String,
    consumer_key: String,
    consumer_secret: String,
    rng: SystemRandom,
}

impl TwitterClient {
    pub fn new(consumer_key: String, consumer_secret: String) -> Self {
        Self::with_base_url(consumer_key, consumer_secret, "https://api.twitter.com")
    }

    /// Override the API base URL (tests point this at a local mock).
    pub fn with_base_url(
        consumer_key: String,
        consumer_secret: String,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .expect("failed building HTTP client"),
            base_url: base_url.into(),
            consumer_key,
            consumer_secret,
            rng: SystemRandom::new(),
        }
    }

    /// Build the `Authorization: OAuth ...` header for a request.
    fn oauth_header(
        &self,
        method: &str,
        url: &str,
        extra_params: &[(&str, &str)],
        token_secret: &str,
    ) -> Result<String, AppError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
            .as_secs()
            .to_string();

        let mut nonce_bytes = [0u8; 16];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG unavailable")))?;
        let nonce = hex::encode(nonce_bytes);

        let mut params: Vec<(String, String)> = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), timestamp),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];
        for (k, v) in extra_params {
            params.push((k.to_string(), v.to_string()));
        }

        let base = signature_base_string(method, url, &params);
        let signature = hmac_sha1_signature(&base, &self.consumer_secret, token_secret)?;
        params.push(("oauth_signature".to_string(), signature));

        let header = params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent(k), percent(v)))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("OAuth {}", header))
    }

    /// POST to a token endpoint and parse the form-encoded token response.
    async fn token_request(
        &self,
        path: &str,
        oauth_params: &[(&str, &str)],
        token_secret: &str,
    ) -> Result<HashMap<String, String>, AppError> {
        let url = format!("{}{}", self.base_url, path);
        let header = self.oauth_header("POST", &url, oauth_params, token_secret)?;

        // No retry: re-issuing invalidates the pending token
        let response = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, header)
            .send()
            .await
            .map_err(|e| AppError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Provider(format!("HTTP {}: {}", status, body)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::Provider(e.to_string()))?;
        Ok(parse_form(&body))
    }
}

#[async_trait]
impl IdentityProvider for TwitterClient {
    async fn fetch_request_token(&self, callback_url: &str) -> Result<RequestToken, AppError> {
        let fields = self
            .token_request(
                "/oauth/request_token",
                &[("oauth_callback", callback_url)],
                "",
            )
            .await?;

        match (fields.get("oauth_token"), fields.get("oauth_token_secret")) {
            (Some(token), Some(secret)) => Ok(RequestToken {
                token: token.clone(),
                secret: secret.clone(),
            }),
            _ => Err(AppError::Provider(
                "request_token response missing token pair".to_string(),
            )),
        }
    }

    fn authorize_url(&self, request_token: &str) -> String {
        format!(
            "{}/oauth/authorize?oauth_token={}",
            self.base_url,
            urlencoding::encode(request_token)
        )
    }

    async fn exchange_access_token(
        &self,
        request_token: &str,
        request_token_secret: &str,
        verifier: &str,
    ) -> Result<AccessToken, AppError> {
        let fields = self
            .token_request(
                "/oauth/access_token",
                &[
                    ("oauth_token", request_token),
                    ("oauth_verifier", verifier),
                ],
                request_token_secret,
            )
            .await?;

        match (fields.get("oauth_token"), fields.get("oauth_token_secret")) {
            (Some(token), Some(secret)) => Ok(AccessToken {
                token: token.clone(),
                secret: secret.clone(),
            }),
            _ => Err(AppError::Provider(
                "access_token response missing token pair".to_string(),
            )),
        }
    }

    async fn verify_credentials(
        &self,
        access_token: &str,
        access_token_secret: &str,
    ) -> Result<String, AppError> {
        #[derive(Deserialize)]
        struct VerifyResponse {
            screen_name: String,
        }

        let url = format!("{}/1.1/account/verify_credentials.json", self.base_url);
        let header = self.oauth_header(
            "GET",
            &url,
            &[("oauth_token", access_token)],
            access_token_secret,
        )?;

        let request = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, header);

        let response = super::send_with_retry(request)
            .await
            .map_err(|e| AppError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Provider(format!("HTTP {}: {}", status, body)));
        }

        let me: VerifyResponse = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("JSON parse error: {}", e)))?;
        Ok(me.screen_name)
    }
}

/// RFC 5849 percent-encoding (unreserved characters only).
fn percent(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

/// Build the OAuth1 signature base string: method, encoded URL, and the
/// encoded, sorted parameter string.
fn signature_base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent(k), percent(v)))
        .collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}&{}&{}", method, percent(url), percent(&param_string))
}

/// HMAC-SHA1 over the base string, keyed by the encoded secrets.
fn hmac_sha1_signature(
    base: &str,
    consumer_secret: &str,
    token_secret: &str,
) -> Result<String, AppError> {
    let key = format!("{}&{}", percent(consumer_secret), percent(token_secret));
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(base.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Parse a form-encoded token response body.
fn parse_form(body: &str) -> HashMap<String, String> {
    body.split('&')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            Some((
                urlencoding::decode(k).ok()?.into_owned(),
                urlencoding::decode(v).ok()?.into_owned(),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference vector from the Twitter "creating a signature" docs.
    #[test]
    fn test_hmac_sha1_signature_reference_vector() {
        let params: Vec<(String, String)> = [
            ("status", "Hello Ladies + Gentlemen, a signed OAuth request!"),
            ("include_entities", "true"),
            ("oauth_consumer_key", "xvz1evFS4wEEPTGEFPHBog"),
            ("oauth_nonce", "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg"),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", "1318622958"),
            ("oauth_token", "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb"),
            ("oauth_version", "1.0"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let base = signature_base_string(
            "POST",
            "https://api.twitter.com/1/statuses/update.json",
            &params,
        );
        let signature = hmac_sha1_signature(
            &base,
            "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw",
            "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE",
        )
        .unwrap();

        assert_eq!(signature, "tnnArxj06cWHq44gCs1OSKk/jLY=");
    }

    #[test]
    fn test_base_string_sorts_encoded_params() {
        let params = vec![
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1".to_string()),
        ];
        let base = signature_base_string("GET", "http://example.com/x", &params);
        assert_eq!(base, "GET&http%3A%2F%2Fexample.com%2Fx&a%3D1%26b%3D2");
    }

    #[test]
    fn test_parse_form_decodes_values() {
        let fields = parse_form("oauth_token=rt%2F1&oauth_token_secret=rts1&extra");
        assert_eq!(fields.get("oauth_token").unwrap(), "rt/1");
        assert_eq!(fields.get("oauth_token_secret").unwrap(), "rts1");
        assert!(!fields.contains_key("extra"));
    }

    #[test]
    fn test_authorize_url_encodes_token() {
        let client = TwitterClient::new("k".to_string(), "s".to_string());
        assert_eq!(
            client.authorize_url("a b"),
            "https://api.twitter.com/oauth/authorize?oauth_token=a%20b"
        );
    }
}
