//! Application configuration loaded from environment variables.
//!
//! API keys are read once at startup and cached in memory; a missing key is
//! a startup-time fatal condition, not a per-request error.

use std::env;
use std::path::PathBuf;

/// Deployment environment, selects the OAuth callback URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Prod,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Base directory for durable per-user records
    pub data_dir: PathBuf,
    /// Deployment environment (dev/prod)
    pub environment: Environment,
    /// Public base URL of this service (prod only; dev uses localhost)
    pub public_url: String,
    /// Frontend URL for post-auth redirects
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Model identifier sent to the chat-completions API
    pub model: String,
    /// Retention window for the stale-record sweep, in days
    pub retention_days: u64,

    // --- Secrets ---
    /// Twitter OAuth1 consumer key
    pub twitter_consumer_key: String,
    /// Twitter OAuth1 consumer secret
    pub twitter_consumer_secret: String,
    /// xAI API key (chat completions)
    pub xai_api_key: String,
    /// Stripe secret API key
    pub stripe_api_key: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let environment = match env::var("ENVIRONMENT").as_deref() {
            Ok("prod") => Environment::Prod,
            _ => Environment::Dev,
        };

        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        let public_url = match environment {
            Environment::Dev => format!("http://localhost:{}", port),
            Environment::Prod => {
                env::var("PUBLIC_URL").map_err(|_| ConfigError::Missing("PUBLIC_URL"))?
            }
        };

        let xai_api_key =
            env::var("XAI_API_KEY").map_err(|_| ConfigError::Missing("XAI_API_KEY"))?;
        if !xai_api_key.starts_with("xai-") {
            return Err(ConfigError::Invalid(
                "XAI_API_KEY must start with 'xai-'".to_string(),
            ));
        }

        Ok(Self {
            data_dir: env::var("COACH_DATA_DIR")
                .map(PathBuf::from)
                .map_err(|_| ConfigError::Missing("COACH_DATA_DIR"))?,
            environment,
            public_url,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port,
            model: env::var("COACH_MODEL").unwrap_or_else(|_| "grok-2-latest".to_string()),
            retention_days: env::var("RETENTION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(90),
            twitter_consumer_key: env::var("TWITTER_CONSUMER_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("TWITTER_CONSUMER_KEY"))?,
            twitter_consumer_secret: env::var("TWITTER_CONSUMER_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("TWITTER_CONSUMER_SECRET"))?,
            xai_api_key,
            stripe_api_key: env::var("STRIPE_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRIPE_API_KEY"))?,
        })
    }

    /// OAuth callback URL for the current environment.
    pub fn callback_url(&self) -> String {
        format!("{}/auth/callback", self.public_url.trim_end_matches('/'))
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            data_dir: PathBuf::from("/tmp/health-coach-test"),
            environment: Environment::Dev,
            public_url: "http://localhost:8080".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            model: "grok-2-latest".to_string(),
            retention_days: 90,
            twitter_consumer_key: "test_consumer_key".to_string(),
            twitter_consumer_secret: "test_consumer_secret".to_string(),
            xai_api_key: "xai-test-key".to_string(),
            stripe_api_key: "sk_test_key".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
