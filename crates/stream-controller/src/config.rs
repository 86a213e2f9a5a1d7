//! Stream Controller configuration.
//!
//! Configuration is loaded from environment variables once at startup and is
//! never mutated afterwards. The API key secret and the Redis URL are
//! redacted in Debug output.

use common::jwt::{DEFAULT_ACCESS_TOKEN_TTL, MAX_ACCESS_TOKEN_TTL};
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:5000";

/// Default Redis URL for the viewer counter store.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Default base URL of the platform's room API.
pub const DEFAULT_VIDEO_BASE_URL: &str = "https://video.twilio.com";

/// Default base URL of the platform's publisher endpoint / processor API.
pub const DEFAULT_MEDIA_BASE_URL: &str = "https://media.twilio.com";

/// Default per-call timeout for platform requests in seconds.
pub const DEFAULT_PLATFORM_TIMEOUT_SECONDS: u64 = 10;

/// Largest accepted platform request timeout in seconds.
pub const MAX_PLATFORM_TIMEOUT_SECONDS: u64 = 60;

/// Default per-operation timeout for the counter store in milliseconds.
pub const DEFAULT_COUNTER_TIMEOUT_MILLISECONDS: u64 = 2000;

/// Largest accepted counter store timeout in milliseconds.
pub const MAX_COUNTER_TIMEOUT_MILLISECONDS: u64 = 10_000;

/// Slack added on top of the slowest session operation before the HTTP
/// layer gives up on a request.
pub const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(5);

/// Most platform calls a single request chains (start and end make three).
const MAX_PLATFORM_CALLS_PER_REQUEST: u32 = 3;

/// Stream Controller configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:5000").
    pub bind_address: String,

    /// Platform account identifier, used as the `sub` of access tokens.
    pub account_sid: String,

    /// Platform API key identifier, used for REST auth and as token `iss`.
    pub api_key_sid: String,

    /// Platform API key secret (credential-signing material).
    pub api_key_secret: SecretString,

    /// Viewer counter store connection URL. May carry a password.
    pub redis_url: SecretString,

    /// Base URL for room lifecycle calls.
    pub video_base_url: String,

    /// Base URL for publisher endpoint and processor calls.
    pub media_base_url: String,

    /// Bound on every platform round-trip.
    pub platform_request_timeout: Duration,

    /// Bound on every counter store operation.
    pub counter_timeout: Duration,

    /// Lifetime of publisher credentials.
    pub publisher_token_ttl: Duration,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("account_sid", &self.account_sid)
            .field("api_key_sid", &self.api_key_sid)
            .field("api_key_secret", &"[REDACTED]")
            .field("redis_url", &"[REDACTED]")
            .field("video_base_url", &self.video_base_url)
            .field("media_base_url", &self.media_base_url)
            .field("platform_request_timeout", &self.platform_request_timeout)
            .field("counter_timeout", &self.counter_timeout)
            .field("publisher_token_ttl", &self.publisher_token_ttl)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid platform request timeout configuration: {0}")]
    InvalidPlatformTimeout(String),

    #[error("Invalid counter timeout configuration: {0}")]
    InvalidCounterTimeout(String),

    #[error("Invalid publisher token TTL configuration: {0}")]
    InvalidTokenTtl(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let account_sid = required(vars, "PLATFORM_ACCOUNT_SID")?;
        let api_key_sid = required(vars, "PLATFORM_API_KEY_SID")?;
        let api_key_secret = SecretString::from(required(vars, "PLATFORM_API_KEY_SECRET")?);

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let redis_url = SecretString::from(
            vars.get("REDIS_URL")
                .cloned()
                .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
        );

        let video_base_url = vars
            .get("PLATFORM_VIDEO_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_VIDEO_BASE_URL.to_string());

        let media_base_url = vars
            .get("PLATFORM_MEDIA_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_MEDIA_BASE_URL.to_string());

        // Parse platform timeout with validation
        let platform_timeout_secs =
            if let Some(value_str) = vars.get("PLATFORM_REQUEST_TIMEOUT_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidPlatformTimeout(format!(
                        "PLATFORM_REQUEST_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidPlatformTimeout(
                        "PLATFORM_REQUEST_TIMEOUT_SECONDS must be greater than 0".to_string(),
                    ));
                }

                if value > MAX_PLATFORM_TIMEOUT_SECONDS {
                    return Err(ConfigError::InvalidPlatformTimeout(format!(
                        "PLATFORM_REQUEST_TIMEOUT_SECONDS must not exceed {} seconds, got {}",
                        MAX_PLATFORM_TIMEOUT_SECONDS, value
                    )));
                }

                value
            } else {
                DEFAULT_PLATFORM_TIMEOUT_SECONDS
            };

        // Parse counter timeout with validation
        let counter_timeout_ms = if let Some(value_str) = vars.get("COUNTER_TIMEOUT_MILLISECONDS")
        {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidCounterTimeout(format!(
                    "COUNTER_TIMEOUT_MILLISECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidCounterTimeout(
                    "COUNTER_TIMEOUT_MILLISECONDS must be greater than 0".to_string(),
                ));
            }

            if value > MAX_COUNTER_TIMEOUT_MILLISECONDS {
                return Err(ConfigError::InvalidCounterTimeout(format!(
                    "COUNTER_TIMEOUT_MILLISECONDS must not exceed {}, got {}",
                    MAX_COUNTER_TIMEOUT_MILLISECONDS, value
                )));
            }

            value
        } else {
            DEFAULT_COUNTER_TIMEOUT_MILLISECONDS
        };

        // Parse publisher token TTL with validation
        let publisher_token_ttl = if let Some(value_str) = vars.get("PUBLISHER_TOKEN_TTL_SECONDS")
        {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidTokenTtl(format!(
                    "PUBLISHER_TOKEN_TTL_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidTokenTtl(
                    "PUBLISHER_TOKEN_TTL_SECONDS must be greater than 0".to_string(),
                ));
            }

            if value > MAX_ACCESS_TOKEN_TTL.as_secs() {
                return Err(ConfigError::InvalidTokenTtl(format!(
                    "PUBLISHER_TOKEN_TTL_SECONDS must not exceed {} seconds, got {}",
                    MAX_ACCESS_TOKEN_TTL.as_secs(),
                    value
                )));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_ACCESS_TOKEN_TTL
        };

        Ok(Config {
            bind_address,
            account_sid,
            api_key_sid,
            api_key_secret,
            redis_url,
            video_base_url,
            media_base_url,
            platform_request_timeout: Duration::from_secs(platform_timeout_secs),
            counter_timeout: Duration::from_millis(counter_timeout_ms),
            publisher_token_ttl,
        })
    }

    /// Whole-request deadline for the HTTP layer.
    ///
    /// Start and end chain up to three platform calls and one counter call,
    /// each bounded on its own. The request deadline must outlast all of them
    /// so the coordinator always gets to report a partial failure instead of
    /// being dropped mid-sequence.
    pub fn request_timeout(&self) -> Duration {
        self.platform_request_timeout * MAX_PLATFORM_CALLS_PER_REQUEST
            + self.counter_timeout
            + REQUEST_TIMEOUT_MARGIN
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|value| !value.is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::ExposeSecret;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            ("PLATFORM_ACCOUNT_SID".to_string(), "AC-test".to_string()),
            ("PLATFORM_API_KEY_SID".to_string(), "SK-test".to_string()),
            (
                "PLATFORM_API_KEY_SECRET".to_string(),
                "super-secret".to_string(),
            ),
        ])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.account_sid, "AC-test");
        assert_eq!(config.api_key_sid, "SK-test");
        assert_eq!(config.api_key_secret.expose_secret(), "super-secret");
        assert_eq!(config.redis_url.expose_secret(), DEFAULT_REDIS_URL);
        assert_eq!(config.video_base_url, DEFAULT_VIDEO_BASE_URL);
        assert_eq!(config.media_base_url, DEFAULT_MEDIA_BASE_URL);
        assert_eq!(
            config.platform_request_timeout,
            Duration::from_secs(DEFAULT_PLATFORM_TIMEOUT_SECONDS)
        );
        assert_eq!(
            config.counter_timeout,
            Duration::from_millis(DEFAULT_COUNTER_TIMEOUT_MILLISECONDS)
        );
        assert_eq!(config.publisher_token_ttl, DEFAULT_ACCESS_TOKEN_TTL);
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());
        vars.insert(
            "REDIS_URL".to_string(),
            "redis://:pw@cache:6379".to_string(),
        );
        vars.insert(
            "PLATFORM_VIDEO_BASE_URL".to_string(),
            "http://127.0.0.1:4000/".to_string(),
        );
        vars.insert(
            "PLATFORM_MEDIA_BASE_URL".to_string(),
            "http://127.0.0.1:4001".to_string(),
        );
        vars.insert(
            "PLATFORM_REQUEST_TIMEOUT_SECONDS".to_string(),
            "3".to_string(),
        );
        vars.insert("COUNTER_TIMEOUT_MILLISECONDS".to_string(), "250".to_string());
        vars.insert("PUBLISHER_TOKEN_TTL_SECONDS".to_string(), "600".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.redis_url.expose_secret(), "redis://:pw@cache:6379");
        // Trailing slash is trimmed so paths can be joined with format!
        assert_eq!(config.video_base_url, "http://127.0.0.1:4000");
        assert_eq!(config.media_base_url, "http://127.0.0.1:4001");
        assert_eq!(config.platform_request_timeout, Duration::from_secs(3));
        assert_eq!(config.counter_timeout, Duration::from_millis(250));
        assert_eq!(config.publisher_token_ttl, Duration::from_secs(600));
    }

    #[test]
    fn test_from_vars_missing_account_sid() {
        let mut vars = base_vars();
        vars.remove("PLATFORM_ACCOUNT_SID");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "PLATFORM_ACCOUNT_SID"));
    }

    #[test]
    fn test_from_vars_empty_secret_is_missing() {
        let mut vars = base_vars();
        vars.insert("PLATFORM_API_KEY_SECRET".to_string(), String::new());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "PLATFORM_API_KEY_SECRET")
        );
    }

    #[test]
    fn test_platform_timeout_rejects_zero() {
        let mut vars = base_vars();
        vars.insert(
            "PLATFORM_REQUEST_TIMEOUT_SECONDS".to_string(),
            "0".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidPlatformTimeout(msg)) if msg.contains("must be greater than 0"))
        );
    }

    #[test]
    fn test_platform_timeout_rejects_too_large() {
        let mut vars = base_vars();
        vars.insert(
            "PLATFORM_REQUEST_TIMEOUT_SECONDS".to_string(),
            "61".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidPlatformTimeout(msg)) if msg.contains("must not exceed 60"))
        );
    }

    #[test]
    fn test_counter_timeout_rejects_non_numeric() {
        let mut vars = base_vars();
        vars.insert(
            "COUNTER_TIMEOUT_MILLISECONDS".to_string(),
            "fast".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidCounterTimeout(msg)) if msg.contains("must be a valid positive integer"))
        );
    }

    #[test]
    fn test_counter_timeout_rejects_too_large() {
        let mut vars = base_vars();
        vars.insert(
            "COUNTER_TIMEOUT_MILLISECONDS".to_string(),
            "10001".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidCounterTimeout(msg)) if msg.contains("must not exceed 10000"))
        );
    }

    #[test]
    fn test_request_timeout_outlasts_session_call_chain() {
        let mut vars = base_vars();
        vars.insert(
            "PLATFORM_REQUEST_TIMEOUT_SECONDS".to_string(),
            "20".to_string(),
        );
        vars.insert("COUNTER_TIMEOUT_MILLISECONDS".to_string(), "500".to_string());
        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.request_timeout(), Duration::from_millis(65_500));
        assert!(
            config.request_timeout() > config.platform_request_timeout * 3 + config.counter_timeout
        );
    }

    #[test]
    fn test_request_timeout_at_maximum_settings() {
        let mut vars = base_vars();
        vars.insert(
            "PLATFORM_REQUEST_TIMEOUT_SECONDS".to_string(),
            MAX_PLATFORM_TIMEOUT_SECONDS.to_string(),
        );
        vars.insert(
            "COUNTER_TIMEOUT_MILLISECONDS".to_string(),
            MAX_COUNTER_TIMEOUT_MILLISECONDS.to_string(),
        );
        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.request_timeout(), Duration::from_secs(195));
    }

    #[test]
    fn test_token_ttl_rejects_above_maximum() {
        let mut vars = base_vars();
        vars.insert(
            "PUBLISHER_TOKEN_TTL_SECONDS".to_string(),
            "86401".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidTokenTtl(msg)) if msg.contains("must not exceed 86400"))
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut vars = base_vars();
        vars.insert(
            "REDIS_URL".to_string(),
            "redis://:hunter2@cache:6379".to_string(),
        );
        let config = Config::from_vars(&vars).expect("Config should load successfully");

        let debug_str = format!("{:?}", config);
        assert!(!debug_str.contains("super-secret"));
        assert!(!debug_str.contains("hunter2"));
        assert!(debug_str.contains("[REDACTED]"));
        assert!(debug_str.contains("SK-test"));
    }
}
