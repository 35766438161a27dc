//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MAGENTO_GRAPHQL_URL` - GraphQL endpoint of the commerce platform
//!   (e.g., `https://shop.example.com/graphql`)
//!
//! ## Optional
//! - `MAGENTO_STORE_CODE` - Store view code sent as the `Store` header
//! - `MAGENTO_CUSTOMER_TOKEN` - Customer bearer token (issued by the platform at sign-in)
//! - `MAGENTO_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `MIBOOKS_CART_STORE_PATH` - Cart identifier file (default: .mibooks/cart.json)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CART_STORE_PATH: &str = ".mibooks/cart.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront cart client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Commerce platform GraphQL configuration
    pub magento: MagentoConfig,
    /// File holding the persisted cart identifier
    pub cart_store_path: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Magento GraphQL API configuration.
///
/// Implements `Debug` manually to redact the customer token.
#[derive(Clone)]
pub struct MagentoConfig {
    /// GraphQL endpoint URL
    pub graphql_url: Url,
    /// Store view code (sent as the `Store` header)
    pub store_code: Option<String>,
    /// Customer bearer token for authenticated cart operations
    pub customer_token: Option<SecretString>,
    /// Timeout applied to every request
    pub request_timeout: Duration,
}

impl std::fmt::Debug for MagentoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MagentoConfig")
            .field("graphql_url", &self.graphql_url.as_str())
            .field("store_code", &self.store_code)
            .field(
                "customer_token",
                &self.customer_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let magento = MagentoConfig::from_env()?;
        let cart_store_path =
            PathBuf::from(get_env_or_default("MIBOOKS_CART_STORE_PATH", DEFAULT_CART_STORE_PATH));
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");

        Ok(Self {
            magento,
            cart_store_path,
            sentry_dsn,
            sentry_environment,
        })
    }
}

impl MagentoConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let graphql_url = parse_endpoint(&get_required_env("MAGENTO_GRAPHQL_URL")?)?;
        let request_timeout = get_env_or_default(
            "MAGENTO_REQUEST_TIMEOUT_SECS",
            &DEFAULT_REQUEST_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("MAGENTO_REQUEST_TIMEOUT_SECS".to_string(), e.to_string())
        })?;

        let customer_token = parse_customer_token(get_optional_env("MAGENTO_CUSTOMER_TOKEN"))?;

        Ok(Self {
            graphql_url,
            store_code: get_optional_env("MAGENTO_STORE_CODE"),
            customer_token,
            request_timeout: Duration::from_secs(request_timeout),
        })
    }

    /// Configuration for an endpoint with defaults for everything else.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the endpoint is not an absolute http(s) URL.
    pub fn for_endpoint(endpoint: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            graphql_url: parse_endpoint(endpoint)?,
            store_code: None,
            customer_token: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        })
    }

    /// Whether a customer token is configured.
    #[must_use]
    pub const fn has_customer_token(&self) -> bool {
        self.customer_token.is_some()
    }

    pub(crate) fn bearer_header(&self) -> Option<String> {
        self.customer_token
            .as_ref()
            .map(|token| format!("Bearer {}", token.expose_secret()))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse and check the GraphQL endpoint URL.
fn parse_endpoint(value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar("MAGENTO_GRAPHQL_URL".to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "MAGENTO_GRAPHQL_URL".to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Wrap the customer token as a secret.
///
/// The token is issued by the platform and opaque to us, so the only check
/// is that it is not blank.
fn parse_customer_token(token: Option<String>) -> Result<Option<SecretString>, ConfigError> {
    match token {
        Some(token) if token.trim().is_empty() => Err(ConfigError::InvalidEnvVar(
            "MAGENTO_CUSTOMER_TOKEN".to_string(),
            "token is blank".to_string(),
        )),
        Some(token) => Ok(Some(SecretString::from(token))),
        None => Ok(None),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_token_is_opaque() {
        // Issued tokens can contain any substring, "todo" included.
        let token = parse_customer_token(Some("eyJraWQiOiIxIn0.q7TodoX9vBn2aaaa".to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(token.expose_secret(), "eyJraWQiOiIxIn0.q7TodoX9vBn2aaaa");

        assert!(parse_customer_token(Some("aaaa".to_string())).unwrap().is_some());
        assert!(parse_customer_token(None).unwrap().is_none());
    }

    #[test]
    fn test_blank_customer_token_is_rejected() {
        assert!(matches!(
            parse_customer_token(Some("   ".to_string())),
            Err(ConfigError::InvalidEnvVar(ref var, _)) if var == "MAGENTO_CUSTOMER_TOKEN"
        ));
    }

    #[test]
    fn test_parse_endpoint() {
        let url = parse_endpoint("https://shop.example.com/graphql").unwrap();
        assert_eq!(url.path(), "/graphql");

        assert!(parse_endpoint("not a url").is_err());
        assert!(parse_endpoint("ftp://shop.example.com/graphql").is_err());
    }

    #[test]
    fn test_for_endpoint_defaults() {
        let config = MagentoConfig::for_endpoint("http://localhost:8080/graphql").unwrap();
        assert!(!config.has_customer_token());
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.bearer_header().is_none());
    }

    #[test]
    fn test_magento_config_debug_redacts_token() {
        let config = MagentoConfig {
            customer_token: Some(SecretString::from("super_secret_customer_token")),
            store_code: Some("default".to_string()),
            ..MagentoConfig::for_endpoint("https://shop.example.com/graphql").unwrap()
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("shop.example.com"));
        assert!(debug_output.contains("default"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_customer_token"));
        assert_eq!(
            config.bearer_header().as_deref(),
            Some("Bearer super_secret_customer_token")
        );
    }
}
