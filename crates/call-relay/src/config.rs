//! Relay configuration.
//!
//! Configuration is loaded from environment variables. The token secret
//! is wrapped in `SecretString` and redacted in Debug output.

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default bind address for the signaling and health endpoints.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default upper bound on one call registry lookup, in milliseconds.
pub const DEFAULT_REGISTRY_TIMEOUT_MS: u64 = 3000;

/// Default relay instance ID prefix.
const INSTANCE_ID_PREFIX: &str = "relay";

/// Relay configuration.
///
/// Loaded from environment variables with sensible defaults.
#[derive(Clone)]
pub struct Config {
    /// HTTP bind address serving the signaling upgrade and health probes.
    pub bind_address: String,

    /// Shared secret verifying bearer tokens minted by the identity service.
    /// Protected by `SecretString` to prevent accidental logging.
    pub auth_token_secret: SecretString,

    /// Base URL of the call registry collaborator.
    pub registry_base_url: String,

    /// Upper bound on one registry lookup, in milliseconds.
    pub registry_timeout_ms: u64,

    /// Unique identifier for this relay instance (log correlation).
    pub instance_id: String,
}

/// Custom Debug implementation that redacts the token secret.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("auth_token_secret", &"[REDACTED]")
            .field("registry_base_url", &self.registry_base_url)
            .field("registry_timeout_ms", &self.registry_timeout_ms)
            .field("instance_id", &self.instance_id)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let auth_token_secret = SecretString::from(
            vars.get("RELAY_AUTH_TOKEN_SECRET")
                .ok_or_else(|| ConfigError::MissingEnvVar("RELAY_AUTH_TOKEN_SECRET".to_string()))?
                .clone(),
        );

        let registry_base_url = vars
            .get("RELAY_REGISTRY_BASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("RELAY_REGISTRY_BASE_URL".to_string()))?
            .clone();

        let bind_address = vars
            .get("RELAY_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let registry_timeout_ms = match vars.get("RELAY_REGISTRY_TIMEOUT_MS") {
            Some(raw) => raw.parse().map_err(|_| {
                ConfigError::InvalidValue(format!("RELAY_REGISTRY_TIMEOUT_MS: {raw}"))
            })?,
            None => DEFAULT_REGISTRY_TIMEOUT_MS,
        };

        // Generate relay instance ID
        let instance_id = vars.get("RELAY_INSTANCE_ID").cloned().unwrap_or_else(|| {
            let hostname = env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{INSTANCE_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            bind_address,
            auth_token_secret,
            registry_base_url,
            registry_timeout_ms,
            instance_id,
        })
    }

    /// Registry lookup timeout as a `Duration`.
    #[must_use]
    pub fn registry_timeout(&self) -> Duration {
        Duration::from_millis(self.registry_timeout_ms)
    }
}
