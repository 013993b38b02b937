//! Service configuration types.
//!
//! The service binary deserializes this structure from layered YAML files
//! and environment overrides; every field carries a serde default so an
//! unconfigured environment still yields a valid (if locked-down) config.

use caseflow_core::AutomationConfig;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::ConfigError;

// ============================================================================
// Service Configuration
// ============================================================================

/// Top-level service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Webhook signing secrets, per source
    pub webhooks: WebhookSecretsConfig,

    /// Automation engine settings
    pub automation: AutomationSettings,
}

impl ServiceConfig {
    /// Validate cross-field constraints at startup
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid {
                message: "server.port must be non-zero".to_string(),
            });
        }
        if self.server.max_body_size == 0 {
            return Err(ConfigError::Invalid {
                message: "server.max_body_size must be non-zero".to_string(),
            });
        }
        if self
            .automation
            .assignees
            .iter()
            .any(|a| a.trim().is_empty())
        {
            return Err(ConfigError::Invalid {
                message: "automation.assignees must not contain blank entries".to_string(),
            });
        }
        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            timeout_seconds: 30,
            shutdown_timeout_seconds: 30,
            max_body_size: 1024 * 1024, // 1MB; webhook payloads are small
        }
    }
}

/// Per-source webhook signing secrets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookSecretsConfig {
    /// Shared token for the payment processor's notifications
    pub payment_token: Option<SecretConfig>,

    /// HMAC secret for the source-control host's notifications
    pub scm_secret: Option<SecretConfig>,
}

/// Automation engine settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationSettings {
    /// Bearer token the external scheduler must present; the automation
    /// trigger endpoint is disabled until one is configured
    pub scheduler_token: Option<SecretConfig>,

    /// Pool of eligible assignees for auto-assignment, in rotation order
    pub assignees: Vec<String>,
}

impl AutomationSettings {
    /// Engine configuration derived from these settings
    pub fn engine_config(&self) -> AutomationConfig {
        AutomationConfig {
            assignees: self.assignees.clone(),
        }
    }
}

// ============================================================================
// Secrets
// ============================================================================

/// Where a secret value comes from
///
/// Literal values belong in development configs only; deployments should
/// point at an environment variable populated by the secret manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SecretConfig {
    /// The secret value inline in configuration
    Literal { value: String },

    /// The name of an environment variable holding the secret
    Env { var: String },
}

impl SecretConfig {
    /// Resolve the secret to its value
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when the referenced environment
    /// variable is unset or empty.
    pub fn resolve(&self) -> Result<SecretString, ConfigError> {
        match self {
            Self::Literal { value } => Ok(SecretString::new(value.clone())),
            Self::Env { var } => match std::env::var(var) {
                Ok(value) if !value.is_empty() => Ok(SecretString::new(value)),
                _ => Err(ConfigError::Missing { key: var.clone() }),
            },
        }
    }
}

/// A resolved secret, zeroized on drop and redacted in Debug output
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// Access the raw value
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper, handing the value to a constructor that will
    /// own it
    pub fn into_inner(mut self) -> String {
        std::mem::take(&mut self.0)
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString(<REDACTED>)")
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
