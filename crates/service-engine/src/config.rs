//! Engine configuration.
//!
//! ```toml
//! validation = true
//! resolver_timeout_ms = 5000
//! max_placeholder_passes = 64
//! introspection_typename = true
//! ```

use serde::Deserialize;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid engine configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid engine configuration: {0}")]
    Invalid(&'static str),
}

/// Runtime settings of an [`Engine`][crate::Engine].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Check parameter constraints before invoking a resolver.
    /// Default: true
    #[serde(default = "default_validation")]
    pub validation: bool,

    /// Upper bound on the time one resolver may take to complete.
    /// Default: none, a resolver that never completes stalls its operation
    #[serde(default)]
    pub resolver_timeout_ms: Option<u64>,

    /// Rounds of loader flushes before pending placeholders are given up on.
    /// Default: 64
    #[serde(default = "default_max_placeholder_passes")]
    pub max_placeholder_passes: usize,

    /// Answer `__typename` on every object type.
    /// Default: true
    #[serde(default = "default_introspection_typename")]
    pub introspection_typename: bool,
}

fn default_validation() -> bool {
    true
}

fn default_max_placeholder_passes() -> usize {
    64
}

fn default_introspection_typename() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            validation: default_validation(),
            resolver_timeout_ms: None,
            max_placeholder_passes: default_max_placeholder_passes(),
            introspection_typename: default_introspection_typename(),
        }
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_placeholder_passes == 0 {
            return Err(ConfigError::Invalid("max_placeholder_passes must be > 0"));
        }
        if self.resolver_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid("resolver_timeout_ms must be > 0 when set"));
        }
        Ok(())
    }

    pub fn resolver_timeout(&self) -> Option<Duration> {
        self.resolver_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert!(config.validation);
        assert_eq!(config.resolver_timeout(), None);
        assert_eq!(config.max_placeholder_passes, 64);
        assert!(config.introspection_typename);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_document_gives_defaults() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn zero_passes_is_invalid() {
        let config = EngineConfig {
            max_placeholder_passes: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let err = EngineConfig::from_toml_str("resolver_timeout_ms = 0").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid engine configuration: resolver_timeout_ms must be > 0 when set"
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = EngineConfig::from_toml_str("max_depth = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
