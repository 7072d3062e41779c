//! Webhook configuration

use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

/// Korvex webhook configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookConfig {
    /// Token Korvex echoes in every envelope. Unset disables the check.
    #[serde(default)]
    pub shared_secret: Option<String>,
}

impl WebhookConfig {
    /// Whether envelopes will be authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.shared_secret
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }

    /// Validate webhook configuration
    ///
    /// Production must authenticate envelopes.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if *environment == Environment::Production && !self.is_authenticated() {
            return Err(ValidationError::MissingRequired("KORVEX__WEBHOOK__SHARED_SECRET"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_optional_outside_production() {
        let config = WebhookConfig::default();
        assert!(!config.is_authenticated());
        assert!(config.validate(&Environment::Development).is_ok());
        assert!(config.validate(&Environment::Staging).is_ok());
    }

    #[test]
    fn test_secret_required_in_production() {
        let config = WebhookConfig::default();
        assert!(config.validate(&Environment::Production).is_err());

        let blank = WebhookConfig {
            shared_secret: Some("  ".to_string()),
        };
        assert!(blank.validate(&Environment::Production).is_err());
    }

    #[test]
    fn test_configured_secret_passes_production() {
        let config = WebhookConfig {
            shared_secret: Some("kvx_secret".to_string()),
        };
        assert!(config.is_authenticated());
        assert!(config.validate(&Environment::Production).is_ok());
    }
}
