//! Shared-secret authentication of Korvex envelopes.
//!
//! Korvex echoes a configured token inside every envelope. When a secret is
//! configured the token must match exactly; without one the check is off.

use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use super::envelope::WebhookToken;
use super::WebhookError;

/// Verifies the token carried by an envelope.
pub struct WebhookAuthenticator {
    secret: Option<SecretString>,
}

impl WebhookAuthenticator {
    /// Creates an authenticator. `None` or a blank secret disables the check.
    pub fn new(secret: Option<String>) -> Self {
        let secret = secret
            .filter(|s| !s.trim().is_empty())
            .map(SecretString::new);
        Self { secret }
    }

    /// An authenticator that accepts every envelope.
    pub fn disabled() -> Self {
        Self { secret: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Checks the envelope token against the configured secret.
    ///
    /// # Errors
    ///
    /// `Unauthorized` if a secret is configured and the token is missing or differs.
    pub fn verify(&self, token: Option<&WebhookToken>) -> Result<(), WebhookError> {
        let Some(secret) = &self.secret else {
            return Ok(());
        };
        let Some(token) = token else {
            return Err(WebhookError::Unauthorized);
        };

        if constant_time_compare(secret.expose_secret().as_bytes(), token.as_bytes()) {
            Ok(())
        } else {
            Err(WebhookError::Unauthorized)
        }
    }
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
