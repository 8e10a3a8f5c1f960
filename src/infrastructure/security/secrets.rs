use crate::domain::error::{AppError, Result};
use keyring::Entry;

/// API keys and tracker tokens. Environment variables win over the OS keyring.
pub struct SecretStore {
    service: String,
}

impl SecretStore {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, name: &str) -> Result<Entry> {
        Entry::new(&self.service, name)
            .map_err(|e| AppError::SecurityError(format!("Failed to open keyring entry {}: {}", name, e)))
    }

    pub fn store(&self, name: &str, secret: &str) -> Result<()> {
        if secret.trim().is_empty() {
            return Err(AppError::InvalidInput(format!("Secret for {} is empty", name)));
        }
        self.entry(name)?
            .set_password(secret)
            .map_err(|e| AppError::SecurityError(format!("Failed to store secret {}: {}", name, e)))
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        self.entry(name)?
            .delete_credential()
            .map_err(|e| AppError::SecurityError(format!("Failed to delete secret {}: {}", name, e)))
    }

    /// Looks up `env_var` first, then the keyring entry `name`.
    pub fn resolve(&self, name: &str, env_var: Option<&str>) -> Option<String> {
        if let Some(value) = env_var
            .and_then(|var| std::env::var(var).ok())
            .filter(|value| !value.trim().is_empty())
        {
            return Some(value);
        }

        match self.entry(name).and_then(|entry| {
            entry
                .get_password()
                .map_err(|e| AppError::SecurityError(e.to_string()))
        }) {
            Ok(secret) => Some(secret),
            Err(err) => {
                tracing::debug!(secret = name, error = %err, "No keyring secret available");
                None
            }
        }
    }
}
