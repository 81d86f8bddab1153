//! Credential store backed by environment variables.
//!
//! A service `github` with prefix `WEBHANDS_CRED` reads
//! `WEBHANDS_CRED_GITHUB_ID`, `WEBHANDS_CRED_GITHUB_SECRET` and the optional
//! `WEBHANDS_CRED_GITHUB_MODE` (`password` or `passwordless`).

use async_trait::async_trait;
use tracing::debug;

use webhands_protocols::{AuthMode, Credential, CredentialError, CredentialStore};

pub(crate) struct EnvCredentialStore {
    prefix: String,
}

impl EnvCredentialStore {
    pub(crate) fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// `github.com` -> `GITHUB_COM`.
    fn key(&self, service: &str, suffix: &str) -> String {
        let service: String = service
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{}_{}_{}", self.prefix, service, suffix)
    }

    fn var(&self, service: &str, suffix: &str) -> Option<String> {
        std::env::var(self.key(service, suffix))
            .ok()
            .filter(|v| !v.is_empty())
    }
}

#[async_trait]
impl CredentialStore for EnvCredentialStore {
    async fn get_credential(&self, service: &str) -> Result<Option<Credential>, CredentialError> {
        let Some(identifier) = self.var(service, "ID") else {
            debug!("No credential in the environment for {}", service);
            return Ok(None);
        };
        let auth_mode = match self.var(service, "MODE") {
            Some(mode) => AuthMode::parse(&mode).ok_or_else(|| CredentialError::Incomplete {
                service: service.to_string(),
                message: format!(
                    "{} must be password or passwordless, got '{}'",
                    self.key(service, "MODE"),
                    mode
                ),
            })?,
            None => AuthMode::Password,
        };
        let secret = self.var(service, "SECRET").unwrap_or_default();
        if auth_mode == AuthMode::Password && secret.is_empty() {
            return Err(CredentialError::Incomplete {
                service: service.to_string(),
                message: format!("{} is not set", self.key(service, "SECRET")),
            });
        }
        Ok(Some(Credential {
            identifier,
            secret,
            auth_mode,
        }))
    }
}
