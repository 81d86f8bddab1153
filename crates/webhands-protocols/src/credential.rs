//! Credential lookup protocol.
//!
//! Login flows never see where secrets live; they ask a [`CredentialStore`]
//! by service name and get back an identifier, a secret, and the way the
//! service expects to be signed into.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::CredentialError;

/// How a service expects the user to authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Identifier followed by a password.
    #[default]
    Password,
    /// Identifier only; the service continues with a link, passkey or code.
    Passwordless,
}

impl AuthMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "password" | "" => Some(Self::Password),
            "passwordless" | "magic_link" | "magic-link" | "passkey" => Some(Self::Passwordless),
            _ => None,
        }
    }
}

/// A stored login.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    pub identifier: String,
    pub secret: String,
    #[serde(default)]
    pub auth_mode: AuthMode,
}

impl Credential {
    pub fn password(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
            auth_mode: AuthMode::Password,
        }
    }

    pub fn passwordless(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: String::new(),
            auth_mode: AuthMode::Passwordless,
        }
    }
}

// Secrets never reach logs through Debug.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .field("auth_mode", &self.auth_mode)
            .finish()
    }
}

/// Looks up credentials by service name.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns `Ok(None)` when nothing is stored for `service`.
    async fn get_credential(&self, service: &str) -> Result<Option<Credential>, CredentialError>;
}

/// In-memory credential store keyed by lowercase service name.
#[derive(Default)]
pub struct StaticCredentialStore {
    entries: RwLock<HashMap<String, Credential>>,
}

impl StaticCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, service: impl AsRef<str>, credential: Credential) {
        self.entries
            .write()
            .insert(service.as_ref().to_ascii_lowercase(), credential);
    }

    pub fn with(self, service: impl AsRef<str>, credential: Credential) -> Self {
        self.insert(service, credential);
        self
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn get_credential(&self, service: &str) -> Result<Option<Credential>, CredentialError> {
        Ok(self.entries.read().get(&service.to_ascii_lowercase()).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_mode_parse() {
        assert_eq!(AuthMode::parse("password"), Some(AuthMode::Password));
        assert_eq!(AuthMode::parse(" Passkey "), Some(AuthMode::Passwordless));
        assert_eq!(AuthMode::parse("magic-link"), Some(AuthMode::Passwordless));
        assert_eq!(AuthMode::parse("sms"), None);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let cred = Credential::password("ana@example.com", "hunter2");
        let debug = format!("{:?}", cred);
        assert!(debug.contains("ana@example.com"));
        assert!(!debug.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_static_store_case_insensitive() {
        let store = StaticCredentialStore::new().with("GitHub", Credential::password("ana", "pw"));
        let found = store.get_credential("github").await.unwrap();
        assert_eq!(found.unwrap().identifier, "ana");
        assert!(store.get_credential("gitlab").await.unwrap().is_none());
    }
}
