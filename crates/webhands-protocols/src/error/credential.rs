//! Credential lookup errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("No credential stored for service: {0}")]
    NotFound(String),

    #[error("Credential for {service} is incomplete: {message}")]
    Incomplete { service: String, message: String },

    #[error("Credential backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = CredentialError::NotFound("github".to_string());
        assert_eq!(err.to_string(), "No credential stored for service: github");
    }

    #[test]
    fn test_incomplete_display() {
        let err = CredentialError::Incomplete {
            service: "google".to_string(),
            message: "missing secret".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("google"));
        assert!(display.contains("missing secret"));
    }
}
