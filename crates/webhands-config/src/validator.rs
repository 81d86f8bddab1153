//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::Config;

const ENGINES: &[&str] = &["auto", "fetch", "live"];

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// First error as a `ConfigError`, if any.
    pub fn into_error(self) -> Option<ConfigError> {
        self.errors.into_iter().next().map(|e| ConfigError::InvalidValue {
            field: e.path,
            message: e.message,
        })
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();
        Self::validate_engine(config, &mut result);
        Self::validate_viewport(config, &mut result);
        Self::validate_limits(config, &mut result);
        Self::validate_credentials(config, &mut result);
        result
    }

    fn validate_engine(config: &Config, result: &mut ValidationResult) {
        let browser = &config.browser;
        if !ENGINES.contains(&browser.default_engine.as_str()) {
            result.add_error(ValidationError::new(
                "browser.default_engine",
                format!(
                    "unknown engine '{}', expected one of {}",
                    browser.default_engine,
                    ENGINES.join(", ")
                ),
            ));
        }

        if browser.default_engine == "live" && !browser.live_enabled {
            if browser.allow_fallback {
                result.add_warning(ValidationWarning::new(
                    "browser.default_engine",
                    "live engine is disabled; every call will fall back to fetch",
                ));
            } else {
                result.add_error(ValidationError::new(
                    "browser.default_engine",
                    "live engine is disabled and fallback is off; no action can run",
                ));
            }
        }

        if !browser.allow_fallback && !browser.live_enabled {
            result.add_warning(ValidationWarning::new(
                "browser.allow_fallback",
                "fallback is off but the live engine is disabled, so fallback could never trigger",
            ));
        }
    }

    fn validate_viewport(config: &Config, result: &mut ValidationResult) {
        for (path, value) in [
            ("browser.viewport_width", config.browser.viewport_width),
            ("browser.viewport_height", config.browser.viewport_height),
        ] {
            if !(200..=8192).contains(&value) {
                result.add_error(ValidationError::new(
                    path,
                    format!("{} is outside 200..=8192", value),
                ));
            }
        }
    }

    fn validate_limits(config: &Config, result: &mut ValidationResult) {
        let browser = &config.browser;
        if browser.navigation_timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "browser.navigation_timeout_ms",
                "navigation_timeout_ms must be greater than 0",
            ));
        }
        if browser.action_timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "browser.action_timeout_ms",
                "action_timeout_ms must be greater than 0",
            ));
        }
        if browser.console_buffer == 0 || browser.dialog_buffer == 0 {
            result.add_error(ValidationError::new(
                "browser.console_buffer",
                "ring buffer capacities must be at least 1",
            ));
        }
        if browser.snapshot_retries > 3 {
            result.add_warning(ValidationWarning::new(
                "browser.snapshot_retries",
                "snapshot_retries above 3 is clamped to 3 per call",
            ));
        }
        if browser.max_bytes < 1024 {
            result.add_warning(ValidationWarning::new(
                "browser.max_bytes",
                "max_bytes below 1024 truncates almost every page",
            ));
        }
    }

    fn validate_credentials(config: &Config, result: &mut ValidationResult) {
        let prefix = &config.credentials.env_prefix;
        if prefix.is_empty()
            || !prefix
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        {
            result.add_error(ValidationError::new(
                "credentials.env_prefix",
                "env_prefix must be non-empty and contain only A-Z, 0-9 and _",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
