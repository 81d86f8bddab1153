//! `check-config` subcommand handler.

use std::path::Path;

use webhands_config::{Config, ConfigValidator};

pub(crate) fn handle_check_config(
    path: &Path,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = ConfigValidator::validate(config);

    if path.exists() {
        println!("Config: {}", path.display());
    } else {
        println!("Config: {} (not found, using defaults)", path.display());
    }
    for warning in &result.warnings {
        println!("  warning: {}: {}", warning.path, warning.message);
    }
    for error in &result.errors {
        println!("  error: {}: {}", error.path, error.message);
    }

    match result.into_error() {
        Some(e) => Err(e.into()),
        None => {
            println!("OK");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_pass() {
        let path = Path::new("/nonexistent/webhands.toml");
        assert!(handle_check_config(path, &Config::default()).is_ok());
    }

    #[test]
    fn test_bad_engine_fails() {
        let mut config = Config::default();
        config.browser.default_engine = "warp".to_string();
        let path = Path::new("/nonexistent/webhands.toml");
        assert!(handle_check_config(path, &config).is_err());
    }
}
