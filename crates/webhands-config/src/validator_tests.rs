use super::*;

#[test]
fn test_validate_default_config() {
    let result = ConfigValidator::validate(&Config::default());
    assert!(result.is_valid());
    assert!(result.warnings.is_empty());
}

#[test]
fn test_validate_unknown_engine() {
    let mut config = Config::default();
    config.browser.default_engine = "gecko".to_string();

    let result = ConfigValidator::validate(&config);
    assert!(!result.is_valid());
    assert!(result.errors.iter().any(|e| e.path == "browser.default_engine"));
}

#[test]
fn test_validate_live_disabled_with_fallback_warns() {
    let mut config = Config::default();
    config.browser.default_engine = "live".to_string();
    config.browser.live_enabled = false;

    let result = ConfigValidator::validate(&config);
    assert!(result.is_valid());
    assert!(!result.warnings.is_empty());
}

#[test]
fn test_validate_live_disabled_without_fallback_errors() {
    let mut config = Config::default();
    config.browser.default_engine = "live".to_string();
    config.browser.live_enabled = false;
    config.browser.allow_fallback = false;

    let result = ConfigValidator::validate(&config);
    assert!(!result.is_valid());
}

#[test]
fn test_validate_viewport_range() {
    let mut config = Config::default();
    config.browser.viewport_width = 100;

    let result = ConfigValidator::validate(&config);
    assert!(result.errors.iter().any(|e| e.path == "browser.viewport_width"));
}

#[test]
fn test_validate_zero_ring_buffer() {
    let mut config = Config::default();
    config.browser.dialog_buffer = 0;

    assert!(!ConfigValidator::validate(&config).is_valid());
}

#[test]
fn test_validate_high_retries_warning() {
    let mut config = Config::default();
    config.browser.snapshot_retries = 9;

    let result = ConfigValidator::validate(&config);
    assert!(result.is_valid());
    assert!(result.warnings.iter().any(|w| w.path == "browser.snapshot_retries"));
}

#[test]
fn test_validate_bad_env_prefix() {
    let mut config = Config::default();
    config.credentials.env_prefix = "web-hands".to_string();

    let result = ConfigValidator::validate(&config);
    let err = result.into_error().unwrap();
    assert!(err.to_string().contains("credentials.env_prefix"));
}
