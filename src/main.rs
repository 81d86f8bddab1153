//! WebHands - dual-engine browser automation for autonomous agents.
//!
//! Main entry point for the WebHands CLI. Result envelopes go to stdout,
//! logs go to stderr and a daily rolling file.

mod cli;
mod cmd_config;
mod cmd_exec;
mod credentials;
mod register;

use std::path::PathBuf;

use clap::Parser;
use tracing::{debug, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use webhands_config::{Config, ConfigLoader, ConfigValidator, LoggingSection};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = ConfigLoader::load_or_default(&cli.config)?;

    if let Err(e) = init_tracing(&config.logging) {
        eprintln!("Failed to initialize file logging: {}", e);
    }
    debug!("Loaded config from {}", cli.config.display());

    match cli.command {
        Commands::CheckConfig => cmd_config::handle_check_config(&cli.config, &config),
        Commands::Exec { params, pretty } => {
            ensure_valid(&config)?;
            let tool = register::create_browser_tool(&config, cli.fetch_only)?;
            cmd_exec::handle_exec(&tool, &params, pretty).await
        }
        Commands::Script { file, keep_going } => {
            ensure_valid(&config)?;
            let tool = register::create_browser_tool(&config, cli.fetch_only)?;
            cmd_exec::handle_script(&tool, &file, keep_going).await
        }
    }
}

/// Refuse to run actions on an invalid config; warnings are only logged.
fn ensure_valid(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let result = ConfigValidator::validate(config);
    for warning in &result.warnings {
        warn!("Config {}: {}", warning.path, warning.message);
    }
    match result.into_error() {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn log_dir(logging: &LoggingSection) -> PathBuf {
    if logging.dir.trim().is_empty() {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("webhands")
            .join("logs")
    } else {
        PathBuf::from(ConfigLoader::expand_path(&logging.dir))
    }
}

fn init_tracing(logging: &LoggingSection) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries envelopes, so the console layer writes to stderr.
    let console = fmt::layer()
        .with_target(true)
        .with_ansi(true)
        .with_writer(std::io::stderr);

    let log_dir = log_dir(logging);
    let file_appender = std::fs::create_dir_all(&log_dir)
        .map_err(Box::<dyn std::error::Error>::from)
        .and_then(|_| {
            RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("webhands")
                .filename_suffix("log")
                .max_log_files(30)
                .build(&log_dir)
                .map_err(Into::into)
        });

    let file_appender = match file_appender {
        Ok(appender) => appender,
        Err(e) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(console)
                .init();
            return Err(e);
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_dir_default_and_override() {
        let default = log_dir(&LoggingSection::default());
        assert!(default.ends_with("webhands/logs"));

        let custom = LoggingSection {
            level: "debug".to_string(),
            dir: "/var/log/webhands".to_string(),
        };
        assert_eq!(log_dir(&custom), PathBuf::from("/var/log/webhands"));
    }

    #[test]
    fn test_ensure_valid_rejects_bad_viewport() {
        let mut config = Config::default();
        config.browser.viewport_width = 10;
        assert!(ensure_valid(&config).is_err());
        assert!(ensure_valid(&Config::default()).is_ok());
    }
}
