//! Logging configuration, subscriber setup and shared lifecycle events.

use std::env;

use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_target: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

pub fn logging_config_from_env() -> LoggingConfig {
    let mut config = LoggingConfig::default();

    if let Ok(level) = env::var("DELAY_FEATURES_LOG_LEVEL") {
        let trimmed = level.trim();
        if !trimmed.is_empty() {
            config.level = trimmed.to_string();
        }
    }

    if let Ok(format) = env::var("DELAY_FEATURES_LOG_FORMAT") {
        if let Some(parsed) = parse_log_format(&format) {
            config.format = parsed;
        }
    }

    if let Ok(include_target) = env::var("DELAY_FEATURES_LOG_TARGET") {
        if let Some(parsed) = parse_bool(&include_target) {
            config.include_target = parsed;
        }
    }

    config
}

pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let env_filter =
        EnvFilter::try_new(config.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(config.include_target)
        .with_ansi(matches!(config.format, LogFormat::Pretty));

    match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
    }

    Ok(())
}

pub fn log_app_start(config: &LoggingConfig) {
    info!(
        component = "build_features",
        event = "app.start",
        log_level = %config.level,
        log_format = ?config.format,
        include_target = config.include_target
    );
}

/// Records which statistics a pass will derive its aggregate features from.
pub fn log_reference_selected(
    mode: &str,
    source: &str,
    reason: Option<&str>,
    reference_rows: usize,
) {
    match reason {
        Some(reason) => info!(
            component = "pipeline",
            event = "pipeline.reference.selected",
            mode,
            source,
            reason,
            reference_rows
        ),
        None => info!(
            component = "pipeline",
            event = "pipeline.reference.selected",
            mode,
            source,
            reference_rows
        ),
    }
}

fn parse_log_format(raw: &str) -> Option<LogFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "json" => Some(LogFormat::Json),
        "pretty" => Some(LogFormat::Pretty),
        _ => None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_env::with_env_vars;

    const LOG_VARS: [&str; 3] = [
        "DELAY_FEATURES_LOG_LEVEL",
        "DELAY_FEATURES_LOG_FORMAT",
        "DELAY_FEATURES_LOG_TARGET",
    ];

    fn config_with(level: Option<&str>, format: Option<&str>, target: Option<&str>) -> LoggingConfig {
        with_env_vars(
            &[
                (LOG_VARS[0], level),
                (LOG_VARS[1], format),
                (LOG_VARS[2], target),
            ],
            logging_config_from_env,
        )
    }

    #[test]
    fn unset_or_blank_env_keeps_pretty_info_defaults() {
        assert_eq!(config_with(None, None, None), LoggingConfig::default());
        assert_eq!(config_with(Some("   "), None, None).level, "info");
    }

    #[test]
    fn json_batch_logging_from_env() {
        let cfg = config_with(
            Some("delay_features=debug"),
            Some(" JSON "),
            Some("off"),
        );

        assert_eq!(cfg.level, "delay_features=debug");
        assert_eq!(cfg.format, LogFormat::Json);
        assert!(!cfg.include_target);
    }

    #[test]
    fn unknown_format_and_target_values_are_ignored() {
        let cfg = config_with(None, Some("yaml"), Some("sometimes"));

        assert_eq!(cfg.format, LogFormat::Pretty);
        assert!(cfg.include_target);
    }

    #[test]
    fn bool_and_format_parsers_accept_common_spellings() {
        for raw in ["1", "true", "YES", " on "] {
            assert_eq!(parse_bool(raw), Some(true), "{raw}");
        }
        for raw in ["0", "False", "no", "OFF"] {
            assert_eq!(parse_bool(raw), Some(false), "{raw}");
        }
        assert_eq!(parse_log_format("Pretty"), Some(LogFormat::Pretty));
        assert_eq!(parse_log_format(""), None);
    }
}
