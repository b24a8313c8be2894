//! # Operator Logging
//!
//! `bluecarbon` prints command results on stdout (JSON records, balances,
//! metrics) and everything it logs on stderr, so output can be piped while
//! the audit trail of payouts and rejections still reaches the terminal or a
//! collector.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from `--log-level`.
//! A malformed filter is a startup error rather than a silent fallback.

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines for an operator's terminal.
    Pretty,
    /// One JSON object per line, for ingestion by a log pipeline.
    Json,
}

/// Builds the filter: `env_directives` (the value of `RUST_LOG`) wins over
/// `default_level` when present.
pub fn build_filter(default_level: &str, env_directives: Option<&str>) -> Result<EnvFilter, ParseError> {
    match env_directives {
        Some(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(default_level),
    }
}

/// Installs the global subscriber, writing to stderr.
///
/// # Errors
///
/// Fails if the filter does not parse or a subscriber is already installed.
pub fn init_logging(default_level: &str, format: LogFormat) -> Result<()> {
    let env_directives = std::env::var(EnvFilter::DEFAULT_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty());
    let filter = build_filter(default_level, env_directives.as_deref()).with_context(|| {
        match &env_directives {
            Some(value) => format!("invalid {} filter {:?}", EnvFilter::DEFAULT_ENV, value),
            None => format!("invalid --log-level filter {:?}", default_level),
        }
    })?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false),
            )
            .try_init(),
    };
    installed.context("a tracing subscriber is already installed")?;

    tracing::debug!(?format, "logging ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_parse_case_insensitively() {
        assert_eq!(LogFormat::from_str("json", true), Ok(LogFormat::Json));
        assert_eq!(LogFormat::from_str("Pretty", true), Ok(LogFormat::Pretty));
        assert!(LogFormat::from_str("xml", true).is_err());
    }

    #[test]
    fn environment_overrides_the_flag() {
        let filter = build_filter("bluecarbon=info", Some("bluecarbon_contracts=trace")).unwrap();
        assert!(filter.to_string().contains("bluecarbon_contracts=trace"));

        let filter = build_filter("bluecarbon=warn", Some("  ")).unwrap();
        assert!(filter.to_string().contains("bluecarbon=warn"));
    }

    #[test]
    fn malformed_level_is_rejected() {
        assert!(build_filter("bluecarbon=loud", None).is_err());
        assert!(build_filter("info", Some("bluecarbon=loud")).is_err());
    }
}
