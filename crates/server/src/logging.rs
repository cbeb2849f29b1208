//! Tracing subscriber setup.

use anyhow::{Context, Result};
use mountain_core::config::{LogConfig, LogFormat};
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter directive: `--debug` wins, then `RUST_LOG`, then `logs.level`.
pub fn filter_directive(level: &str, debug: bool, env: Option<&str>) -> String {
    if debug {
        return "debug".to_string();
    }
    match env {
        Some(directive) if !directive.trim().is_empty() => directive.to_string(),
        _ => level.to_string(),
    }
}

/// Install the global tracing subscriber.
pub fn init(config: &LogConfig, debug: bool) -> Result<()> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directive = filter_directive(&config.level, debug, env.as_deref());
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("invalid log filter '{directive}'"))?;

    let writer = match &config.target {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            BoxMakeWriter::new(Arc::new(file))
        }
        None => BoxMakeWriter::new(std::io::stdout),
    };
    let ansi = config.target.is_none();

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(ansi),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .try_init(),
    }
    .context("failed to install tracing subscriber")
}
