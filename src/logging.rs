//! Structured logging via `tracing`.
//!
//! stdout carries the protocol, so events go to stderr or to a log file.
//! `RUST_LOG` overrides the verbosity-derived level.

use clap::ValueEnum;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

pub fn level_from_verbosity(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn build_env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rollbookd={}", level.as_str().to_lowercase())))
}

/// Installs the global subscriber. Call once at start-up.
pub fn init_logging(level: Level, format: LogFormat, log_file: Option<&Path>) -> io::Result<()> {
    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            install(level, format, Mutex::new(file), false);
        }
        None => install(level, format, io::stderr, true),
    }
    Ok(())
}

fn install<W>(level: Level, format: LogFormat, writer: W, ansi: bool)
where
    W: for<'writer> fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    let filter = build_env_filter(level);
    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(writer))
            .try_init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_ansi(ansi)
                    .with_target(false)
                    .with_writer(writer),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_ansi(ansi).with_writer(writer))
            .try_init(),
    };
    if let Err(e) = result {
        eprintln!("logging already initialised: {e}");
    }
}
