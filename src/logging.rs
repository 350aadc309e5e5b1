//! Logging configuration and initialization.
//!
//! This module handles tracing subscriber setup based on CLI verbosity flags
//! and environment variables.

use crate::cli::LogLevel;
use tracing::Level;

fn max_level(level: LogLevel) -> Level {
    match level {
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    }
}

/// Configure the tracing subscriber according to CLI verbosity flags.
///
/// Precedence:
/// 1. `quiet` forces WARN+.
/// 2. `-vv` => TRACE.
/// 3. `-v`  => DEBUG.
/// 4. Else INFO with optional `RUST_LOG` env filter overrides.
pub fn configure_logging(level: LogLevel) {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_max_level(max_level(level))
        .with_thread_names(true)
        .init();
}
