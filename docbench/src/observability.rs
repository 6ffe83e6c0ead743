//! Logging setup for the docbench binary.

use std::env;

use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, prelude::*};

use crate::config::Config;

/// Installs the global tracing subscriber, logging to stderr.
pub fn init_tracing(config: &Config) {
    let (level, env_filter) = parse_rust_log(env::var(EnvFilter::DEFAULT_ENV).ok(), config.verbose);
    let format = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    tracing_subscriber::registry()
        .with(format.with_filter(LevelFilter::from(level)))
        .with(env_filter)
        .init();
}

/// Derives the maximum level and the filter from the value of `RUST_LOG`.
///
/// A plain level applies to docbench's own crates. Any other value is used literally as a filter.
fn parse_rust_log(rust_log: Option<String>, verbose: bool) -> (Level, EnvFilter) {
    let level = match rust_log {
        Some(value) => match value.parse::<Level>() {
            Ok(level) => level,
            Err(_) => return (Level::TRACE, EnvFilter::new(value)),
        },
        None if verbose => Level::DEBUG,
        None => Level::INFO,
    };

    // The maximum verbosity that will be logged, filtered down to `level`.
    let client = if verbose { "DEBUG" } else { "INFO" };
    let env_filter = EnvFilter::new(format!(
        "WARN,\
        docbench=TRACE,\
        docbench_client={client},\
        "
    ));

    (level, env_filter)
}
