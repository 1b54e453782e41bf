//! Tracing setup for the daemon and CLI.
//!
//! Logs go to stderr only; under systemd that lands in the journal, which
//! owns rotation and retention. Filter precedence: the `TIMELAPSED_LOG`
//! env var, then the configured filter string, then the verbosity flag.

use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::config::{LogFormat, LoggingConfig};

const LOG_ENV_VAR: &str = "TIMELAPSED_LOG";

pub fn init(verbosity: u8, logging: &LoggingConfig) {
    let filter = build_filter(verbosity, logging.filter.as_deref());
    Registry::default()
        .with(build_stderr_layer(logging.format))
        .with(filter)
        .init();
}

fn build_filter(verbosity: u8, configured: Option<&str>) -> EnvFilter {
    let builder = EnvFilter::builder()
        .with_default_directive(level_from_verbosity(verbosity).into())
        .with_env_var(LOG_ENV_VAR);
    if std::env::var_os(LOG_ENV_VAR).is_none()
        && let Some(directives) = configured
    {
        return builder.parse_lossy(directives);
    }
    builder.from_env_lossy()
}

fn build_stderr_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Pretty => Box::new(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_names(true),
        ),
        LogFormat::Compact => Box::new(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_names(true),
        ),
        LogFormat::Json => Box::new(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_names(true)
                .with_current_span(true),
        ),
    }
}

fn level_from_verbosity(verbosity: u8) -> tracing::metadata::LevelFilter {
    match verbosity {
        0 => tracing::metadata::LevelFilter::INFO,
        1 => tracing::metadata::LevelFilter::DEBUG,
        _ => tracing::metadata::LevelFilter::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(
            level_from_verbosity(0),
            tracing::metadata::LevelFilter::INFO
        );
        assert_eq!(
            level_from_verbosity(1),
            tracing::metadata::LevelFilter::DEBUG
        );
        assert_eq!(
            level_from_verbosity(9),
            tracing::metadata::LevelFilter::TRACE
        );
    }
}
