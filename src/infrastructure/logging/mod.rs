// Logging module - Logging infrastructure
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter: `RUST_LOG` wins, then `--verbose`, then the configured level.
pub fn build_filter(log_level: &str, verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { log_level };
        EnvFilter::new(format!("atcli={},warn", level))
    })
}

/// Initialize logging system
///
/// Diagnostics go to stderr so they never interleave with modem output on stdout.
pub fn init_logging(log_level: &str, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(build_filter(log_level, verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(verbose)
                .with_file(verbose)
                .with_line_number(verbose),
        )
        .try_init()?;

    tracing::debug!("ATCLI logging system initialized");
    Ok(())
}
