use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const VERBOSE_DIRECTIVE: &str = "xconv=debug";

/// Builds the event filter from `--verbose` and the `RUST_LOG` value.
///
/// `RUST_LOG` directives always apply; `verbose` adds debug output for this
/// crate on top of them. With neither, logging is off.
pub fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    let rust_log = rust_log.map(str::trim).filter(|s| !s.is_empty());
    let directives = match (verbose, rust_log) {
        (true, Some(env)) => format!("{env},{VERBOSE_DIRECTIVE}"),
        (true, None) => VERBOSE_DIRECTIVE.to_string(),
        (false, Some(env)) => env.to_string(),
        (false, None) => "off".to_string(),
    };
    EnvFilter::builder().parse_lossy(directives)
}

/// Installs the global subscriber.
pub fn init_logging(verbose: bool) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::registry()
        .with(fmt::layer().pretty().without_time())
        .with(log_filter(verbose, rust_log.as_deref()))
        .init();
}
