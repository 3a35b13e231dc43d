//! Logging setup for the `trellis` binary.
//!
//! Status lines (`    Resolved ...`) go to stderr directly. Diagnostics go
//! through `tracing` and are filtered here.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "trellis_engine=warn,trellis_cli=info";
const VERBOSE_FILTER: &str = "trellis_engine=debug,trellis_cli=debug";
const QUIET_FILTER: &str = "trellis_engine=error,trellis_cli=error";

/// Pick the filter directives. `--verbose` wins over `--quiet`; with
/// neither, `RUST_LOG` is honored when set.
pub fn filter_directives(verbose: bool, quiet: bool, env: Option<&str>) -> String {
    if verbose {
        return VERBOSE_FILTER.to_owned();
    }
    if quiet {
        return QUIET_FILTER.to_owned();
    }
    env.filter(|e| !e.trim().is_empty())
        .unwrap_or(DEFAULT_FILTER)
        .to_owned()
}

/// Install the global subscriber. Call once, before any logging.
pub fn init_logger(verbose: bool, quiet: bool) {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directives = filter_directives(verbose, quiet, env.as_deref());
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
