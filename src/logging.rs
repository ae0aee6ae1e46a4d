//! Operational logging setup.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber once at startup.
///
/// `RUST_LOG` wins when set; otherwise `herald=info`, or `herald=debug` with
/// `--verbose`. Output goes to stderr so piped stdout stays clean.
pub fn init(verbose: bool) {
    let default = if verbose { "herald=debug" } else { "herald=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
