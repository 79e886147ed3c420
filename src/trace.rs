//! Tracing subscriber setup for hosts embedding the bridge

/// Install a formatted `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. Returns false when a
/// global subscriber is already installed, which is not an error.
pub fn init_tracing(default_filter: &str) -> bool {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_names(true))
        .with(filter)
        .try_init()
        .is_ok()
}
