//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins over `level`; an unparsable level falls back to `info`.
pub fn env_filter(level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        level
            .and_then(|l| EnvFilter::try_new(l).ok())
            .unwrap_or_else(|| EnvFilter::new("info"))
    })
}

/// Installs the global fmt subscriber. Safe to call more than once; later
/// calls are no-ops.
pub fn init_logging(level: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(false)
        .try_init();
}
