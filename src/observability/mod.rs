// Tracing initialization

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize tracing with the `info` default level.
pub fn init_tracing() {
    init_tracing_with_filter("info");
}

/// Initialize tracing, honoring `RUST_LOG` over the given default filter.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing_with_filter(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_tracing();
        init_tracing_with_filter("debug");
    }
}
