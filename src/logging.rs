//! Tracing subscriber setup for embedding processes and tests.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "info,computegraph_rs=debug";

/// Install the global subscriber with [`DEFAULT_FILTER`] (or `RUST_LOG`).
/// Returns false if a subscriber was already installed.
pub fn init() -> bool {
    init_with_filter(DEFAULT_FILTER)
}

pub fn init_with_filter(default_filter: &str) -> bool {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_a_no_op() {
        init();
        assert!(!init_with_filter("trace"));
    }
}
