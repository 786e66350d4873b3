//! # Telemetry
//!
//! Tracing subscriber setup.
//!
//! Filter comes from `RUST_LOG` when set, e.g.
//! `RUST_LOG=bazaar_fulfillment=debug,bazaar_db=debug,sqlx=warn`.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,bazaar=debug,sqlx=warn";

/// Installs the global fmt subscriber.
///
/// Returns `false` when a subscriber was already installed (for example
/// by an embedding HTTP server or a previous call).
pub fn init() -> bool {
    init_with(DEFAULT_FILTER)
}

/// Installs the global fmt subscriber with a fallback filter.
pub fn init_with(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        init();
        assert!(!init());
    }
}
