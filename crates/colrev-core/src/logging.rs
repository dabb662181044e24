//! Subscriber setup for binaries
//!
//! Library code only emits `tracing` events. Binaries call [`init`] once;
//! `RUST_LOG` overrides the level derived from the verbosity flag.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter for a verbosity count (`-v`, `-vv`, ...)
#[must_use]
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber
///
/// A second call is a no-op: the subscriber of the first call stays.
pub fn init(verbosity: u8, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));
    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()
    };
    if result.is_err() {
        tracing::debug!("subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(default_directive(0), "info");
        assert_eq!(default_directive(1), "debug");
        assert_eq!(default_directive(5), "trace");
    }

    #[test]
    fn init_twice_is_harmless() {
        init(0, false);
        init(1, true);
    }
}
