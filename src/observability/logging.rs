//! Structured logging.
//!
//! # Design Decisions
//! - `RUST_LOG` wins when set
//! - Otherwise `log_level` applies, raised to `debug` for this crate (and
//!   `tower_http`) when the debug flag is on

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. A second call is a no-op.
pub fn init(debug: bool, log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(debug, log_level));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

fn default_filter(debug: bool, log_level: &str) -> EnvFilter {
    let directives = if debug {
        format!("{},envelope_http=debug,tower_http=debug", log_level)
    } else {
        log_level.to_string()
    };

    EnvFilter::try_new(&directives).unwrap_or_else(|e| {
        eprintln!("invalid log filter `{}`: {}, falling back to info", directives, e);
        EnvFilter::new("info")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_raises_crate_level() {
        let filter = default_filter(true, "warn").to_string();
        assert!(filter.contains("envelope_http=debug"), "{}", filter);
        assert!(filter.contains("warn"), "{}", filter);
    }

    #[test]
    fn test_invalid_level_falls_back() {
        let filter = default_filter(false, "envelope_http=loud").to_string();
        assert!(!filter.contains("loud"), "{}", filter);
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(false, "info");
        init(true, "debug");
    }
}
