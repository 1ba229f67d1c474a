//! # Logging Bootstrap
//!
//! Tracing subscriber initialization shared by the server binary and tests.
//! Honors `RUST_LOG` for filtering; `MISSIONCTL_LOG_FORMAT=json` switches to
//! newline-delimited JSON output for log shippers.

use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialize the global tracing subscriber.
///
/// Idempotent: repeated calls (common in test binaries) are no-ops.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,lapin=warn,hyper=warn"));

        let json_output = std::env::var("MISSIONCTL_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if json_output {
            fmt()
                .with_env_filter(filter)
                .json()
                .with_current_span(true)
                .init();
        } else {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
