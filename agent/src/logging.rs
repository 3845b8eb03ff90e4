//! Diagnostic tracing for the agent CLI.
//!
//! Tracing goes to stderr and is filtered by `RUST_LOG` (default `warn`).
//! It is separate from what commands print on stdout and from the run
//! artifacts (`run.json`, `output.log`, `response.md`), which are written
//! regardless of the filter.
//!
//! ```bash
//! RUST_LOG=agent=debug agent ps
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "warn";

/// Install the global subscriber. Later calls are ignored.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init();
}
