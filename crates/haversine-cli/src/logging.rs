//! Log output for the binary.
//!
//! The subscriber is only installed when `HAVERSINE_LOG` (or `RUST_LOG`) is
//! set, so an ordinary run prints nothing but its results.
//!
//! ```bash
//! HAVERSINE_LOG=debug haversine run --count 1000
//! HAVERSINE_LOG="haversine::profiler=trace" haversine repeat input.json
//! ```

use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "HAVERSINE_LOG";

/// Build an `EnvFilter` from `HAVERSINE_LOG`, falling back to `RUST_LOG`.
fn build_filter() -> EnvFilter {
    if let Ok(val) = std::env::var(LOG_ENV) {
        EnvFilter::builder().parse_lossy(val)
    } else {
        EnvFilter::from_default_env()
    }
}

/// Installs a stderr subscriber when logging was requested.
///
/// Output goes to stderr so it never mixes with the report on stdout.
pub fn init_tracing() {
    let requested = std::env::var_os(LOG_ENV).is_some() || std::env::var_os("RUST_LOG").is_some();
    if !requested {
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(build_filter())
        .with_writer(std::io::stderr)
        .init();
}
