//! Log subscriber setup for the binary.
//!
//! The library crates log through the `log` facade; the subscriber picks
//! those records up through its `tracing-log` bridge.

use tracing_subscriber::EnvFilter;

use crate::error::{GpmError, GpmResult};

/// Install the global subscriber. `RUST_LOG` wins over `default_level`.
pub fn init(default_level: &str, json: bool) -> GpmResult<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| GpmError::Logging(e.to_string()))
}
