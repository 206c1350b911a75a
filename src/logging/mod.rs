// Logging setup - tracing subscriber writing to stderr
//
// RUST_LOG takes precedence; otherwise the crate logs at info, or debug
// with --verbose. Stdout stays free for generated output.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Filter directive used when RUST_LOG is not set
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "neural_platform=debug"
    } else {
        "neural_platform=info"
    }
}

/// Install the global subscriber (call once, from `main`)
pub fn init(verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}
