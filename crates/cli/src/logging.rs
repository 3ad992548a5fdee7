use std::env;
use std::io;

use tracing_subscriber::EnvFilter;

const VERBOSE_ENV: &str = "MYSTFIG_VERBOSE";

/// Installs the global subscriber once. `RUST_LOG` wins over `verbose`.
pub fn init(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
    if verbose {
        tracing::debug!("verbose logging enabled");
    }
}

pub fn env_flag() -> bool {
    env::var(VERBOSE_ENV)
        .map(|value| parse_bool(value.trim()))
        .unwrap_or(false)
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
