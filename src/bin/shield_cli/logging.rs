//! Diagnostic tracing for the CLI.
//!
//! Reads `RUST_LOG`. Defaults to `warn`, or `debug` for the shield crates
//! with `--verbose`. Output goes to stderr so `--json` stdout stays clean.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init(verbose: bool) {
    let fallback = if verbose {
        "warn,shield_core=debug,shield_policy_store=debug,storage_shield=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
