//! Log output for the engine's `tracing` events.

use tracing_subscriber::EnvFilter;

/// Install a stderr subscriber. `RUST_LOG` wins over the verbosity flags.
pub fn init(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "stackr_core=info,warn",
        (false, 2) => "stackr_core=debug,stackr_git=debug,stackr_github=debug,info",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // Ignore failure: a subscriber may already be installed.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose > 1)
        .without_time()
        .try_init();
}
