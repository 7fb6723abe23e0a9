use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level is `debug` with `--verbose`
/// and `info` without. Output goes to stderr so stdout only carries results.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second init (e.g. from tests calling commands directly) is not an error.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
}
