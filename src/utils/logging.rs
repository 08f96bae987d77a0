use tracing_subscriber::EnvFilter;

/// Initialize tracing for the benchmark binary.
///
/// `RUST_LOG` wins when set; otherwise `default_level` is used. A quiet run
/// passes `"warn"` so progress lines are dropped but failures still show.
pub fn init(default_level: &str) {
    let lvl = match default_level.to_lowercase().as_str() {
        "error" => "error",
        "warn" | "warning" => "warn",
        "debug" => "debug",
        "trace" => "trace",
        _ => "info",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(lvl));

    // try_init: tests may call this more than once
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Level used for a run, given the `quiet` setting.
pub fn level_for(quiet: bool) -> &'static str {
    if quiet { "warn" } else { "info" }
}
