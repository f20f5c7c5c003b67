//! Tracing subscriber setup from the `logging` config section.

use relay_core::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Filter directive: `RUST_LOG` if set, else `debug` under `--verbose`, else
/// the configured level (default `info`), followed by per-target filters.
pub fn filter_directive(logging: &LoggingConfig, verbose: bool, rust_log: Option<&str>) -> String {
    if let Some(env) = rust_log.filter(|v| !v.trim().is_empty()) {
        return env.to_string();
    }
    let level = if verbose {
        "debug"
    } else {
        logging.level.as_deref().unwrap_or("info")
    };
    std::iter::once(level)
        .chain(logging.filters.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber. Does nothing when logging is disabled.
pub fn init_logging(logging: &LoggingConfig, verbose: bool) -> anyhow::Result<()> {
    if !logging.enabled {
        return Ok(());
    }

    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = EnvFilter::try_new(filter_directive(logging, verbose, rust_log.as_deref()))?;
    let json = logging.format == "json";
    let stdout = logging.output == "stdout";

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match (json, stdout) {
        (true, true) => builder.json().with_writer(std::io::stdout).init(),
        (true, false) => builder.json().with_writer(std::io::stderr).init(),
        (false, true) => builder.with_writer(std::io::stdout).init(),
        (false, false) => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}
