// Logging module, powered by tracing-subscriber
//
// Library code logs through the `log` macros. `tracing_log::LogTracer`
// forwards those records into the tracing subscriber installed here.
// Everything goes to stderr so that stdout carries only the result tables.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Build the `EnvFilter` from the base level plus quiet overrides for the
/// database driver.
fn build_env_filter(level: &str) -> anyhow::Result<EnvFilter> {
    let mut directives = vec![level.to_string()];

    let noisy: &[(&str, &str)] = &[
        ("tokio_postgres", "warn"),
        ("postgres_protocol", "warn"),
        ("tracing", "warn"),
    ];
    for (target, lvl) in noisy {
        directives.push(format!("{}={}", target, lvl));
    }

    let filter_str = directives.join(",");
    EnvFilter::try_new(&filter_str)
        .map_err(|e| anyhow::anyhow!("Invalid log filter '{}': {}", filter_str, e))
}

/// Install the console subscriber and the `log` bridge.
pub fn init_logging(level: &str) -> anyhow::Result<()> {
    tracing_log::LogTracer::init().ok(); // ok() in case already initialized

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .with_filter(build_env_filter(level)?);

    tracing_subscriber::registry()
        .with(console_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))?;

    tracing::trace!("Logging initialized: level={}", level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_accepts_levels_and_directives() {
        assert!(build_env_filter("info").is_ok());
        assert!(build_env_filter("query_bench=debug").is_ok());
    }

    #[test]
    fn test_filter_rejects_garbage() {
        assert!(build_env_filter("query_bench=loud").is_err());
    }
}
