//! Structured logging and tracing for the Lens server.
//!
//! Provides structured, span-based, filterable logging via the `tracing`
//! ecosystem: console output with timestamps and module paths, optional
//! JSON file logging for post-mortem analysis, and integration with the
//! configuration system for runtime log level control.

use std::path::Path;

use lens_config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber for the Lens server.
///
/// Sets up:
/// - Console output with uptime timestamps, module paths, and levels
/// - Optional JSON file logging (when `log_dir` is given)
/// - Environment-based filtering (respects RUST_LOG)
/// - Log level override from the config's debug section
pub fn init_logging(log_dir: Option<&Path>, config: Option<&Config>) {
    let filter_str = match config {
        Some(config) if !config.debug.log_level.is_empty() => config.debug.log_level.clone(),
        _ => "info".to_string(),
    };

    // RUST_LOG wins over the config value.
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join("lens.log"))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// Create an `EnvFilter` with the default filter string (`info`).
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new("info")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_is_info() {
        let filter = default_env_filter();
        assert!(format!("{filter}").contains("info"));
    }

    #[test]
    fn test_subsystem_filter_parses() {
        let filter = EnvFilter::new("info,lens_state=debug");
        let rendered = format!("{filter}");
        assert!(rendered.contains("lens_state=debug"));
    }

    #[test]
    fn test_config_level_feeds_filter() {
        let mut config = Config::default();
        config.debug.log_level = "warn,lens_oplog=trace".to_string();
        let filter = EnvFilter::new(&config.debug.log_level);
        let rendered = format!("{filter}");
        assert!(rendered.contains("lens_oplog=trace"));
    }
}
