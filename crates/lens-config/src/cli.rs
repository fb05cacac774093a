//! Command-line argument parsing for the Lens server.

use std::path::PathBuf;

use clap::Parser;

use crate::{Config, RetentionMode};

/// Lens server command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "lens", about = "Lens reactive data-sync server")]
pub struct CliArgs {
    /// Bind address.
    #[arg(long)]
    pub bind: Option<String>,

    /// Bind port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Maximum concurrent connections.
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Retention policy for unsubscribed entities (retain, evict, ttl).
    #[arg(long, value_enum)]
    pub retention: Option<RetentionArg>,

    /// Retention TTL in seconds (with --retention ttl).
    #[arg(long)]
    pub retention_ttl: Option<u64>,

    /// Snapshot compression threshold in bytes (0 disables).
    #[arg(long)]
    pub compression_threshold: Option<usize>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// CLI mirror of [`RetentionMode`].
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum RetentionArg {
    /// Keep entities as warm cache.
    Retain,
    /// Drop entities immediately.
    Evict,
    /// Drop entities after the TTL.
    Ttl,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref bind) = args.bind {
            self.server.bind_address = bind.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(max) = args.max_connections {
            self.server.max_connections = max;
        }
        if let Some(retention) = args.retention {
            self.state.retention = match retention {
                RetentionArg::Retain => RetentionMode::Retain,
                RetentionArg::Evict => RetentionMode::Evict,
                RetentionArg::Ttl => RetentionMode::Ttl,
            };
        }
        if let Some(ttl) = args.retention_ttl {
            self.state.retention_ttl_secs = ttl;
        }
        if let Some(threshold) = args.compression_threshold {
            if threshold == 0 {
                self.compression.enabled = false;
            } else {
                self.compression.threshold = threshold;
            }
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
