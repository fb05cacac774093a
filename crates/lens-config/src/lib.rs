//! Configuration system for the Lens sync server.
//!
//! Runtime-configurable settings persisted to disk as RON files, with CLI
//! overrides via clap, hot-reload detection, and forward/backward
//! compatible serialization.

mod cli;
mod config;
mod error;

pub use cli::{CliArgs, RetentionArg};
pub use config::{
    CompressionSection, Config, DebugSection, OplogSection, ResolverSection, RetentionMode,
    ServerSection, StateSection, default_config_dir,
};
pub use error::ConfigError;
