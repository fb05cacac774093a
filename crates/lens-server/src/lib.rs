//! Transport-facing server core.
//!
//! A transport hands inbound bytes to [`LensServer::handle_message`] and
//! drains one ordered outbound queue per client; everything else (engine
//! dispatch, state fan-out, reconnect reconciliation) happens behind that
//! seam. A length-prefixed TCP adapter is included; any framing that can
//! move bytes both ways can host the core.

mod server;
mod transport;

pub use server::LensServer;
pub use transport::{FrameConfig, FrameError, TcpTransport, TransportConfig, read_frame, write_frame};

use std::time::Duration;

use lens_config::{Config, RetentionMode};
use lens_oplog::LogConfig;
use lens_resolve::ResolveConfig;
use lens_state::{RetentionPolicy, StatePolicy};
use lens_wire::CompressionConfig;

/// Maps the file-level config onto the state manager's policy.
pub fn state_policy_from(config: &Config) -> StatePolicy {
    StatePolicy {
        retention: match config.state.retention {
            RetentionMode::Retain => RetentionPolicy::Retain,
            RetentionMode::Evict => RetentionPolicy::Evict,
            RetentionMode::Ttl => {
                RetentionPolicy::Ttl(Duration::from_secs(config.state.retention_ttl_secs))
            }
        },
        log: LogConfig {
            max_entries: config.oplog.max_entries,
            max_bytes: config.oplog.max_bytes,
            max_age: Duration::from_secs(config.oplog.max_age_secs),
        },
        compression: CompressionConfig {
            enabled: config.compression.enabled,
            threshold: config.compression.threshold,
        },
    }
}

/// Maps the file-level config onto the resolver graph's config.
pub fn resolve_config_from(config: &Config) -> ResolveConfig {
    ResolveConfig {
        allow_shape_inference: config.resolver.allow_shape_inference,
        max_depth: config.resolver.max_depth,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_mapping_ttl() {
        let mut config = Config::default();
        config.state.retention = RetentionMode::Ttl;
        config.state.retention_ttl_secs = 42;
        let policy = state_policy_from(&config);
        assert_eq!(policy.retention, RetentionPolicy::Ttl(Duration::from_secs(42)));
    }

    #[test]
    fn test_policy_mapping_defaults() {
        let policy = state_policy_from(&Config::default());
        assert_eq!(policy.retention, RetentionPolicy::Retain);
        assert!(policy.compression.enabled);
        assert_eq!(policy.log.max_entries, 10_000);
    }
}
