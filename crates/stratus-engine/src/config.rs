//! Engine configuration.

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Length of the master key sealing SSE-S3 data keys.
pub const MASTER_KEY_LEN: usize = 32;

/// Configuration for the object engine.
///
/// All fields have defaults suitable for tests and single-node deployments;
/// [`EngineConfig::from_env`] overrides them from the environment.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Whether usage counters are updated inside object-mutation
    /// transactions. On by default so `usage` stays consistent; turning it
    /// off sheds the per-write counter update entirely.
    #[builder(default = true)]
    pub piggyback_usage: bool,

    /// Canonical user ids belonging to the log-delivery ACL group.
    #[builder(default)]
    pub log_delivery_group: Vec<String>,

    /// Per-request streaming throttle in bytes per second; `0` disables
    /// throttling.
    #[builder(default = 0)]
    pub throttle_bytes_per_sec: u64,

    /// Master key sealing SSE-S3 data keys.
    #[builder(default = [0u8; MASTER_KEY_LEN])]
    pub master_key: [u8; MASTER_KEY_LEN],

    /// Capacity of the recycle queue.
    #[builder(default = 1024)]
    pub recycle_queue_depth: usize,

    /// Number of recycle worker tasks.
    #[builder(default = 2)]
    pub recycle_workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            piggyback_usage: true,
            log_delivery_group: Vec::new(),
            throttle_bytes_per_sec: 0,
            master_key: [0u8; MASTER_KEY_LEN],
            recycle_queue_depth: 1024,
            recycle_workers: 2,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults:
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `STRATUS_PIGGYBACK_USAGE` | `true` |
    /// | `STRATUS_LOG_DELIVERY_GROUP` | empty (comma separated ids) |
    /// | `STRATUS_THROTTLE_BPS` | `0` |
    /// | `STRATUS_MASTER_KEY` | all-zero (64 hex chars) |
    /// | `STRATUS_RECYCLE_QUEUE_DEPTH` | `1024` |
    /// | `STRATUS_RECYCLE_WORKERS` | `2` |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("STRATUS_PIGGYBACK_USAGE") {
            config.piggyback_usage = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("STRATUS_LOG_DELIVERY_GROUP") {
            config.log_delivery_group = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect();
        }
        if let Ok(v) = std::env::var("STRATUS_THROTTLE_BPS") {
            if let Ok(n) = v.parse() {
                config.throttle_bytes_per_sec = n;
            }
        }
        if let Ok(v) = std::env::var("STRATUS_MASTER_KEY") {
            if let Ok(bytes) = hex::decode(&v) {
                if bytes.len() == MASTER_KEY_LEN {
                    config.master_key.copy_from_slice(&bytes);
                }
            }
        }
        if let Ok(v) = std::env::var("STRATUS_RECYCLE_QUEUE_DEPTH") {
            if let Ok(n) = v.parse() {
                config.recycle_queue_depth = n;
            }
        }
        if let Ok(v) = std::env::var("STRATUS_RECYCLE_WORKERS") {
            if let Ok(n) = v.parse() {
                config.recycle_workers = n;
            }
        }

        config
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
