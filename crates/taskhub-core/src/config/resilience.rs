//! Admission gate and deadline configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the resilience layer wrapped around every
/// outbound database call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Permit capacity of the database admission gate.
    #[serde(default = "default_database_permits")]
    pub database_permits: usize,
    /// Deadline in seconds for short reads (lookups by key).
    #[serde(default = "default_read_timeout")]
    pub read_timeout_seconds: u64,
    /// Deadline in seconds for writes and multi-row queries.
    #[serde(default = "default_write_timeout")]
    pub write_timeout_seconds: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            database_permits: default_database_permits(),
            read_timeout_seconds: default_read_timeout(),
            write_timeout_seconds: default_write_timeout(),
        }
    }
}

fn default_database_permits() -> usize {
    50
}

fn default_read_timeout() -> u64 {
    3
}

fn default_write_timeout() -> u64 {
    5
}
