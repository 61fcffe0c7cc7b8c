//! Authentication configuration.

use serde::{Deserialize, Serialize};

/// Policy applied when a superseded refresh token is presented again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplayContainment {
    /// Reject only the replayed request; the live lineage survives.
    RejectOnly,
    /// Revoke every live refresh token of the affected user
    /// (theft containment).
    RevokeLineage,
}

/// Authentication and credential configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secret key for JWT signing (HMAC-SHA256).
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Access token TTL in minutes.
    #[serde(default = "default_access_ttl")]
    pub access_ttl_minutes: u64,
    /// Refresh token TTL in days.
    #[serde(default = "default_refresh_ttl_days")]
    pub refresh_ttl_days: u64,
    /// Seconds past nominal expiry during which a refresh token is still
    /// accepted. Absorbs clock skew between issuing and validating hosts.
    #[serde(default = "default_refresh_grace")]
    pub refresh_grace_seconds: u64,
    /// Reaction to a replayed (already-rotated) refresh token.
    #[serde(default = "default_replay_containment")]
    pub replay_containment: ReplayContainment,
    /// Minimum password length.
    #[serde(default = "default_password_min")]
    pub password_min_length: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            access_ttl_minutes: default_access_ttl(),
            refresh_ttl_days: default_refresh_ttl_days(),
            refresh_grace_seconds: default_refresh_grace(),
            replay_containment: default_replay_containment(),
            password_min_length: default_password_min(),
        }
    }
}

fn default_jwt_secret() -> String {
    "CHANGE_ME_IN_PRODUCTION".to_string()
}

fn default_access_ttl() -> u64 {
    15
}

fn default_refresh_ttl_days() -> u64 {
    7
}

fn default_refresh_grace() -> u64 {
    10
}

fn default_replay_containment() -> ReplayContainment {
    ReplayContainment::RejectOnly
}

fn default_password_min() -> usize {
    8
}
