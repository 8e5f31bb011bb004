//! Runtime configuration read from the environment.
//!
//! # Invariants
//! - Malformed values never fail startup; they fall back to defaults and emit
//!   a `config` warning event.

use log::warn;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DB_PATH: &str = "ENGLEARN_DB_PATH";
pub const ENV_REMOTE_TIMEOUT_MS: &str = "ENGLEARN_REMOTE_TIMEOUT_MS";
pub const ENV_EMPTY_REMOTE: &str = "ENGLEARN_EMPTY_REMOTE";
pub const ENV_LOG_DIR: &str = "ENGLEARN_LOG_DIR";
pub const ENV_LOG_LEVEL: &str = "ENGLEARN_LOG_LEVEL";

const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(5);

/// How a successful remote listing with zero rows is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptyRemotePolicy {
    /// Zero rows means "nothing published yet"; serve static data.
    #[default]
    FallBackToStatic,
    /// Zero rows is the authoritative answer for the scope.
    Authoritative,
}

impl EmptyRemotePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fallback" | "static" => Some(Self::FallBackToStatic),
            "authoritative" | "trust" => Some(Self::Authoritative),
            _ => None,
        }
    }
}

/// Tunables for `DataResolver`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Upper bound for every remote call (listing and propagation).
    pub remote_timeout: Duration,
    pub empty_remote: EmptyRemotePolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
            empty_remote: EmptyRemotePolicy::default(),
        }
    }
}

impl ResolverConfig {
    /// Reads overrides from `ENGLEARN_REMOTE_TIMEOUT_MS` and `ENGLEARN_EMPTY_REMOTE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = non_blank(lookup(ENV_REMOTE_TIMEOUT_MS)) {
            match raw.parse::<u64>() {
                Ok(millis) if millis > 0 => config.remote_timeout = Duration::from_millis(millis),
                _ => warn!(
                    "event=config module=config status=fallback key={ENV_REMOTE_TIMEOUT_MS} value={raw}"
                ),
            }
        }

        if let Some(raw) = non_blank(lookup(ENV_EMPTY_REMOTE)) {
            match EmptyRemotePolicy::parse(&raw) {
                Some(policy) => config.empty_remote = policy,
                None => warn!(
                    "event=config module=config status=fallback key={ENV_EMPTY_REMOTE} value={raw}"
                ),
            }
        }

        config
    }
}

/// Path of the content database, if one is configured.
pub fn remote_db_path_from_env() -> Option<PathBuf> {
    non_blank(std::env::var(ENV_DB_PATH).ok()).map(PathBuf::from)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}
