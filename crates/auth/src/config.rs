//! Operational settings for the authorization gate.
//!
//! Grants are code; only lookup behaviour is configurable.

use std::time::Duration;

pub const STORE_TIMEOUT_ENV: &str = "RENTGATE_STORE_TIMEOUT_MS";
pub const CACHE_MEMBERSHIP_ENV: &str = "RENTGATE_CACHE_MEMBERSHIP";

const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(2_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    /// Deadline for each collaborator store lookup.
    pub store_timeout: Duration,
    /// Memoise the membership lookup on the evaluation context.
    pub cache_membership: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            store_timeout: DEFAULT_STORE_TIMEOUT,
            cache_membership: true,
        }
    }
}

impl GateConfig {
    /// Read settings from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let store_timeout = match lookup(STORE_TIMEOUT_ENV) {
            None => defaults.store_timeout,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => {
                    tracing::warn!(value = %raw, "{STORE_TIMEOUT_ENV} is not a positive integer; using default");
                    defaults.store_timeout
                }
            },
        };

        let cache_membership = match lookup(CACHE_MEMBERSHIP_ENV) {
            None => defaults.cache_membership,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    tracing::warn!(value = %raw, "{CACHE_MEMBERSHIP_ENV} is not a boolean; using default");
                    defaults.cache_membership
                }
            },
        };

        Self {
            store_timeout,
            cache_membership,
        }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_membership_cache(mut self, enabled: bool) -> Self {
        self.cache_membership = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(pairs: &[(&str, &str)]) -> GateConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GateConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(from_map(&[]), GateConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let config = from_map(&[(STORE_TIMEOUT_ENV, "250"), (CACHE_MEMBERSHIP_ENV, "off")]);
        assert_eq!(config.store_timeout, Duration::from_millis(250));
        assert!(!config.cache_membership);
    }

    #[test]
    fn malformed_values_fall_back() {
        let config = from_map(&[(STORE_TIMEOUT_ENV, "0"), (CACHE_MEMBERSHIP_ENV, "maybe")]);
        assert_eq!(config, GateConfig::default());
    }
}
