//! Environment-driven startup configuration for the controller binary
//! (SPEC_FULL §4.7).

use std::env;
use std::time::Duration;

use eviction_autoscaler_types::namespace::FilterMode;
use snafu::OptionExt;

use crate::error::{self, Result};

const NAMESPACE_FILTER_MODE_ENV_VAR: &str = "NAMESPACE_FILTER_MODE";
const NAMESPACE_ALLOWLIST_ENV_VAR: &str = "NAMESPACE_ALLOWLIST";
const LEADER_ELECTION_NAMESPACE_ENV_VAR: &str = "LEADER_ELECTION_NAMESPACE";
const COOLDOWN_SECS_ENV_VAR: &str = "EVICTION_AUTOSCALER_COOLDOWN_SECS";
const METRICS_BIND_ADDR_ENV_VAR: &str = "METRICS_BIND_ADDR";

const DEFAULT_LEADER_ELECTION_NAMESPACE: &str = "default";
const DEFAULT_METRICS_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Clone, Debug)]
pub struct ControllerConfig {
    pub namespace_filter_mode: FilterMode,
    pub namespace_allowlist: Vec<String>,
    pub leader_election_namespace: String,
    pub cooldown: Duration,
    pub metrics_bind_addr: String,
}

impl ControllerConfig {
    pub fn from_environment() -> Result<Self> {
        let namespace_filter_mode = match env::var(NAMESPACE_FILTER_MODE_ENV_VAR) {
            Ok(value) => {
                FilterMode::from_str_opt(&value).context(error::InvalidEnvVarSnafu {
                    variable: NAMESPACE_FILTER_MODE_ENV_VAR.to_string(),
                    value,
                })?
            }
            Err(_) => FilterMode::OptIn,
        };

        let namespace_allowlist = env::var(NAMESPACE_ALLOWLIST_ENV_VAR)
            .ok()
            .map(|raw| raw.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();

        let leader_election_namespace = env::var(LEADER_ELECTION_NAMESPACE_ENV_VAR)
            .unwrap_or_else(|_| DEFAULT_LEADER_ELECTION_NAMESPACE.to_string());

        let cooldown = match env::var(COOLDOWN_SECS_ENV_VAR) {
            Ok(raw) => {
                let secs: u64 = raw.parse().ok().context(error::InvalidEnvVarSnafu {
                    variable: COOLDOWN_SECS_ENV_VAR.to_string(),
                    value: raw,
                })?;
                Duration::from_secs(secs)
            }
            Err(_) => Duration::from_secs(eviction_autoscaler_types::constants::DEFAULT_COOLDOWN_SECS),
        };

        let metrics_bind_addr =
            env::var(METRICS_BIND_ADDR_ENV_VAR).unwrap_or_else(|_| DEFAULT_METRICS_BIND_ADDR.to_string());

        Ok(ControllerConfig {
            namespace_filter_mode,
            namespace_allowlist,
            leader_election_namespace,
            cooldown,
            metrics_bind_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_opt_in_and_default_cooldown() {
        env::remove_var(NAMESPACE_FILTER_MODE_ENV_VAR);
        env::remove_var(COOLDOWN_SECS_ENV_VAR);
        env::remove_var(NAMESPACE_ALLOWLIST_ENV_VAR);
        let config = ControllerConfig::from_environment().unwrap();
        assert_eq!(config.namespace_filter_mode, FilterMode::OptIn);
        assert_eq!(config.cooldown, Duration::from_secs(300));
        assert!(config.namespace_allowlist.is_empty());
    }

    #[test]
    fn parses_overrides() {
        env::set_var(NAMESPACE_FILTER_MODE_ENV_VAR, "opt-out");
        env::set_var(COOLDOWN_SECS_ENV_VAR, "30");
        env::set_var(NAMESPACE_ALLOWLIST_ENV_VAR, "team-a, team-b");
        let config = ControllerConfig::from_environment().unwrap();
        assert_eq!(config.namespace_filter_mode, FilterMode::OptOut);
        assert_eq!(config.cooldown, Duration::from_secs(30));
        assert_eq!(config.namespace_allowlist, vec!["team-a", "team-b"]);
        env::remove_var(NAMESPACE_FILTER_MODE_ENV_VAR);
        env::remove_var(COOLDOWN_SECS_ENV_VAR);
        env::remove_var(NAMESPACE_ALLOWLIST_ENV_VAR);
    }

    #[test]
    fn rejects_invalid_mode() {
        env::set_var(NAMESPACE_FILTER_MODE_ENV_VAR, "sometimes");
        assert!(ControllerConfig::from_environment().is_err());
        env::remove_var(NAMESPACE_FILTER_MODE_ENV_VAR);
    }
}
