//! Environment-driven startup configuration for the webhook binary
//! (SPEC_FULL §4.7), mirroring `controller::config`'s `*_ENV_VAR` +
//! `from_environment()` idiom.

use std::env;

use crate::error::Result;

const BIND_ADDR_ENV_VAR: &str = "WEBHOOK_BIND_ADDR";
const TLS_CERT_PATH_ENV_VAR: &str = "WEBHOOK_TLS_CERT_PATH";
const TLS_KEY_PATH_ENV_VAR: &str = "WEBHOOK_TLS_KEY_PATH";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8443";
const DEFAULT_TLS_CERT_PATH: &str = "/etc/eviction-autoscaler-webhook/tls/tls.crt";
const DEFAULT_TLS_KEY_PATH: &str = "/etc/eviction-autoscaler-webhook/tls/tls.key";

#[derive(Clone, Debug)]
pub struct WebhookConfig {
    pub bind_addr: String,
    pub tls_cert_path: String,
    pub tls_key_path: String,
}

impl WebhookConfig {
    pub fn from_environment() -> Result<Self> {
        Ok(WebhookConfig {
            bind_addr: env::var(BIND_ADDR_ENV_VAR).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            tls_cert_path: env::var(TLS_CERT_PATH_ENV_VAR).unwrap_or_else(|_| DEFAULT_TLS_CERT_PATH.to_string()),
            tls_key_path: env::var(TLS_KEY_PATH_ENV_VAR).unwrap_or_else(|_| DEFAULT_TLS_KEY_PATH.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_unset() {
        env::remove_var(BIND_ADDR_ENV_VAR);
        env::remove_var(TLS_CERT_PATH_ENV_VAR);
        env::remove_var(TLS_KEY_PATH_ENV_VAR);
        let config = WebhookConfig::from_environment().unwrap();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.tls_cert_path, DEFAULT_TLS_CERT_PATH);
    }

    #[test]
    fn honors_overrides() {
        env::set_var(BIND_ADDR_ENV_VAR, "127.0.0.1:9443");
        let config = WebhookConfig::from_environment().unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9443");
        env::remove_var(BIND_ADDR_ENV_VAR);
    }
}
