use kube::Client;

use crate::config::ControllerConfig;
use crate::metrics::ControllerMetrics;

/// Shared state injected into every reconciler invocation. Cheap to clone:
/// every field is itself a handle (kube's client is `Arc`-backed internally,
/// and `ControllerMetrics` wraps its snapshot in an `Arc<Mutex<_>>`).
#[derive(Clone)]
pub struct Context {
    pub client: Client,
    pub config: ControllerConfig,
    pub metrics: ControllerMetrics,
}

impl Context {
    pub fn new(client: Client, config: ControllerConfig, metrics: ControllerMetrics) -> Self {
        Context { client, config, metrics }
    }

    pub fn namespace_enabled(
        &self,
        namespace: &k8s_openapi::api::core::v1::Namespace,
    ) -> eviction_autoscaler_types::error::Result<bool> {
        eviction_autoscaler_types::namespace::is_enabled(
            namespace,
            self.config.namespace_filter_mode,
            &self.config.namespace_allowlist,
        )
    }
}
