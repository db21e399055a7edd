use std::sync::Arc;

use eviction_autoscaler_types::telemetry::init_telemetry_from_env;
use eviction_autoscaler_webhook::api::{run_server, ApiServerSettings};
use eviction_autoscaler_webhook::client::{ClusterReader, KubeClusterReader};
use eviction_autoscaler_webhook::config::WebhookConfig;
use eviction_autoscaler_webhook::error::{self, Result};
use eviction_autoscaler_webhook::tls::load_server_config;
use kube::Client;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use snafu::ResultExt;

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry_from_env().context(error::TracingConfigurationSnafu)?;

    let config = WebhookConfig::from_environment()?;
    let client = Client::try_default().await.context(error::ClientCreateSnafu)?;
    let tls_config = load_server_config(&config.tls_cert_path, &config.tls_key_path)?;
    let cluster_reader: Arc<dyn ClusterReader> = Arc::new(KubeClusterReader { client });

    let registry = prometheus::Registry::new();
    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()
        .context(error::MetricsExporterSnafu)?;
    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();
    opentelemetry::global::set_meter_provider(meter_provider);

    run_server(ApiServerSettings {
        cluster_reader,
        bind_addr: config.bind_addr,
        tls_config,
        registry,
    })
    .await
}
