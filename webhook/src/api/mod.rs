//! The webhook's actix-web server: route wiring and TLS termination.
//! Grounded on `apiserver/src/api/mod.rs`'s `run_server` shape, adapted to
//! rustls (the workspace's pinned `actix-web` already carries the
//! `rustls-0_23` feature) instead of the teacher's openssl setup.

mod health;
mod metrics;
mod validate;

use std::sync::Arc;

use actix_web::{web::Data, App, HttpServer};
use rustls::ServerConfig;
use snafu::ResultExt;
use tracing_actix_web::TracingLogger;

use crate::client::ClusterReader;
use crate::error::{self, Result};
use crate::telemetry::WebhookRootSpanBuilder;

/// Settings applied to the webhook server, provided to every route via
/// actix's application-data system.
#[derive(Clone)]
pub struct ApiServerSettings {
    pub cluster_reader: Arc<dyn ClusterReader>,
    pub bind_addr: String,
    pub tls_config: ServerConfig,
    pub registry: prometheus::Registry,
}

pub async fn run_server(settings: ApiServerSettings) -> Result<()> {
    let cluster_reader = settings.cluster_reader.clone();
    let registry = settings.registry.clone();
    let bind_addr = settings.bind_addr.clone();
    let tls_config = settings.tls_config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::<WebhookRootSpanBuilder>::new())
            .app_data(Data::new(cluster_reader.clone()))
            .app_data(Data::new(registry.clone()))
            .service(validate::validate_eviction)
            .service(health::healthz)
            .service(metrics::vending_metrics)
    })
    .bind_rustls_0_23(bind_addr, tls_config)
    .context(error::HttpServerErrorSnafu)?
    .run()
    .await
    .context(error::HttpServerErrorSnafu)?;

    Ok(())
}
