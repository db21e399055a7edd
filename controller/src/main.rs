use std::sync::Arc;

use actix_web::{web::Data, App, HttpServer};
use controller::config::ControllerConfig;
use controller::context::Context;
use controller::error::{self, Result};
use controller::metrics::ControllerMetrics;
use controller::reconcilers::{autoscaler, namespace_cleanup, pdb_autoscaler, target_pdb};
use controller::telemetry::{healthz, vending_metrics};
use eviction_autoscaler_types::constants::CONTROLLER_BINARY_NAME;
use eviction_autoscaler_types::telemetry::init_telemetry_from_env;
use eviction_autoscaler_types::EvictionAutoScaler;
use futures::future;
use futures::stream::StreamExt;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use kube::runtime::controller::trigger_self;
use kube::runtime::reflector;
use kube::runtime::watcher::{self, Config as WatcherConfig};
use kube::runtime::{predicates, Controller, WatchStreamExt};
use kube::{Api, Client};
use kube_leader_election::{LeaseLock, LeaseLockParams};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use snafu::ResultExt;
use tokio::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry_from_env().context(error::TracingConfigurationSnafu)?;

    let config = ControllerConfig::from_environment()?;
    let client = Client::try_default().await.context(error::ClientCreateSnafu)?;

    let registry = prometheus::Registry::new();
    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()
        .context(error::MetricsExporterSnafu)?;
    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();
    opentelemetry::global::set_meter_provider(meter_provider);
    let meter = opentelemetry::global::meter(CONTROLLER_BINARY_NAME);

    let metrics = ControllerMetrics::new(meter);
    let ctx = Arc::new(Context::new(client.clone(), config.clone(), metrics));

    let metrics_server = run_metrics_server(registry, config.metrics_bind_addr.clone());

    let holder_id = std::env::var("POD_NAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| format!("{}-{}", CONTROLLER_BINARY_NAME, uuid::Uuid::new_v4()));

    let leadership = LeaseLock::new(
        client.clone(),
        &config.leader_election_namespace,
        LeaseLockParams {
            holder_id,
            lease_name: format!("{CONTROLLER_BINARY_NAME}-lock"),
            lease_ttl: Duration::from_secs(15),
        },
    );

    let mut controller_task: Option<tokio::task::JoinHandle<()>> = None;
    let mut tick = tokio::time::interval(Duration::from_secs(5));

    let leader_loop = async {
        loop {
            tick.tick().await;

            let lease = match leadership.try_acquire_or_renew().await {
                Ok(lease) => lease,
                Err(err) => {
                    error!(error = %err, "leader election renew/acquire failed");
                    if let Some(task) = controller_task.take() {
                        task.abort();
                    }
                    continue;
                }
            };

            if lease.acquired_lease {
                if controller_task.is_none() {
                    info!("acquired leadership; starting reconcilers");
                    controller_task = Some(tokio::spawn(run_controllers(ctx.clone())));
                }
            } else if let Some(task) = controller_task.take() {
                info!("lost leadership; stopping reconcilers");
                task.abort();
            }
        }
    };

    tokio::select! {
        _ = leader_loop => {}
        result = metrics_server => {
            result.context(error::HttpServerErrorSnafu)?;
        }
    }

    Ok(())
}

/// Only the replica count matters to `target_pdb::reconcile`; other spec or
/// label edits on a Deployment/StatefulSet shouldn't wake the reconciler.
fn deployment_replica_count(deployment: &Deployment) -> Option<u64> {
    deployment.spec.as_ref()?.replicas.map(|r| r as u64)
}

fn statefulset_replica_count(statefulset: &StatefulSet) -> Option<u64> {
    statefulset.spec.as_ref()?.replicas.map(|r| r as u64)
}

/// `pdb_autoscaler::reconcile` only cares whether the `ownedBy` annotation's
/// value has changed; any other PDB edit (or a delete, filtered out below) is
/// not its concern.
fn owned_by_annotation(pdb: &PodDisruptionBudget) -> Option<u64> {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    eviction_autoscaler_types::annotations::get_annotation(
        pdb.metadata.annotations.as_ref(),
        eviction_autoscaler_types::constants::PDB_OWNED_BY_ANNOTATION,
    )
    .hash(&mut hasher);
    Some(hasher.finish())
}

/// Builds a filtered self-watch for a resource kind: only objects passing
/// `keep` are forwarded, and only changes to `predicate`'s projection of an
/// object trigger a reconcile.
fn filtered_controller<K, P>(
    client: Client,
    keep: impl Fn(&K) -> bool + Send + 'static,
    predicate: P,
) -> Controller<K>
where
    K: kube::Resource<DynamicType = ()>
        + Clone
        + std::fmt::Debug
        + serde::de::DeserializeOwned
        + Send
        + Sync
        + 'static,
    P: predicates::Predicate<K> + Send + 'static,
{
    let api: Api<K> = Api::all(client);
    let (reader, writer) = reflector::store::<K>();
    let stream = watcher::watcher(api, WatcherConfig::default())
        .default_backoff()
        .reflect(writer)
        .touched_objects()
        .filter(move |obj| {
            future::ready(obj.as_ref().map(|o| keep(o)).unwrap_or(true))
        })
        .predicate_filter(predicate);
    Controller::for_stream(trigger_self(stream, ()), reader)
}

async fn run_controllers(ctx: Arc<Context>) {
    let client = ctx.client.clone();

    let deployment_controller =
        filtered_controller(client.clone(), |_: &Deployment| true, deployment_replica_count)
            .run(target_pdb::reconcile, target_pdb::error_policy, ctx.clone())
            .for_each(|_| async {});

    let statefulset_controller =
        filtered_controller(client.clone(), |_: &StatefulSet| true, statefulset_replica_count)
            .run(target_pdb::reconcile, target_pdb::error_policy, ctx.clone())
            .for_each(|_| async {});

    let pdb_controller = filtered_controller(
        client.clone(),
        |pdb: &PodDisruptionBudget| pdb.metadata.deletion_timestamp.is_none(),
        owned_by_annotation,
    )
    .run(pdb_autoscaler::reconcile, pdb_autoscaler::error_policy, ctx.clone())
    .for_each(|_| async {});

    let autoscalers: Api<EvictionAutoScaler> = Api::all(client.clone());
    let autoscaler_controller = Controller::new(autoscalers, WatcherConfig::default())
        .run(autoscaler::reconcile, autoscaler::error_policy, ctx.clone())
        .for_each(|_| async {});

    let namespaces: Api<Namespace> = Api::all(client);
    let namespace_controller = Controller::new(namespaces, WatcherConfig::default())
        .run(namespace_cleanup::reconcile, namespace_cleanup::error_policy, ctx)
        .for_each(|_| async {});

    tokio::join!(
        deployment_controller,
        statefulset_controller,
        pdb_controller,
        autoscaler_controller,
        namespace_controller,
    );
}

async fn run_metrics_server(registry: prometheus::Registry, bind_addr: String) -> std::io::Result<()> {
    HttpServer::new(move || {
        App::new()
            .app_data(Data::new(registry.clone()))
            .service(vending_metrics)
            .service(healthz)
    })
    .bind(&bind_addr)?
    .run()
    .await
}
