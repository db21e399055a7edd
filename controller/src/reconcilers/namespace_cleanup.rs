//! Namespace cleanup reconciler (SPEC_FULL §4.6). Reacts only to namespaces
//! crossing the enabled/disabled boundary; creation and deletion of the
//! namespace itself are ignored.

use std::sync::Arc;

use eviction_autoscaler_types::{constants, pdb as pdb_helpers, EvictionAutoScaler};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::ResourceExt;
use snafu::ResultExt;
use tracing::{info, warn};

use crate::context::Context;
use crate::error::{self, Error, Result};
use crate::reconcilers::target_pdb;

pub async fn reconcile(namespace: Arc<Namespace>, ctx: Arc<Context>) -> Result<Action> {
    let name = namespace.name_any();
    if constants::HARDCODED_EXCLUDED_NAMESPACES.contains(&name.as_str()) {
        return Ok(Action::await_change());
    }

    // Deletion of the namespace itself is not a boundary crossing; the API
    // server's own garbage collection reclaims everything inside it.
    if namespace.metadata.deletion_timestamp.is_some() {
        return Ok(Action::await_change());
    }

    let enabled = ctx.namespace_enabled(&namespace).context(error::TypesSnafu)?;
    let last_swept = eviction_autoscaler_types::annotations::get_annotation(
        namespace.metadata.annotations.as_ref(),
        constants::NAMESPACE_LAST_SWEPT_STATE_ANNOTATION,
    );

    if last_swept == Some(if enabled { "true" } else { "false" }) {
        ctx.metrics.record_reconcile("namespace_cleanup", "unchanged");
        return Ok(Action::await_change());
    }

    if enabled {
        reconcile_enabled(&ctx, &name).await?;
        ctx.metrics.record_reconcile("namespace_cleanup", "enabled");
    } else {
        reconcile_disabled(&ctx, &name).await;
        ctx.metrics.record_reconcile("namespace_cleanup", "disabled");
    }

    record_swept_state(&ctx, &name, enabled).await?;

    Ok(Action::await_change())
}

async fn record_swept_state(ctx: &Context, namespace: &str, enabled: bool) -> Result<()> {
    let namespaces: Api<Namespace> = Api::all(ctx.client.clone());
    let patch = serde_json::json!({
        "metadata": {
            "annotations": {
                constants::NAMESPACE_LAST_SWEPT_STATE_ANNOTATION: if enabled { "true" } else { "false" }
            }
        }
    });
    namespaces
        .patch(namespace, &PatchParams::default(), &Patch::Merge(patch))
        .await
        .context(error::KubeApiSnafu)?;
    Ok(())
}

async fn reconcile_enabled(ctx: &Context, namespace: &str) -> Result<()> {
    let deployments: Api<Deployment> = Api::namespaced(ctx.client.clone(), namespace);
    let list = deployments.list(&ListParams::default()).await.context(error::KubeApiSnafu)?;
    for deployment in list.items {
        let action = target_pdb::reconcile(Arc::new(deployment), Arc::new(ctx.clone())).await;
        if let Err(err) = action {
            warn!(error = %err, "failed to reconcile deployment during namespace enable sweep");
        }
    }
    Ok(())
}

async fn reconcile_disabled(ctx: &Context, namespace: &str) {
    let pdbs: Api<PodDisruptionBudget> = Api::namespaced(ctx.client.clone(), namespace);
    match pdbs.list(&ListParams::default()).await {
        Ok(list) => {
            for pdb in list.items.into_iter().filter(pdb_helpers::is_controller_owned_pdb) {
                let name = pdb.name_any();
                if let Err(err) = pdbs.delete(&name, &Default::default()).await {
                    warn!(error = %err, pdb = %name, "failed to delete owned PDB during namespace disable sweep");
                }
            }
        }
        Err(err) => warn!(error = %err, namespace, "failed to list PDBs during namespace disable sweep"),
    }

    let autoscalers: Api<EvictionAutoScaler> = Api::namespaced(ctx.client.clone(), namespace);
    match autoscalers.list(&ListParams::default()).await {
        Ok(list) => {
            for autoscaler in list.items {
                let name = autoscaler.name_any();
                if let Err(err) = autoscalers.delete(&name, &Default::default()).await {
                    warn!(error = %err, autoscaler = %name, "failed to delete AutoScaler during namespace disable sweep");
                }
            }
        }
        Err(err) => warn!(error = %err, namespace, "failed to list AutoScalers during namespace disable sweep"),
    }

    info!(namespace, "swept controller-owned objects after namespace disable");
}

pub fn error_policy(_namespace: Arc<Namespace>, error: &Error, _ctx: Arc<Context>) -> Action {
    tracing::error!(error = %error, "namespace_cleanup reconcile failed");
    Action::requeue(std::time::Duration::from_secs(30))
}
