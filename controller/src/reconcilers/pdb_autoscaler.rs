//! PDB -> AutoScaler reconciler (SPEC_FULL §4.3): ownership transfer, then
//! pairing every PDB with exactly one AutoScaler.

use std::sync::Arc;

use eviction_autoscaler_types::owner::controller_owner_reference;
use eviction_autoscaler_types::{pdb as pdb_helpers, AutoScalerSpec, EvictionAutoScaler};
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::runtime::controller::Action;
use kube::ResourceExt;
use snafu::ResultExt;
use tracing::{info, instrument};

use crate::context::Context;
use crate::discovery::{self, DiscoveredTarget};
use crate::error::{self, Error, Result};

pub async fn reconcile(pdb: Arc<PodDisruptionBudget>, ctx: Arc<Context>) -> Result<Action> {
    let namespace = pdb.namespace().unwrap_or_else(|| "default".to_string());
    let pdbs: Api<PodDisruptionBudget> = Api::namespaced(ctx.client.clone(), &namespace);

    if let Some(updated) = transfer_ownership(&pdbs, &pdb, &ctx, &namespace).await? {
        ctx.metrics.record_reconcile("pdb_autoscaler", "ownership_transferred");
        return reconcile_inner(updated, ctx, namespace).await;
    }

    reconcile_inner((*pdb).clone(), ctx, namespace).await
}

async fn reconcile_inner(
    pdb: PodDisruptionBudget,
    ctx: Arc<Context>,
    namespace: String,
) -> Result<Action> {
    let namespaces: Api<Namespace> = Api::all(ctx.client.clone());
    let ns_object = namespaces.get(&namespace).await.context(error::KubeApiSnafu)?;
    let enabled = ctx.namespace_enabled(&ns_object).context(error::TypesSnafu)?;

    let pdb_name = pdb.name_any();
    let autoscalers: Api<EvictionAutoScaler> = Api::namespaced(ctx.client.clone(), &namespace);

    if !enabled {
        if !pdb_helpers::is_controller_owned_pdb(&pdb) {
            if autoscalers.get(&pdb_name).await.is_ok() {
                autoscalers
                    .delete(&pdb_name, &Default::default())
                    .await
                    .context(error::KubeApiSnafu)?;
            }
        }
        ctx.metrics.record_reconcile("pdb_autoscaler", "namespace_disabled");
        return Ok(Action::await_change());
    }

    if autoscalers.get(&pdb_name).await.is_ok() {
        ctx.metrics.record_reconcile("pdb_autoscaler", "ok");
        return Ok(Action::await_change());
    }

    let target = match discovery::discover_target(ctx.client.clone(), &namespace, &pdb).await? {
        discovery::DiscoveryOutcome::Found(target) => target,
        discovery::DiscoveryOutcome::NoMatchingPods => {
            return error::LeakyPdbSnafu { pdb: pdb_name.clone() }.fail();
        }
        discovery::DiscoveryOutcome::OwnerNotFound => {
            return error::OwnerNotFoundSnafu { pdb: pdb_name.clone() }.fail();
        }
    };

    create_autoscaler(&autoscalers, &pdb, &target).await?;
    ctx.metrics.record_reconcile("pdb_autoscaler", "created_autoscaler");
    Ok(Action::await_change())
}

/// Runs the ownership-transfer step described in SPEC_FULL §4.3 step 1.
/// Returns `Some(updated pdb)` if a patch was applied, `None` if the PDB was
/// already in a converged state.
#[instrument(skip(pdbs, pdb, ctx), err)]
async fn transfer_ownership(
    pdbs: &Api<PodDisruptionBudget>,
    pdb: &PodDisruptionBudget,
    ctx: &Arc<Context>,
    namespace: &str,
) -> Result<Option<PodDisruptionBudget>> {
    let has_annotation = pdb_helpers::has_owned_by_annotation(pdb);
    let has_owner_ref = pdb_helpers::has_target_owner_reference(pdb);
    let pdb_name = pdb.name_any();

    if !has_annotation && has_owner_ref {
        let retained: Vec<_> = pdb
            .metadata
            .owner_references
            .clone()
            .unwrap_or_default()
            .into_iter()
            .filter(|owner| owner.kind != "Deployment" && owner.kind != "StatefulSet")
            .collect();
        let patch = serde_json::json!({
            "metadata": { "ownerReferences": retained }
        });
        let updated = pdbs
            .patch(&pdb_name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .context(error::KubeApiSnafu)?;
        info!(pdb = %pdb_name, "user reclaimed ownership of PDB, owner reference stripped");
        return Ok(Some(updated));
    }

    if has_annotation && !has_owner_ref {
        let target = discovery::discover_target(ctx.client.clone(), namespace, pdb).await?.into_target();
        if let Some(target) = target {
            let owner = target_owner_reference(&target, pdb)?;
            let mut owners = pdb.metadata.owner_references.clone().unwrap_or_default();
            owners.push(owner);
            let patch = serde_json::json!({
                "metadata": { "ownerReferences": owners }
            });
            let updated = pdbs
                .patch(&pdb_name, &PatchParams::default(), &Patch::Merge(patch))
                .await
                .context(error::KubeApiSnafu)?;
            info!(pdb = %pdb_name, "controller reclaimed ownership of PDB");
            return Ok(Some(updated));
        }
    }

    Ok(None)
}

fn target_owner_reference(
    target: &DiscoveredTarget,
    pdb: &PodDisruptionBudget,
) -> Result<k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference> {
    let kind = match target.kind {
        eviction_autoscaler_types::target::TargetKind::Deployment => "Deployment",
        eviction_autoscaler_types::target::TargetKind::StatefulSet => "StatefulSet",
    };
    let _ = pdb;
    Ok(controller_owner_reference(
        "apps/v1",
        kind,
        target.name.clone(),
        target.uid.clone(),
    ))
}

#[instrument(skip(autoscalers, pdb, target), err)]
async fn create_autoscaler(
    autoscalers: &Api<EvictionAutoScaler>,
    pdb: &PodDisruptionBudget,
    target: &DiscoveredTarget,
) -> Result<()> {
    let pdb_name = pdb.name_any();
    let owner = controller_owner_reference(
        "policy/v1",
        "PodDisruptionBudget",
        pdb_name.clone(),
        pdb.uid().unwrap_or_default(),
    );

    let mut autoscaler = EvictionAutoScaler::new(
        &pdb_name,
        AutoScalerSpec {
            target_name: target.name.clone(),
            target_kind: target.kind.to_string(),
            last_eviction: None,
        },
    );
    autoscaler.meta_mut().owner_references = Some(vec![owner]);

    autoscalers
        .create(&PostParams::default(), &autoscaler)
        .await
        .context(error::KubeApiSnafu)?;
    info!(autoscaler = %pdb_name, target = %target.name, "created AutoScaler");
    Ok(())
}

pub fn error_policy(_pdb: Arc<PodDisruptionBudget>, error: &Error, _ctx: Arc<Context>) -> Action {
    tracing::error!(error = %error, "pdb_autoscaler reconcile failed");
    match error {
        // Structurally leaky: the PDB's selector matches no pods at all.
        // Unlikely to resolve itself soon.
        Error::LeakyPdb { .. } => Action::requeue(std::time::Duration::from_secs(120)),
        // Pods exist but their owner chain doesn't reach a Deployment or
        // StatefulSet yet; often just a rollout still in progress.
        Error::OwnerNotFound { .. } => Action::requeue(std::time::Duration::from_secs(30)),
        _ => Action::requeue(std::time::Duration::from_secs(15)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eviction_autoscaler_types::target::TargetKind;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    #[test]
    fn target_owner_reference_names_deployment_kind() {
        let target = DiscoveredTarget {
            name: "web".to_string(),
            uid: "target-uid".to_string(),
            kind: TargetKind::Deployment,
        };
        let pdb = PodDisruptionBudget {
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let owner = target_owner_reference(&target, &pdb).unwrap();
        assert_eq!(owner.kind, "Deployment");
        assert_eq!(owner.uid, "target-uid");
        assert_eq!(owner.name, "web");
    }

    #[test]
    fn target_owner_reference_names_statefulset_kind() {
        let target = DiscoveredTarget {
            name: "web".to_string(),
            uid: "target-uid".to_string(),
            kind: TargetKind::StatefulSet,
        };
        let pdb = PodDisruptionBudget::default();

        let owner = target_owner_reference(&target, &pdb).unwrap();
        assert_eq!(owner.kind, "StatefulSet");
    }
}
