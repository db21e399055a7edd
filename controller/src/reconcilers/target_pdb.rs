//! Target -> PDB reconciler (SPEC_FULL §4.2). Watches Deployments and
//! StatefulSets through the same generic entrypoint, since [`ScalableTarget`]
//! erases the difference between the two kinds.

use std::collections::BTreeMap;
use std::sync::Arc;

use eviction_autoscaler_types::owner::controller_owner_reference;
use eviction_autoscaler_types::target::ScalableTarget;
use eviction_autoscaler_types::{annotations, pdb as pdb_helpers, EvictionAutoScaler};
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::policy::v1::{PodDisruptionBudget, PodDisruptionBudgetSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::{Api, ListParams, Patch, PatchParams, PostParams};
use kube::runtime::controller::Action;
use kube::ResourceExt;
use snafu::{OptionExt, ResultExt};
use tracing::{info, instrument, warn};

use crate::error::{self, Error, Result};
use crate::context::Context;

pub async fn reconcile<T>(target: Arc<T>, ctx: Arc<Context>) -> Result<Action>
where
    T: ScalableTarget + Clone + std::fmt::Debug + Send + Sync + 'static,
{
    if target.meta().deletion_timestamp.is_some() {
        ctx.metrics.record_reconcile("target_pdb", "deleting");
        return Ok(Action::await_change());
    }

    let namespace = target
        .namespace()
        .context(eviction_autoscaler_types::error::MissingNamespaceSnafu {
            name: target.name_any(),
        })
        .context(error::TypesSnafu)?;

    let namespaces: Api<Namespace> = Api::all(ctx.client.clone());
    let ns_object = namespaces.get(&namespace).await.context(error::KubeApiSnafu)?;
    if !ctx
        .namespace_enabled(&ns_object)
        .context(error::TypesSnafu)?
    {
        ctx.metrics.record_reconcile("target_pdb", "namespace_disabled");
        return Ok(Action::await_change());
    }

    let pdb_create_allowed = match annotations::pdb_creation_allowed(target.meta().annotations.as_ref()) {
        Ok(allowed) => allowed,
        Err(err) => {
            warn!(
                target = %target.name_any(),
                error = %err,
                "malformed pdb-create annotation; skipping until it is fixed"
            );
            ctx.metrics.record_reconcile("target_pdb", "bad_annotation");
            return Ok(Action::await_change());
        }
    };
    if !pdb_create_allowed || target.max_unavailable_is_nonzero() {
        ctx.metrics.record_reconcile("target_pdb", "skipped");
        return Ok(Action::await_change());
    }

    let target_labels = target.pod_template_labels().context(error::TypesSnafu)?.clone();
    let replicas = target.replicas().unwrap_or(1);

    let pdbs: Api<PodDisruptionBudget> = Api::namespaced(ctx.client.clone(), &namespace);
    let existing = find_matching_pdb(&pdbs, &target_labels).await?;

    match existing {
        None => {
            create_pdb(&pdbs, &target, &namespace, &target_labels, replicas).await?;
            ctx.metrics.record_reconcile("target_pdb", "created_pdb");
        }
        Some(pdb) => {
            reconcile_existing_pdb(ctx.clone(), &pdbs, &pdb, &target, &namespace, replicas).await?;
            ctx.metrics.record_reconcile("target_pdb", "ok");
        }
    }

    Ok(Action::await_change())
}

async fn find_matching_pdb(
    pdbs: &Api<PodDisruptionBudget>,
    target_labels: &BTreeMap<String, String>,
) -> Result<Option<PodDisruptionBudget>> {
    let list = pdbs.list(&ListParams::default()).await.context(error::KubeApiSnafu)?;
    Ok(list
        .items
        .into_iter()
        .find(|pdb| pdb_helpers::selector_matches(pdb, target_labels)))
}

fn build_pdb<T: ScalableTarget>(
    target: &T,
    namespace: &str,
    target_labels: &BTreeMap<String, String>,
    replicas: i32,
) -> PodDisruptionBudget {
    let name = target.name_any();
    let kind = match T::kind() {
        eviction_autoscaler_types::target::TargetKind::Deployment => "Deployment",
        eviction_autoscaler_types::target::TargetKind::StatefulSet => "StatefulSet",
    };
    let owner = controller_owner_reference("apps/v1", kind, name.clone(), target.uid().unwrap_or_default());

    PodDisruptionBudget {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(namespace.to_string()),
            annotations: Some(
                [(
                    eviction_autoscaler_types::constants::PDB_OWNED_BY_ANNOTATION.to_string(),
                    eviction_autoscaler_types::constants::PDB_OWNED_BY_VALUE.to_string(),
                )]
                .into_iter()
                .collect(),
            ),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        spec: Some(PodDisruptionBudgetSpec {
            min_available: Some(IntOrString::Int(replicas)),
            selector: Some(LabelSelector {
                match_labels: Some(target_labels.clone()),
                match_expressions: None,
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[instrument(skip(pdbs, target, target_labels), err)]
async fn create_pdb<T: ScalableTarget>(
    pdbs: &Api<PodDisruptionBudget>,
    target: &T,
    namespace: &str,
    target_labels: &BTreeMap<String, String>,
    replicas: i32,
) -> Result<()> {
    let pdb = build_pdb(target, namespace, target_labels, replicas);
    let name = pdb.name_any();
    pdbs.create(&PostParams::default(), &pdb).await.context(error::KubeApiSnafu)?;
    info!(pdb = %name, "created PodDisruptionBudget for target");
    Ok(())
}

#[instrument(skip(ctx, pdbs, pdb, target), err)]
async fn reconcile_existing_pdb<T: ScalableTarget>(
    ctx: Arc<Context>,
    pdbs: &Api<PodDisruptionBudget>,
    pdb: &PodDisruptionBudget,
    target: &T,
    namespace: &str,
    replicas: i32,
) -> Result<()> {
    let pdb_name = pdb.name_any();
    let autoscalers: Api<EvictionAutoScaler> = Api::namespaced(ctx.client.clone(), namespace);

    let target_generation = target.meta().generation;
    if let Ok(autoscaler) = autoscalers.get(&pdb_name).await {
        if autoscaler.status.as_ref().and_then(|s| s.target_generation) == target_generation {
            return Ok(());
        }
    }

    let surge = annotations::surge_replicas(target.meta().annotations.as_ref()).context(error::TypesSnafu)?;
    if surge == Some(replicas) {
        return Ok(());
    }

    let patch = serde_json::json!({
        "spec": { "minAvailable": replicas }
    });
    pdbs.patch(&pdb_name, &PatchParams::default(), &Patch::Merge(patch))
        .await
        .context(error::KubeApiSnafu)?;
    Ok(())
}

pub fn error_policy<T>(_target: Arc<T>, error: &Error, _ctx: Arc<Context>) -> Action {
    tracing::error!(error = %error, "target_pdb reconcile failed");
    Action::requeue(std::time::Duration::from_secs(15))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
    use maplit::btreemap;

    fn deployment(name: &str, uid: &str) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                uid: Some(uid.to_string()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec::default()),
            ..Default::default()
        }
    }

    #[test]
    fn build_pdb_sets_owner_reference_and_min_available() {
        let target = deployment("web", "abc-123");
        let labels = btreemap! { "app".to_string() => "web".to_string() };

        let pdb = build_pdb(&target, "default", &labels, 3);

        assert_eq!(pdb.metadata.name.as_deref(), Some("web"));
        assert_eq!(pdb.metadata.namespace.as_deref(), Some("default"));
        let owner = &pdb.metadata.owner_references.as_ref().unwrap()[0];
        assert_eq!(owner.kind, "Deployment");
        assert_eq!(owner.uid, "abc-123");
        assert_eq!(owner.controller, Some(true));

        let spec = pdb.spec.unwrap();
        assert_eq!(spec.min_available, Some(IntOrString::Int(3)));
        assert_eq!(spec.selector.unwrap().match_labels, Some(labels));
    }

    #[test]
    fn build_pdb_carries_owned_by_annotation() {
        let target = deployment("web", "abc-123");
        let labels = btreemap! { "app".to_string() => "web".to_string() };

        let pdb = build_pdb(&target, "default", &labels, 2);

        let annotations = pdb.metadata.annotations.unwrap();
        assert_eq!(
            annotations.get(eviction_autoscaler_types::constants::PDB_OWNED_BY_ANNOTATION),
            Some(&eviction_autoscaler_types::constants::PDB_OWNED_BY_VALUE.to_string())
        );
    }
}
