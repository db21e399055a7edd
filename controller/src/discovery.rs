//! Resolves which workload a PodDisruptionBudget protects (SPEC_FULL §4.3).
//!
//! A PDB created by this controller carries a `target` annotation naming its
//! owner directly. A PDB we did not create has no such annotation, so we
//! find one of the pods it covers and walk ownership: Pod -> ReplicaSet ->
//! Deployment, or Pod -> StatefulSet directly.

use eviction_autoscaler_types::target::TargetKind;
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use kube::{api::ListParams, Api, Client, ResourceExt};
use snafu::OptionExt;
use tracing::instrument;

use crate::error::{self, Result};

/// A resolved workload owning the pods a PDB covers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiscoveredTarget {
    pub kind: TargetKind,
    pub name: String,
    pub uid: String,
}

/// The result of walking a PDB's selector out to an owning workload.
///
/// `NoMatchingPods` and `OwnerNotFound` are both failures to resolve a
/// target, but they call for different handling: a PDB with no matching
/// pods at all is a structural (leaky) PDB, while one whose pods exist but
/// aren't owned by a Deployment/StatefulSet may just be mid-rollout.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DiscoveryOutcome {
    Found(DiscoveredTarget),
    NoMatchingPods,
    OwnerNotFound,
}

impl DiscoveryOutcome {
    pub fn into_target(self) -> Option<DiscoveredTarget> {
        match self {
            DiscoveryOutcome::Found(target) => Some(target),
            DiscoveryOutcome::NoMatchingPods | DiscoveryOutcome::OwnerNotFound => None,
        }
    }
}

/// Finds the workload behind a PDB by listing one of its covered pods and
/// walking owner references up to a Deployment or StatefulSet.
#[instrument(skip(client), err)]
pub async fn discover_target(
    client: Client,
    namespace: &str,
    pdb: &PodDisruptionBudget,
) -> Result<DiscoveryOutcome> {
    let selector = match pdb.spec.as_ref().and_then(|spec| spec.selector.as_ref()) {
        Some(selector) => selector,
        None => return Ok(DiscoveryOutcome::NoMatchingPods),
    };

    let label_selector = match selector_to_query(selector) {
        Some(query) => query,
        None => return Ok(DiscoveryOutcome::NoMatchingPods),
    };

    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let matching = pods
        .list(&ListParams::default().labels(&label_selector))
        .await
        .context(error::KubeApiSnafu)?;

    let Some(pod) = matching.items.into_iter().next() else {
        return Ok(DiscoveryOutcome::NoMatchingPods);
    };

    resolve_owner(client, namespace, &pod).await
}

fn selector_to_query(
    selector: &k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector,
) -> Option<String> {
    let pairs = selector.match_labels.as_ref()?;
    if pairs.is_empty() {
        return None;
    }
    Some(
        pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(","),
    )
}

#[instrument(skip(client, pod), err)]
async fn resolve_owner(client: Client, namespace: &str, pod: &Pod) -> Result<DiscoveryOutcome> {
    let Some(owner) = pod.owner_references().first() else {
        return Ok(DiscoveryOutcome::OwnerNotFound);
    };

    if owner.kind == "StatefulSet" {
        return Ok(DiscoveryOutcome::Found(DiscoveredTarget {
            kind: TargetKind::StatefulSet,
            name: owner.name.clone(),
            uid: owner.uid.clone(),
        }));
    }

    if owner.kind != "ReplicaSet" {
        return Ok(DiscoveryOutcome::OwnerNotFound);
    }

    let replicasets: Api<ReplicaSet> = Api::namespaced(client, namespace);
    let replicaset = replicasets.get(&owner.name).await.context(error::KubeApiSnafu)?;

    let Some(rs_owner) = replicaset.owner_references().first() else {
        return Ok(DiscoveryOutcome::OwnerNotFound);
    };

    if rs_owner.kind != "Deployment" {
        return Ok(DiscoveryOutcome::OwnerNotFound);
    }

    Ok(DiscoveryOutcome::Found(DiscoveredTarget {
        kind: TargetKind::Deployment,
        name: rs_owner.name.clone(),
        uid: rs_owner.uid.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
    use maplit::btreemap;

    #[test]
    fn selector_with_match_labels_becomes_query_string() {
        let selector = LabelSelector {
            match_labels: Some(btreemap! { "app".to_string() => "web".to_string() }),
            match_expressions: None,
        };
        assert_eq!(selector_to_query(&selector), Some("app=web".to_string()));
    }

    #[test]
    fn empty_selector_has_no_query() {
        let selector = LabelSelector {
            match_labels: None,
            match_expressions: None,
        };
        assert_eq!(selector_to_query(&selector), None);
    }
}
