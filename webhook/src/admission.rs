//! Admission-review DTOs and pure decision logic for the eviction admission
//! hook (SPEC_FULL §4.5). The envelope types come straight from `kube`'s
//! `admission` feature rather than being hand-rolled, the way
//! `stackable-webhook`'s validating webhook borrows them.

use std::collections::BTreeMap;

use eviction_autoscaler_types::pdb as pdb_helpers;
use k8s_openapi::api::policy::v1::{Eviction, PodDisruptionBudget};
use kube::core::admission::{AdmissionRequest, AdmissionReview};

pub type EvictionAdmissionReview = AdmissionReview<Eviction>;
pub type EvictionAdmissionRequest = AdmissionRequest<Eviction>;

/// PDBs among `pdbs` whose selector matches the evicted pod's labels.
pub fn matching_pdbs<'a>(
    pod_labels: &BTreeMap<String, String>,
    pdbs: &'a [PodDisruptionBudget],
) -> Vec<&'a PodDisruptionBudget> {
    pdbs.iter()
        .filter(|pdb| pdb_helpers::selector_matches(pdb, pod_labels))
        .collect()
}

/// Whether any of the given (already-matched) PDBs would deny the eviction.
pub fn any_denies_eviction(matched: &[&PodDisruptionBudget]) -> bool {
    matched
        .iter()
        .any(|pdb| pdb.status.as_ref().map(|s| s.disruptions_allowed) == Some(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::policy::v1::{PodDisruptionBudgetSpec, PodDisruptionBudgetStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
    use maplit::btreemap;

    fn pdb(name: &str, match_labels: BTreeMap<String, String>, disruptions_allowed: i32) -> PodDisruptionBudget {
        PodDisruptionBudget {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: Some(PodDisruptionBudgetSpec {
                selector: Some(LabelSelector {
                    match_labels: Some(match_labels),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            status: Some(PodDisruptionBudgetStatus {
                disruptions_allowed,
                ..Default::default()
            }),
        }
    }

    #[test]
    fn matches_only_selector_subset() {
        let pod_labels = btreemap! { "app".to_string() => "web".to_string() };
        let pdbs = vec![
            pdb("web-pdb", btreemap! { "app".to_string() => "web".to_string() }, 1),
            pdb("api-pdb", btreemap! { "app".to_string() => "api".to_string() }, 1),
        ];
        let matched = matching_pdbs(&pod_labels, &pdbs);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].metadata.name.as_deref(), Some("web-pdb"));
    }

    #[test]
    fn denies_when_zero_disruptions_allowed() {
        let pod_labels = btreemap! { "app".to_string() => "web".to_string() };
        let pdbs = vec![pdb("web-pdb", btreemap! { "app".to_string() => "web".to_string() }, 0)];
        let matched = matching_pdbs(&pod_labels, &pdbs);
        assert!(any_denies_eviction(&matched));
    }

    #[test]
    fn allows_when_disruptions_remain() {
        let pod_labels = btreemap! { "app".to_string() => "web".to_string() };
        let pdbs = vec![pdb("web-pdb", btreemap! { "app".to_string() => "web".to_string() }, 2)];
        let matched = matching_pdbs(&pod_labels, &pdbs);
        assert!(!any_denies_eviction(&matched));
    }
}
