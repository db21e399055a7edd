//! PodDisruptionBudget helpers shared between the target→PDB and PDB→AutoScaler
//! reconcilers (SPEC_FULL §4.8): selector matching and ownership-annotation
//! bookkeeping.

use std::collections::BTreeMap;

use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

use crate::annotations::{get_annotation, is_controller_owned};
use crate::constants::PDB_OWNED_BY_ANNOTATION;

/// A PDB "matches" a target when the PDB's `spec.selector.matchLabels` is a
/// subset of the target's pod template labels — the same rule the API server
/// itself uses to associate PDBs with pods.
pub fn selector_matches(pdb: &PodDisruptionBudget, target_labels: &BTreeMap<String, String>) -> bool {
    let Some(selector) = pdb.spec.as_ref().and_then(|s| s.selector.as_ref()) else {
        return false;
    };
    let Some(match_labels) = selector.match_labels.as_ref() else {
        return false;
    };
    if match_labels.is_empty() {
        return false;
    }
    match_labels
        .iter()
        .all(|(k, v)| target_labels.get(k) == Some(v))
}

pub fn is_controller_owned_pdb(pdb: &PodDisruptionBudget) -> bool {
    is_controller_owned(pdb.metadata.annotations.as_ref())
}

pub fn has_owned_by_annotation(pdb: &PodDisruptionBudget) -> bool {
    get_annotation(pdb.metadata.annotations.as_ref(), PDB_OWNED_BY_ANNOTATION).is_some()
}

/// Whether a PDB carries an owner reference to one of the given target kinds.
pub fn has_target_owner_reference(pdb: &PodDisruptionBudget) -> bool {
    target_owner_reference(pdb).is_some()
}

pub fn target_owner_reference(pdb: &PodDisruptionBudget) -> Option<&OwnerReference> {
    pdb.metadata.owner_references.as_ref()?.iter().find(|owner| {
        owner.kind == "Deployment" || owner.kind == "StatefulSet"
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::policy::v1::PodDisruptionBudgetSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
    use maplit::btreemap;

    fn pdb_with_selector(match_labels: BTreeMap<String, String>) -> PodDisruptionBudget {
        PodDisruptionBudget {
            metadata: ObjectMeta::default(),
            spec: Some(PodDisruptionBudgetSpec {
                selector: Some(LabelSelector {
                    match_labels: Some(match_labels),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn matches_when_subset() {
        let pdb = pdb_with_selector(btreemap! { "app".to_string() => "web".to_string() });
        let target_labels = btreemap! {
            "app".to_string() => "web".to_string(),
            "tier".to_string() => "frontend".to_string(),
        };
        assert!(selector_matches(&pdb, &target_labels));
    }

    #[test]
    fn does_not_match_on_conflicting_value() {
        let pdb = pdb_with_selector(btreemap! { "app".to_string() => "web".to_string() });
        let target_labels = btreemap! { "app".to_string() => "api".to_string() };
        assert!(!selector_matches(&pdb, &target_labels));
    }

    #[test]
    fn empty_selector_never_matches() {
        let pdb = pdb_with_selector(BTreeMap::new());
        let target_labels = btreemap! { "app".to_string() => "web".to_string() };
        assert!(!selector_matches(&pdb, &target_labels));
    }
}
