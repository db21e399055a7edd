//! Owner-reference builder shared by every reconciler that creates an owned
//! object (SPEC_FULL §4.8).

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

/// Builds a controller owner reference with `controller=true,
/// blockOwnerDeletion=true`, so the owned object is garbage-collected with
/// its owner and cannot be adopted by a second controller.
pub fn controller_owner_reference(
    api_version: impl Into<String>,
    kind: impl Into<String>,
    name: impl Into<String>,
    uid: impl Into<String>,
) -> OwnerReference {
    OwnerReference {
        api_version: api_version.into(),
        kind: kind.into(),
        name: name.into(),
        uid: uid.into(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sets_controller_and_block_owner_deletion() {
        let owner_ref = controller_owner_reference("policy/v1", "PodDisruptionBudget", "web-pdb", "abc-123");
        assert_eq!(owner_ref.api_version, "policy/v1");
        assert_eq!(owner_ref.kind, "PodDisruptionBudget");
        assert_eq!(owner_ref.name, "web-pdb");
        assert_eq!(owner_ref.uid, "abc-123");
        assert_eq!(owner_ref.controller, Some(true));
        assert_eq!(owner_ref.block_owner_deletion, Some(true));
    }
}
