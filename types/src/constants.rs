//! Shared constants for the eviction-autoscaler system: the CRD group/version/kind,
//! the canonical annotation keys, and the namespaces the operator treats specially.

/// Defines a constant scoped under the eviction-autoscaler domain.
///
/// Mirrors the `brupop_domain!` pattern used throughout the teacher codebase for
/// grouping string constants that share an API group prefix.
macro_rules! eviction_autoscaler_domain {
    ($name:ident, $value:expr) => {
        pub const $name: &str = concat!("eviction-autoscaler.azure.com/", $value);
    };
}

pub const API_GROUP: &str = "eviction-autoscaler.azure.com";
pub const API_VERSION: &str = "v1";
pub const CRD_KIND: &str = "EvictionAutoScaler";

eviction_autoscaler_domain!(NAMESPACE_ENABLE_ANNOTATION, "enable");

/// Records the enabled/disabled state the cleanup sweep last acted on, so it
/// can tell a genuine boundary crossing from a namespace update that left the
/// filter's verdict unchanged.
eviction_autoscaler_domain!(NAMESPACE_LAST_SWEPT_STATE_ANNOTATION, "last-swept-state");

/// Opt-out-of-PDB-creation annotation, set on the target workload. Unlike the
/// other annotations, this one is not namespaced under the API group: the
/// original implementation uses a bare key, and we preserve that for
/// compatibility with existing annotated workloads.
pub const PDB_CREATE_ANNOTATION: &str = "pdb-create";

/// Marks a PDB as controller-owned.
pub const PDB_OWNED_BY_ANNOTATION: &str = "ownedBy";
pub const PDB_OWNED_BY_VALUE: &str = "EvictionAutoScaler";

/// Records the in-flight surge replica count on a target workload.
pub const SURGE_REPLICAS_ANNOTATION: &str = "evictionSurgeReplicas";

/// Provenance record naming the target workload, set on PDBs and AutoScalers
/// that the controller manages.
pub const TARGET_ANNOTATION: &str = "target";

/// Namespaces the cleanup sweep never touches, regardless of the configured
/// namespace-filter mode or the presence of an enable/disable annotation.
pub const HARDCODED_EXCLUDED_NAMESPACES: &[&str] = &["kube-system"];

/// Default cooldown: the quiet period required, after the last observed
/// eviction, before a surge is reversed.
pub const DEFAULT_COOLDOWN_SECS: u64 = 300;

pub const CONTROLLER_BINARY_NAME: &str = "eviction-autoscaler-controller";
pub const WEBHOOK_BINARY_NAME: &str = "eviction-autoscaler-webhook";
