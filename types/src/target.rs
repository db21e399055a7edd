//! `ScalableTarget` unifies Deployment and StatefulSet so the reconcilers never
//! need to match on target kind more than once (SPEC_FULL §4.8).

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use snafu::OptionExt;

use crate::annotations::max_unavailable_is_nonzero;
use crate::error::{self, Result};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Deployment,
    StatefulSet,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Deployment => write!(f, "deployment"),
            TargetKind::StatefulSet => write!(f, "statefulset"),
        }
    }
}

impl TargetKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "deployment" => Some(TargetKind::Deployment),
            "statefulset" => Some(TargetKind::StatefulSet),
            _ => None,
        }
    }
}

/// A workload whose replica count the control loop can read and patch.
///
/// Implemented identically for Deployment and StatefulSet; per DESIGN.md Open
/// Question decision #3, StatefulSet is first-class, not an afterthought.
pub trait ScalableTarget: kube::Resource<DynamicType = ()> + Clone {
    fn kind() -> TargetKind;
    fn replicas(&self) -> Option<i32>;
    fn pod_template_labels(&self) -> Result<&BTreeMap<String, String>>;
    fn max_unavailable_is_nonzero(&self) -> bool;
}

impl ScalableTarget for Deployment {
    fn kind() -> TargetKind {
        TargetKind::Deployment
    }

    fn replicas(&self) -> Option<i32> {
        self.spec.as_ref().and_then(|s| s.replicas)
    }

    fn pod_template_labels(&self) -> Result<&BTreeMap<String, String>> {
        self.spec
            .as_ref()
            .and_then(|s| s.template.metadata.as_ref())
            .and_then(|m| m.labels.as_ref())
            .context(error::MissingSelectorSnafu { name: self.name_any() })
    }

    fn max_unavailable_is_nonzero(&self) -> bool {
        self.spec
            .as_ref()
            .and_then(|s| s.strategy.as_ref())
            .and_then(|s| s.rolling_update.as_ref())
            .and_then(|r| r.max_unavailable.as_ref())
            .map(max_unavailable_is_nonzero)
            .unwrap_or(false)
    }
}

impl ScalableTarget for StatefulSet {
    fn kind() -> TargetKind {
        TargetKind::StatefulSet
    }

    fn replicas(&self) -> Option<i32> {
        self.spec.as_ref().and_then(|s| s.replicas)
    }

    fn pod_template_labels(&self) -> Result<&BTreeMap<String, String>> {
        self.spec
            .as_ref()
            .and_then(|s| s.template.metadata.as_ref())
            .and_then(|m| m.labels.as_ref())
            .context(error::MissingSelectorSnafu { name: self.name_any() })
    }

    fn max_unavailable_is_nonzero(&self) -> bool {
        // StatefulSets only support `RollingUpdate.maxUnavailable` from
        // k8s 1.24 onward; the field is still optional there, and absence is
        // treated as zero for consistency with the Deployment rule.
        self.spec
            .as_ref()
            .and_then(|s| s.update_strategy.as_ref())
            .and_then(|s| s.rolling_update.as_ref())
            .and_then(|r| r.max_unavailable.as_ref())
            .map(max_unavailable_is_nonzero)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::{DeploymentSpec, DeploymentStrategy, RollingUpdateDeployment};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
    use k8s_openapi::api::core::v1::{PodSpec, PodTemplateSpec};
    use maplit::btreemap;

    fn deployment_with_max_unavailable(value: Option<IntOrString>) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(3),
                strategy: Some(DeploymentStrategy {
                    rolling_update: value.map(|max_unavailable| RollingUpdateDeployment {
                        max_unavailable: Some(max_unavailable),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(btreemap! { "app".to_string() => "web".to_string() }),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec::default()),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn deployment_without_rolling_update_is_not_nonzero() {
        let deployment = deployment_with_max_unavailable(None);
        assert!(!deployment.max_unavailable_is_nonzero());
    }

    #[test]
    fn deployment_with_zero_max_unavailable() {
        let deployment = deployment_with_max_unavailable(Some(IntOrString::Int(0)));
        assert!(!deployment.max_unavailable_is_nonzero());
    }

    #[test]
    fn deployment_with_nonzero_max_unavailable() {
        let deployment = deployment_with_max_unavailable(Some(IntOrString::String("25%".to_string())));
        assert!(deployment.max_unavailable_is_nonzero());
    }

    #[test]
    fn target_kind_parses_case_insensitively() {
        assert_eq!(TargetKind::parse("Deployment"), Some(TargetKind::Deployment));
        assert_eq!(TargetKind::parse("statefulset"), Some(TargetKind::StatefulSet));
        assert_eq!(TargetKind::parse("cronjob"), None);
    }
}
