//! The `AutoScaler` custom resource (SPEC_FULL §3): the only stateful entity
//! owned by the eviction-autoscaler system, one-to-one with a PDB and a target
//! workload.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::error;
use crate::target::TargetKind;

/// `AutoScalerSpec` records the reference to the target workload and the input
/// channel (`last_eviction`) written by the admission hook.
#[derive(Clone, CustomResource, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "eviction-autoscaler.azure.com",
    kind = "EvictionAutoScaler",
    namespaced,
    plural = "evictionautoscalers",
    shortname = "evas",
    singular = "evictionautoscaler",
    status = "AutoScalerStatus",
    version = "v1",
    printcolumn = r#"{"name":"Target", "type":"string", "jsonPath":".spec.targetName"}"#,
    printcolumn = r#"{"name":"Kind", "type":"string", "jsonPath":".spec.targetKind"}"#,
    printcolumn = r#"{"name":"MinReplicas", "type":"integer", "jsonPath":".status.minReplicas"}"#,
    printcolumn = r#"{"name":"Status", "type":"string", "jsonPath":".status.conditions[-1:].type"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AutoScalerSpec {
    /// Name of the Deployment or StatefulSet this AutoScaler manages.
    pub target_name: String,
    /// One of `deployment`, `statefulset`.
    pub target_kind: String,
    /// The most recently observed blocked (or potentially blocked) eviction.
    /// Written by the admission hook; read by the AutoScaler reconciler.
    pub last_eviction: Option<EvictionRecord>,
}

impl AutoScalerSpec {
    pub fn target_kind(&self) -> Option<TargetKind> {
        TargetKind::parse(&self.target_kind)
    }
}

/// Records a single eviction attempt: the pod involved and when it happened.
#[derive(Clone, Serialize, Deserialize, Debug, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvictionRecord {
    pub pod_name: String,
    /// RFC 3339 timestamp. Stored as a string because `JsonSchema` cannot
    /// appropriately describe a `DateTime`, mirroring the teacher's accessor
    /// pattern for timestamp fields.
    pub eviction_time: String,
}

impl EvictionRecord {
    pub fn new(pod_name: impl Into<String>, eviction_time: DateTime<Utc>) -> Self {
        EvictionRecord {
            pod_name: pod_name.into(),
            eviction_time: eviction_time.to_rfc3339(),
        }
    }

    pub fn eviction_time(&self) -> error::Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.eviction_time)
            .map(|ts| ts.into())
            .ok()
            .context(error::InvalidEvictionTimestampSnafu {
                value: self.eviction_time.clone(),
            })
    }
}

/// `AutoScalerStatus` is the authoritative record of control-loop state,
/// maintained solely by the AutoScaler reconciler.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutoScalerStatus {
    /// The last eviction the control loop has processed. Caught up with
    /// `spec.last_eviction` means steady state.
    pub last_eviction: Option<EvictionRecord>,
    /// The replica floor to restore on descale.
    pub min_replicas: Option<i32>,
    /// The target's `metadata.generation` when `min_replicas` was captured.
    pub target_generation: Option<i64>,
    /// Single-slot condition list; the latest entry is authoritative.
    #[serde(default)]
    pub conditions: Vec<AutoScalerCondition>,
}

impl AutoScalerStatus {
    pub fn latest_condition(&self) -> Option<&AutoScalerCondition> {
        self.conditions.last()
    }

    pub fn set_condition(&mut self, condition: AutoScalerCondition) {
        self.conditions = vec![condition];
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, JsonSchema)]
pub enum ConditionType {
    Ready,
    Degraded,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, JsonSchema)]
pub enum ConditionReason {
    TargetSpecChange,
    Reconciled,
    NoPdb,
    EmptyTarget,
    InvalidTarget,
    MissingTarget,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutoScalerCondition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub reason: ConditionReason,
    pub message: String,
}

impl AutoScalerCondition {
    pub fn ready(reason: ConditionReason, message: impl Into<String>) -> Self {
        AutoScalerCondition {
            condition_type: ConditionType::Ready,
            reason,
            message: message.into(),
        }
    }

    pub fn degraded(reason: ConditionReason, message: impl Into<String>) -> Self {
        AutoScalerCondition {
            condition_type: ConditionType::Degraded,
            reason,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn eviction_record_round_trips_through_rfc3339() {
        let ts = Utc.with_ymd_and_hms(2026, 7, 28, 12, 0, 0).unwrap();
        let record = EvictionRecord::new("web-abc123", ts);
        assert_eq!(record.eviction_time().unwrap(), ts);
    }

    #[test]
    fn status_condition_is_single_slot() {
        let mut status = AutoScalerStatus::default();
        status.set_condition(AutoScalerCondition::ready(ConditionReason::Reconciled, "ok"));
        status.set_condition(AutoScalerCondition::degraded(ConditionReason::NoPdb, "missing"));
        assert_eq!(status.conditions.len(), 1);
        assert_eq!(status.latest_condition().unwrap().reason, ConditionReason::NoPdb);
    }

    #[test]
    fn target_kind_parses_from_spec() {
        let spec = AutoScalerSpec {
            target_name: "web".to_string(),
            target_kind: "statefulset".to_string(),
            last_eviction: None,
        };
        assert_eq!(spec.target_kind(), Some(TargetKind::StatefulSet));
    }
}
