//! AutoScaler reconciler (SPEC_FULL §4.4): the control core. Resolves the
//! paired PDB and target, computes the next [`ControlAction`] via the pure
//! state machine, and executes it.

use std::sync::Arc;

use chrono::Utc;
use eviction_autoscaler_types::target::{ScalableTarget, TargetKind};
use eviction_autoscaler_types::{
    AutoScalerCondition, AutoScalerStatus, ConditionReason, EvictionAutoScaler,
};
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::ResourceExt;
use snafu::ResultExt;
use tracing::{info, instrument};

use crate::context::Context;
use crate::error::{self, Error, Result};
use crate::statemachine::{self, ControlAction, DecisionInput};

struct LiveTarget {
    replicas: i32,
    generation: Option<i64>,
}

#[instrument(skip(autoscaler, ctx), fields(name = %autoscaler.name_any()), err)]
pub async fn reconcile(autoscaler: Arc<EvictionAutoScaler>, ctx: Arc<Context>) -> Result<Action> {
    let namespace = autoscaler.namespace().unwrap_or_else(|| "default".to_string());
    let name = autoscaler.name_any();
    let autoscalers: Api<EvictionAutoScaler> = Api::namespaced(ctx.client.clone(), &namespace);

    let pdbs: Api<PodDisruptionBudget> = Api::namespaced(ctx.client.clone(), &namespace);
    let pdb = match pdbs.get_opt(&name).await.context(error::KubeApiSnafu)? {
        Some(pdb) => pdb,
        None => {
            set_degraded(&autoscalers, &name, ConditionReason::NoPdb, "no matching PodDisruptionBudget").await?;
            ctx.metrics.record_reconcile("autoscaler", "no_pdb");
            return Ok(Action::await_change());
        }
    };

    if autoscaler.spec.target_name.is_empty() {
        set_degraded(&autoscalers, &name, ConditionReason::EmptyTarget, "spec.targetName is empty").await?;
        ctx.metrics.record_reconcile("autoscaler", "empty_target");
        return Ok(Action::await_change());
    }

    let Some(target_kind) = autoscaler.spec.target_kind() else {
        set_degraded(
            &autoscalers,
            &name,
            ConditionReason::InvalidTarget,
            format!("unsupported targetKind '{}'", autoscaler.spec.target_kind),
        )
        .await?;
        ctx.metrics.record_reconcile("autoscaler", "invalid_target");
        return Ok(Action::await_change());
    };

    let live_target = match fetch_target(&ctx, &namespace, target_kind, &autoscaler.spec.target_name).await? {
        Some(target) => target,
        None => {
            set_degraded(&autoscalers, &name, ConditionReason::MissingTarget, "target not found").await?;
            ctx.metrics.record_reconcile("autoscaler", "missing_target");
            return Ok(Action::await_change());
        }
    };

    let status = autoscaler.status.clone().unwrap_or_default();
    let disruptions_allowed = pdb
        .status
        .as_ref()
        .map(|s| s.disruptions_allowed)
        .unwrap_or(0);

    let input = DecisionInput {
        status_target_generation: status.target_generation,
        status_min_replicas: status.min_replicas,
        status_last_eviction_time: status
            .last_eviction
            .as_ref()
            .map(|e| e.eviction_time())
            .transpose()
            .context(error::TypesSnafu)?,
        spec_last_eviction_time: autoscaler
            .spec
            .last_eviction
            .as_ref()
            .map(|e| e.eviction_time())
            .transpose()
            .context(error::TypesSnafu)?,
        target_replicas: live_target.replicas,
        target_generation: live_target.generation.unwrap_or(0),
        pdb_disruptions_allowed: disruptions_allowed,
        now: Utc::now(),
        cooldown: ctx.config.cooldown,
    };

    let action = statemachine::determine_next_action(&input);
    let is_surged = live_target.replicas > status.min_replicas.unwrap_or(live_target.replicas);
    ctx.metrics.set_surged(&namespace, &name, is_surged);
    execute(&autoscalers, &ctx, &namespace, &autoscaler, target_kind, action.clone()).await?;
    ctx.metrics.record_reconcile("autoscaler", "ok");

    match action {
        ControlAction::WaitCooldown { remaining } => Ok(Action::requeue(remaining)),
        _ => Ok(Action::await_change()),
    }
}

async fn fetch_target(
    ctx: &Context,
    namespace: &str,
    kind: TargetKind,
    name: &str,
) -> Result<Option<LiveTarget>> {
    match kind {
        TargetKind::Deployment => {
            let api: Api<Deployment> = Api::namespaced(ctx.client.clone(), namespace);
            match api.get_opt(name).await.context(error::KubeApiSnafu)? {
                Some(d) => Ok(Some(LiveTarget {
                    replicas: d.replicas().unwrap_or(1),
                    generation: d.meta().generation,
                })),
                None => Ok(None),
            }
        }
        TargetKind::StatefulSet => {
            let api: Api<StatefulSet> = Api::namespaced(ctx.client.clone(), namespace);
            match api.get_opt(name).await.context(error::KubeApiSnafu)? {
                Some(s) => Ok(Some(LiveTarget {
                    replicas: s.replicas().unwrap_or(1),
                    generation: s.meta().generation,
                })),
                None => Ok(None),
            }
        }
    }
}

#[instrument(skip(autoscalers, ctx, autoscaler), err)]
async fn execute(
    autoscalers: &Api<EvictionAutoScaler>,
    ctx: &Context,
    namespace: &str,
    autoscaler: &EvictionAutoScaler,
    target_kind: TargetKind,
    action: ControlAction,
) -> Result<()> {
    let name = autoscaler.name_any();

    match action {
        ControlAction::ResetFloor { min_replicas, generation } => {
            patch_pdb_min_available(ctx, namespace, &name, min_replicas).await?;
            patch_status(
                autoscalers,
                &name,
                AutoScalerStatus {
                    min_replicas: Some(min_replicas),
                    target_generation: Some(generation),
                    last_eviction: autoscaler.status.as_ref().and_then(|s| s.last_eviction.clone()),
                    conditions: vec![AutoScalerCondition::ready(
                        ConditionReason::TargetSpecChange,
                        "target replica count changed; floor reset",
                    )],
                },
            )
            .await
        }
        ControlAction::Steady => {
            let mut status = autoscaler.status.clone().unwrap_or_default();
            status.set_condition(AutoScalerCondition::ready(ConditionReason::Reconciled, "steady state"));
            patch_status(autoscalers, &name, status).await
        }
        ControlAction::Surge { new_replicas } => {
            patch_target_surge(ctx, namespace, target_kind, &autoscaler.spec.target_name, new_replicas).await?;
            let mut status = autoscaler.status.clone().unwrap_or_default();
            status.last_eviction = autoscaler.spec.last_eviction.clone();
            status.set_condition(AutoScalerCondition::ready(ConditionReason::Reconciled, "surged"));
            patch_status(autoscalers, &name, status).await?;
            info!(target = %autoscaler.spec.target_name, replicas = new_replicas, "surged target");
            Ok(())
        }
        ControlAction::Descale { restore_replicas } => {
            patch_target_descale(ctx, namespace, target_kind, &autoscaler.spec.target_name, restore_replicas)
                .await?;
            let mut status = autoscaler.status.clone().unwrap_or_default();
            status.last_eviction = autoscaler.spec.last_eviction.clone();
            status.set_condition(AutoScalerCondition::ready(ConditionReason::Reconciled, "descaled"));
            patch_status(autoscalers, &name, status).await?;
            info!(target = %autoscaler.spec.target_name, replicas = restore_replicas, "descaled target");
            Ok(())
        }
        ControlAction::WaitCooldown { .. } => Ok(()),
    }
}

async fn patch_target_surge(
    ctx: &Context,
    namespace: &str,
    kind: TargetKind,
    name: &str,
    replicas: i32,
) -> Result<()> {
    let patch = serde_json::json!({
        "metadata": { "annotations": { eviction_autoscaler_types::constants::SURGE_REPLICAS_ANNOTATION: replicas.to_string() } },
        "spec": { "replicas": replicas }
    });
    patch_workload(ctx, namespace, kind, name, patch).await
}

async fn patch_target_descale(
    ctx: &Context,
    namespace: &str,
    kind: TargetKind,
    name: &str,
    restore_replicas: i32,
) -> Result<()> {
    let patch = serde_json::json!({
        "metadata": { "annotations": { eviction_autoscaler_types::constants::SURGE_REPLICAS_ANNOTATION: serde_json::Value::Null } },
        "spec": { "replicas": restore_replicas }
    });
    patch_workload(ctx, namespace, kind, name, patch).await
}

async fn patch_workload(
    ctx: &Context,
    namespace: &str,
    kind: TargetKind,
    name: &str,
    patch: serde_json::Value,
) -> Result<()> {
    match kind {
        TargetKind::Deployment => {
            let api: Api<Deployment> = Api::namespaced(ctx.client.clone(), namespace);
            api.patch(name, &PatchParams::default(), &Patch::Merge(patch))
                .await
                .context(error::KubeApiSnafu)?;
        }
        TargetKind::StatefulSet => {
            let api: Api<StatefulSet> = Api::namespaced(ctx.client.clone(), namespace);
            api.patch(name, &PatchParams::default(), &Patch::Merge(patch))
                .await
                .context(error::KubeApiSnafu)?;
        }
    }
    Ok(())
}

async fn patch_pdb_min_available(ctx: &Context, namespace: &str, name: &str, min_available: i32) -> Result<()> {
    let pdbs: Api<PodDisruptionBudget> = Api::namespaced(ctx.client.clone(), namespace);
    let patch = serde_json::json!({ "spec": { "minAvailable": min_available } });
    pdbs.patch(name, &PatchParams::default(), &Patch::Merge(patch))
        .await
        .context(error::KubeApiSnafu)?;
    Ok(())
}

async fn patch_status(autoscalers: &Api<EvictionAutoScaler>, name: &str, status: AutoScalerStatus) -> Result<()> {
    let patch = serde_json::json!({ "status": status });
    autoscalers
        .patch_status(name, &PatchParams::default(), &Patch::Merge(patch))
        .await
        .context(error::KubeApiSnafu)?;
    Ok(())
}

async fn set_degraded(
    autoscalers: &Api<EvictionAutoScaler>,
    name: &str,
    reason: ConditionReason,
    message: impl Into<String>,
) -> Result<()> {
    let mut status = match autoscalers.get_opt(name).await.context(error::KubeApiSnafu)? {
        Some(existing) => existing.status.unwrap_or_default(),
        None => return Ok(()),
    };
    status.set_condition(AutoScalerCondition::degraded(reason, message));
    patch_status(autoscalers, name, status).await
}

pub fn error_policy(_autoscaler: Arc<EvictionAutoScaler>, error: &Error, _ctx: Arc<Context>) -> Action {
    tracing::error!(error = %error, "autoscaler reconcile failed");
    Action::requeue(std::time::Duration::from_secs(15))
}
