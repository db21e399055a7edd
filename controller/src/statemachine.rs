//! Pure decision logic for the AutoScaler reconciler's control core
//! (SPEC_FULL §4.4). Kept free of any Kubernetes API calls so the surge/
//! cooldown/descale arithmetic can be unit tested without a cluster.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Everything the decision function needs, already read from the live
/// cluster objects. Building this is the reconciler's job; computing the
/// action from it is this module's job.
#[derive(Clone, Debug)]
pub struct DecisionInput {
    pub status_target_generation: Option<i64>,
    pub status_min_replicas: Option<i32>,
    pub status_last_eviction_time: Option<DateTime<Utc>>,
    pub spec_last_eviction_time: Option<DateTime<Utc>>,
    pub target_replicas: i32,
    pub target_generation: i64,
    pub pdb_disruptions_allowed: i32,
    pub now: DateTime<Utc>,
    pub cooldown: Duration,
}

/// The action the AutoScaler reconciler should take this cycle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ControlAction {
    /// The target's generation has moved since we last captured a replica
    /// floor: a user has edited the workload. Reset the floor and do not
    /// scale.
    ResetFloor { min_replicas: i32, generation: i64 },
    /// Nothing new to do; the AutoScaler has already processed the latest
    /// eviction.
    Steady,
    /// The PDB is still fully blocked: surge by one replica.
    Surge { new_replicas: i32 },
    /// The budget has slack, but we haven't waited out the cooldown yet.
    WaitCooldown { remaining: Duration },
    /// Cooldown has elapsed: restore the remembered floor.
    Descale { restore_replicas: i32 },
}

/// Computes the next `ControlAction` for an AutoScaler given its current
/// status, its target's live state, and its PDB's live state.
pub fn determine_next_action(input: &DecisionInput) -> ControlAction {
    if input.status_target_generation != Some(input.target_generation) {
        return ControlAction::ResetFloor {
            min_replicas: input.target_replicas,
            generation: input.target_generation,
        };
    }

    let unhandled = match (input.spec_last_eviction_time, input.status_last_eviction_time) {
        (Some(spec_time), Some(status_time)) => spec_time > status_time,
        (Some(_), None) => true,
        (None, _) => false,
    };

    if !unhandled {
        return ControlAction::Steady;
    }

    if input.pdb_disruptions_allowed == 0 {
        return ControlAction::Surge {
            new_replicas: input.target_replicas + 1,
        };
    }

    let spec_time = input
        .spec_last_eviction_time
        .expect("unhandled implies spec_last_eviction_time is Some");
    let age = (input.now - spec_time)
        .to_std()
        .unwrap_or(Duration::from_secs(0));

    if age < input.cooldown {
        ControlAction::WaitCooldown {
            remaining: input.cooldown - age,
        }
    } else {
        ControlAction::Descale {
            restore_replicas: input.status_min_replicas.unwrap_or(input.target_replicas),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base_input() -> DecisionInput {
        DecisionInput {
            status_target_generation: Some(1),
            status_min_replicas: Some(3),
            status_last_eviction_time: None,
            spec_last_eviction_time: None,
            target_replicas: 3,
            target_generation: 1,
            pdb_disruptions_allowed: 1,
            now: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            cooldown: Duration::from_secs(300),
        }
    }

    #[test]
    fn generation_mismatch_resets_floor() {
        let mut input = base_input();
        input.target_generation = 2;
        assert_eq!(
            determine_next_action(&input),
            ControlAction::ResetFloor {
                min_replicas: 3,
                generation: 2,
            }
        );
    }

    #[test]
    fn no_new_eviction_is_steady() {
        let input = base_input();
        assert_eq!(determine_next_action(&input), ControlAction::Steady);
    }

    #[test]
    fn new_eviction_while_blocked_surges() {
        let mut input = base_input();
        input.spec_last_eviction_time = Some(input.now);
        input.pdb_disruptions_allowed = 0;
        assert_eq!(
            determine_next_action(&input),
            ControlAction::Surge { new_replicas: 4 }
        );
    }

    #[test]
    fn allowed_but_within_cooldown_waits() {
        let mut input = base_input();
        input.spec_last_eviction_time = Some(input.now - chrono::Duration::seconds(60));
        input.pdb_disruptions_allowed = 1;
        assert_eq!(
            determine_next_action(&input),
            ControlAction::WaitCooldown {
                remaining: Duration::from_secs(240)
            }
        );
    }

    #[test]
    fn allowed_past_cooldown_descales() {
        let mut input = base_input();
        input.spec_last_eviction_time = Some(input.now - chrono::Duration::seconds(600));
        input.pdb_disruptions_allowed = 1;
        input.target_replicas = 4;
        input.status_min_replicas = Some(3);
        assert_eq!(
            determine_next_action(&input),
            ControlAction::Descale { restore_replicas: 3 }
        );
    }

    #[test]
    fn missing_status_eviction_with_spec_eviction_is_unhandled() {
        let mut input = base_input();
        input.spec_last_eviction_time = Some(input.now);
        input.status_last_eviction_time = None;
        input.pdb_disruptions_allowed = 0;
        assert_eq!(
            determine_next_action(&input),
            ControlAction::Surge { new_replicas: 4 }
        );
    }

    #[test]
    fn surged_surge_again_on_further_eviction() {
        let mut input = base_input();
        input.target_replicas = 4;
        input.spec_last_eviction_time = Some(input.now);
        input.status_last_eviction_time = Some(input.now - chrono::Duration::seconds(10));
        input.pdb_disruptions_allowed = 0;
        assert_eq!(
            determine_next_action(&input),
            ControlAction::Surge { new_replicas: 5 }
        );
    }
}
