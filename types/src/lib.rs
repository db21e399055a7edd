pub mod annotations;
pub mod autoscaler;
pub mod constants;
pub mod error;
pub mod namespace;
pub mod owner;
pub mod pdb;
pub mod target;
pub mod telemetry;

pub use autoscaler::{
    AutoScalerCondition, AutoScalerSpec, AutoScalerStatus, ConditionReason, ConditionType,
    EvictionAutoScaler, EvictionRecord,
};
pub use target::{ScalableTarget, TargetKind};
