pub mod config;
pub mod context;
pub mod discovery;
pub mod error;
pub mod metrics;
pub mod reconcilers;
pub mod statemachine;
pub mod telemetry;

pub use context::Context;
pub use error::{Error, Result};
