pub mod admission;
pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod telemetry;
pub mod tls;

pub use error::{Error, Result};
