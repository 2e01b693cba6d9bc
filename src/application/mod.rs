//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the prediction use case and the service lifecycle around it.

mod prediction;
mod state;

pub use prediction::PredictionService;
pub use state::{HealthReport, ServiceState};
