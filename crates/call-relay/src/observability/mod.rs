//! Operational endpoints.

pub mod health;

pub use health::{health_router, HealthState};
