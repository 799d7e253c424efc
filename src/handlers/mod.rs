mod demo;
mod health;

pub use demo::{always_fail, always_panic};
pub use health::{HealthResponse, health_check};
