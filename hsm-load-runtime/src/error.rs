//! Error types for running a load test
//!
//! Only setup can fail. Once the scheduler is running, every failure of an
//! individual request is recorded as a metric instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] hsm_load_config::ConfigError),

    #[error("HTTP client setup failed: {0}")]
    Client(#[from] hsm_load_http::HttpError),

    #[error("Metric registration failed: {0}")]
    Metrics(#[from] hsm_load_core::MetricsError),

    #[error("Invalid ramp profile: {0}")]
    Profile(#[from] hsm_load_core::ProfileError),

    #[error("Invalid scenario: {0}")]
    Scenario(String),
}
