//! Domain-driven configuration management for hsm-load
//!
//! This crate provides modular configuration split by functional domains,
//! with validation, defaults, presets and environment variable support.

pub mod error;
pub mod loader;
pub mod presets;
pub mod validation;

// Compatibility with the unprefixed variables of the older scripts
pub mod compat;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use presets::Preset;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    http::HttpConfig,
    logging::{LogFormat, LogLevel, LoggingConfig},
    output::OutputConfig,
    scenario::{ScenarioConfig, ThinkTimeConfig},
    target::{TargetConfig, TlsConfig},
    thresholds::{ThresholdEntry, ThresholdsConfig},
    HsmLoadConfig,
};

// Re-export utilities
pub use domains::utils::serde_duration;
