//! Configuration validation traits and utilities

use crate::error::{ConfigError, ConfigResult};

/// Trait for validatable configuration
pub trait Validatable {
    /// Validate the configuration
    fn validate(&self) -> ConfigResult<()>;

    /// Get the domain name for error reporting
    fn domain_name(&self) -> &'static str;

    /// Helper to create a domain-specific validation error
    fn validation_error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::DomainError {
            domain: self.domain_name().to_string(),
            message: message.into(),
        }
    }
}

fn domain_error(domain: &str, message: String) -> ConfigError {
    ConfigError::DomainError {
        domain: domain.to_string(),
        message,
    }
}

/// Validate a required string field
pub fn validate_required_string(value: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(domain_error(domain, format!("{} cannot be empty", field_name)));
    }
    Ok(())
}

/// Validate a positive number
pub fn validate_positive<T>(value: T, field_name: &str, domain: &str) -> ConfigResult<()>
where
    T: PartialOrd + Default + std::fmt::Display,
{
    if value <= T::default() {
        return Err(domain_error(
            domain,
            format!("{} must be greater than 0, got {}", field_name, value),
        ));
    }
    Ok(())
}

/// Validate a probability in `[0, 1]`
pub fn validate_probability(value: f64, field_name: &str, domain: &str) -> ConfigResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(domain_error(
            domain,
            format!("{} must be between 0 and 1, got {}", field_name, value),
        ));
    }
    Ok(())
}

/// Validate an http(s) URL with a host
pub fn validate_http_url(url: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    validate_required_string(url, field_name, domain)?;

    let parsed = url::Url::parse(url)
        .map_err(|e| domain_error(domain, format!("{} has invalid URL format: {}", field_name, e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(domain_error(
                domain,
                format!("{} scheme '{}' not supported (only http/https)", field_name, scheme),
            ))
        }
    }

    if parsed.host_str().is_none() {
        return Err(domain_error(domain, format!("{} must have a valid host", field_name)));
    }

    if parsed.scheme() == "http" {
        tracing::warn!("{} uses plain http; the service normally requires mutual TLS", field_name);
    }

    Ok(())
}
