//! Configuration validation traits and utilities

use crate::error::{ConfigError, ConfigResult};
use std::time::Duration;

/// Trait for validatable configuration
pub trait Validatable {
    /// Validate the configuration
    fn validate(&self) -> ConfigResult<()>;

    /// Get the domain name for error reporting
    fn domain_name(&self) -> &'static str;

    /// Helper to create a domain-specific validation error
    fn validation_error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::Domain {
            domain: self.domain_name().to_string(),
            message: message.into(),
        }
    }
}

/// Validate a required string field
pub fn validate_required_string(value: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::Domain {
            domain: domain.to_string(),
            message: format!("{} cannot be empty", field_name),
        });
    }
    Ok(())
}

/// Validate a positive number
pub fn validate_positive<T>(value: T, field_name: &str, domain: &str) -> ConfigResult<()>
where
    T: PartialOrd + Default + std::fmt::Display,
{
    if value <= T::default() {
        return Err(ConfigError::Domain {
            domain: domain.to_string(),
            message: format!("{} must be greater than 0, got {}", field_name, value),
        });
    }
    Ok(())
}

/// Validate a non-zero duration
pub fn validate_positive_duration(value: Duration, field_name: &str, domain: &str) -> ConfigResult<()> {
    if value.is_zero() {
        return Err(ConfigError::Domain {
            domain: domain.to_string(),
            message: format!("{} must be a positive duration", field_name),
        });
    }
    Ok(())
}

/// Validate a URL
pub fn validate_url(url: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::Domain {
            domain: domain.to_string(),
            message: format!("{} cannot be empty", field_name),
        });
    }

    let parsed = url::Url::parse(url).map_err(|e| ConfigError::Domain {
        domain: domain.to_string(),
        message: format!("{} has invalid URL format: {}", field_name, e),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::Domain {
            domain: domain.to_string(),
            message: format!("{} scheme '{}' not supported (only http/https)", field_name, scheme),
        }),
    }
}

/// Validate an enum choice
pub fn validate_enum_choice<T>(value: &str, valid_choices: &[T], field_name: &str, domain: &str) -> ConfigResult<()>
where
    T: AsRef<str>,
{
    let valid: Vec<&str> = valid_choices.iter().map(|c| c.as_ref()).collect();

    if !valid.iter().any(|&v| v.eq_ignore_ascii_case(value)) {
        return Err(ConfigError::Domain {
            domain: domain.to_string(),
            message: format!(
                "{} has invalid value '{}'. Valid choices: {}",
                field_name,
                value,
                valid.join(", ")
            ),
        });
    }

    Ok(())
}
