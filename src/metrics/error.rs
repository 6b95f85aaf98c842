//! Metrics errors and input validation

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricsError {
    #[error("Invalid metric name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("Invalid label '{label}': {reason}")]
    InvalidLabel { label: String, reason: String },

    /// NaN or infinite observation
    #[error("Invalid value {0}: must be finite")]
    InvalidValue(f64),

    /// Typically the same name registered twice with different label sets
    #[error("Failed to register metric '{name}': {reason}")]
    RegistrationFailed { name: String, reason: String },

    #[error("Failed to export metrics: {0}")]
    ExportFailed(String),
}

impl MetricsError {
    pub fn invalid_label(label: &str, reason: impl Into<String>) -> Self {
        Self::InvalidLabel {
            label: label.to_string(),
            reason: reason.into(),
        }
    }

    pub fn registration_failed(name: &str, reason: impl Into<String>) -> Self {
        Self::RegistrationFailed {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

pub mod validation {
    use super::MetricsError;

    const RESERVED_LABELS: &[&str] = &["__name__", "__value__"];

    /// `[a-zA-Z_]` followed by `[a-zA-Z0-9_]`, plus `:` in metric names
    fn check_identifier(value: &str, allow_colon: bool) -> Result<(), &'static str> {
        let mut chars = value.chars();
        match chars.next() {
            None => Err("must not be empty"),
            Some(c) if !(c.is_ascii_alphabetic() || c == '_') => {
                Err("must start with a letter or underscore")
            }
            _ if chars.any(|c| !(c.is_ascii_alphanumeric() || c == '_' || (allow_colon && c == ':'))) => {
                Err("contains invalid characters")
            }
            _ => Ok(()),
        }
    }

    pub fn validate_metric_name(name: &str) -> Result<(), MetricsError> {
        check_identifier(name, true).map_err(|reason| MetricsError::InvalidName {
            name: name.to_string(),
            reason,
        })
    }

    pub fn validate_label_key(key: &str) -> Result<(), MetricsError> {
        if RESERVED_LABELS.contains(&key) {
            return Err(MetricsError::invalid_label(key, "reserved by Prometheus"));
        }
        check_identifier(key, false).map_err(|reason| MetricsError::invalid_label(key, reason))
    }

    pub fn validate_labels(labels: &[(&str, &str)]) -> Result<(), MetricsError> {
        labels.iter().try_for_each(|(key, _)| validate_label_key(key))
    }

    pub fn validate_numeric_value(value: f64) -> Result<(), MetricsError> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(MetricsError::InvalidValue(value))
        }
    }
}
