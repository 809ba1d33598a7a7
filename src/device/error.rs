//! Error definitions for parameter validation

use thiserror::Error;

/// Validation failures raised before any message is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    /// A required field, or one half of a required pair, is absent
    #[error("missing parameter: {0}")]
    MissingParameter(String),

    /// A field is present but could not be coerced or is not an accepted value
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ParameterError {
    pub fn missing(field: &str) -> Self {
        ParameterError::MissingParameter(field.to_string())
    }

    pub fn invalid(field: &str) -> Self {
        ParameterError::InvalidParameter(field.to_string())
    }

    /// Name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            ParameterError::MissingParameter(field) | ParameterError::InvalidParameter(field) => {
                field
            }
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, ParameterError::MissingParameter(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_is_reported_for_both_kinds() {
        assert_eq!(ParameterError::missing("uuid").field(), "uuid");
        assert_eq!(ParameterError::invalid("qos").field(), "qos");
        assert!(ParameterError::missing("uuid").is_missing());
        assert!(!ParameterError::invalid("qos").is_missing());
    }

    #[test]
    fn display_names_the_field() {
        assert_eq!(
            ParameterError::missing("broker_ip").to_string(),
            "missing parameter: broker_ip"
        );
        assert_eq!(
            ParameterError::invalid("port").to_string(),
            "invalid parameter: port"
        );
    }
}
