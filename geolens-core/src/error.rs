//! Error Types
//!
//! Only configuration problems and missing platform capabilities surface as
//! errors. Sensor rejections and pipeline precondition failures are absorbed
//! where they happen.

use thiserror::Error;

/// Errors returned by geolens-core
#[derive(Debug, Error)]
pub enum GeolensError {
    /// A platform capability (motion, location, camera) is not available
    #[error("{0} capability is unavailable: {1}")]
    CapabilityUnavailable(Capability, String),

    /// A configuration value is out of range
    #[error("invalid configuration: {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// Configuration JSON could not be parsed
    #[error("failed to parse configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Platform capabilities the engine depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Motion,
    Location,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Motion => write!(f, "Motion"),
            Capability::Location => write!(f, "Location"),
        }
    }
}

impl GeolensError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        GeolensError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GeolensError::CapabilityUnavailable(Capability::Motion, "no gyro".into());
        assert_eq!(format!("{}", err), "Motion capability is unavailable: no gyro");

        let err = GeolensError::invalid("projector.bottomBorder", "must be in (0, 1]");
        assert_eq!(
            format!("{}", err),
            "invalid configuration: projector.bottomBorder: must be in (0, 1]"
        );
    }
}
