//! Error types for fleetfit configuration and entity input.

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while reading or changing strategy settings, or while
/// converting caller-supplied quantities.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown setting: {0}")]
    UnknownSetting(String),

    #[error("invalid value '{value}' for setting '{setting}' (allowed: {allowed})")]
    InvalidValue {
        setting: String,
        value: String,
        allowed: String,
    },

    #[error("setting '{0}' has no value and no default option")]
    NoDefault(String),

    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),
}
