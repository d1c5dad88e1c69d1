//! Unified error handling for the stay pipeline.
//!
//! Only the outer surfaces fail: configuration loading and validation,
//! record parsing, and I/O. The per-stage transformations are total.

use thiserror::Error;

/// Errors surfaced by configuration, input parsing and I/O.
#[derive(Debug, Error)]
pub enum StayError {
    /// A configuration value is out of its permitted range.
    #[error("invalid configuration `{field}`: {reason}")]
    InvalidConfig { field: String, reason: String },

    /// A timezone identifier is not in the IANA database.
    #[error("unknown timezone `{name}`")]
    UnknownTimezone { name: String },

    /// An input record could not be interpreted.
    #[error("invalid record at line {line}: {reason}")]
    InvalidRecord { line: u64, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StayError>;

impl StayError {
    /// Shorthand for an [`StayError::InvalidConfig`].
    pub fn invalid_config(field: &str, reason: impl Into<String>) -> Self {
        StayError::InvalidConfig {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Convert a missing value into a typed error.
pub trait OptionExt<T> {
    /// Map `None` to [`StayError::UnknownTimezone`].
    fn ok_or_unknown_timezone(self, name: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_unknown_timezone(self, name: &str) -> Result<T> {
        self.ok_or_else(|| StayError::UnknownTimezone {
            name: name.to_string(),
        })
    }
}
