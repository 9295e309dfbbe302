//! Error types for the territory engine.
//!
//! Policy rejections are not errors: a run that fails validation comes back as
//! [`crate::ValidationResult::Invalid`]. The enums here cover malformed input,
//! bad configuration, and failures reported by a [`crate::TerritoryStore`].

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TerritoryError>;

/// Errors raised by the engine itself.
#[derive(Debug, Clone, PartialEq, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error), uniffi(flat_error))]
pub enum TerritoryError {
    /// A cell id string did not decode into `(resolution, row, col)`.
    #[error("invalid cell id '{input}': {reason}")]
    InvalidCellId { input: String, reason: String },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TerritoryError {
    pub(crate) fn invalid_cell_id(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidCellId {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure reported by a territory store implementation.
///
/// The engine passes these through untouched and never retries; any retry
/// policy belongs to the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("territory store unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected or failed the write.
    #[error("territory store backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_cell_id_display() {
        let err = TerritoryError::invalid_cell_id("9_x_1", "row is not an integer");
        let msg = err.to_string();
        assert!(msg.contains("9_x_1"));
        assert!(msg.contains("row is not an integer"));
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Unavailable("offline".to_string());
        assert_eq!(err.to_string(), "territory store unavailable: offline");
    }
}
