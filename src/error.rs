//! Error types for reclink.
//!
//! All errors are strongly typed using thiserror so callers can match on
//! the specific condition. "No match found" is never an error: lookups
//! return `Option` and comparators return `Option<f64>` for "no comparable data".

use thiserror::Error;

use crate::storage::StorageError;
use crate::term::TermCategory;

/// Validation errors raised while checking configuration or input populations.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Value {value} for '{field}' is out of range [0.0, 1.0]")]
    OutOfUnitRange {
        field: String,
        value: f64,
    },

    #[error("Value {value} for '{field}' must be positive")]
    NotPositive {
        field: String,
        value: f64,
    },

    #[error("Threshold '{upper}' ({upper_value}) must be >= '{lower}' ({lower_value})")]
    ThresholdOrder {
        upper: String,
        upper_value: f64,
        lower: String,
        lower_value: f64,
    },

    #[error("Weight map '{name}' has no positive weight")]
    EmptyWeightMap {
        name: String,
    },

    #[error("Record key '{key}' appears more than once in the population")]
    DuplicateRecordKey {
        key: String,
    },

    #[error("Term value cannot be empty")]
    EmptyTerm,

    #[error("Failed to load configuration: {message}")]
    Config {
        message: String,
    },
}

/// Errors raised by field comparators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompareError {
    /// Two sub-fields of incompatible kinds were compared.
    #[error("Type mismatch: cannot compare {left} with {right}")]
    TypeMismatch {
        /// Kind on the left side.
        left: &'static str,
        /// Kind on the right side.
        right: &'static str,
    },
}

/// Alias registry invariant violations.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Duplicate key: '{key}' is already a primary key")]
    DuplicateKey {
        key: String,
    },

    #[error("Key '{key}' already exists as the primary key of another entry")]
    AlreadyExists {
        key: String,
    },

    #[error("Entry not found: '{key}'")]
    NotFound {
        key: String,
    },

    #[error("Entry has an empty primary term")]
    EmptyPrimary,

    #[error("Cannot file a variant under '{category}'")]
    InvalidCategory {
        category: TermCategory,
    },

    #[error("Stored entry {id} is corrupt: {message}")]
    Corrupt {
        id: String,
        message: String,
    },

    #[error("Registry lock poisoned: {context}")]
    LockPoisoned {
        context: &'static str,
    },

    #[error("Registry storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Top-level error type for reclink.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ReclinkError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Comparison error: {0}")]
    Compare(#[from] CompareError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Export error: {message}")]
    Export {
        message: String,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl ReclinkError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a comparison error.
    #[must_use]
    pub const fn is_compare(&self) -> bool {
        matches!(self, Self::Compare(_))
    }

    /// Returns true if this is a registry error.
    #[must_use]
    pub const fn is_registry(&self) -> bool {
        matches!(self, Self::Registry(_))
    }

    /// Returns true if the storage backend was unreachable.
    ///
    /// The registry never retries on its own; callers decide.
    #[must_use]
    pub const fn is_storage_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Storage(StorageError::Unavailable(_))
                | Self::Registry(RegistryError::Storage(StorageError::Unavailable(_)))
        )
    }
}

/// Result type alias for reclink operations.
pub type ReclinkResult<T> = Result<T, ReclinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_range() {
        let err = ValidationError::OutOfUnitRange {
            field: "true_match".to_string(),
            value: 1.5,
        };
        let msg = format!("{err}");
        assert!(msg.contains("1.5"));
        assert!(msg.contains("true_match"));
    }

    #[test]
    fn test_threshold_order_message() {
        let err = ValidationError::ThresholdOrder {
            upper: "homonym".to_string(),
            upper_value: 0.6,
            lower: "synonym".to_string(),
            lower_value: 0.7,
        };
        let msg = format!("{err}");
        assert!(msg.contains("homonym"));
        assert!(msg.contains("synonym"));
    }

    #[test]
    fn test_type_mismatch_message() {
        let err = CompareError::TypeMismatch {
            left: "name",
            right: "contact",
        };
        assert_eq!(format!("{err}"), "Type mismatch: cannot compare name with contact");
    }

    #[test]
    fn test_registry_error_from_storage() {
        let err: RegistryError = StorageError::Unavailable("disk gone".to_string()).into();
        let top: ReclinkError = err.into();
        assert!(top.is_registry());
        assert!(top.is_storage_unavailable());
    }

    #[test]
    fn test_reclink_error_kinds() {
        let err: ReclinkError = ValidationError::EmptyTerm.into();
        assert!(err.is_validation());
        assert!(!err.is_storage_unavailable());

        let err: ReclinkError = CompareError::TypeMismatch {
            left: "a",
            right: "b",
        }
        .into();
        assert!(err.is_compare());

        let err = ReclinkError::internal("unexpected state");
        assert!(format!("{err}").contains("unexpected state"));
    }
}
