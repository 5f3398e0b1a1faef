//! # Error Types
//!
//! Domain-specific error types for larder-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  larder-core errors (this file)                                        │
//! │  ├── CoreError        - Payload snapshot and domain failures           │
//! │  └── ValidationError  - A payload we refuse to send                    │
//! │                                                                         │
//! │  larder-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  larder-fiscal errors (separate crate)                                 │
//! │  └── FiscalError      - What callers of the service see                │
//! │                                                                         │
//! │  Flow: ValidationError → FiscalError::Validation → OutcomeKind::Invalid│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

#[derive(Debug, Error)]
pub enum CoreError {
    /// A payload failed local checks.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A payload could not be turned into (or read back from) JSON.
    ///
    /// ## When This Occurs
    /// - A ledger `items_data` snapshot was edited by hand
    /// - A snapshot written by an older build no longer matches the types
    #[error("Payload serialization failed: {0}")]
    Payload(#[from] serde_json::Error),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Local validation failures. Never retryable: the input must change.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A total does not add up.
    ///
    /// ## Example
    /// ```text
    /// taxblAmtA..E sum to 13.00 but totTaxblAmt says 13.01
    ///   → TotalsMismatch { field: "totTaxblAmt", expected: 13.00, actual: 13.01 }
    /// ```
    #[error("{field} is {actual}, expected {expected}")]
    TotalsMismatch {
        field: String,
        expected: Money,
        actual: Money,
    },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
