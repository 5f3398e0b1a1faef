//! # Fiscal Error Types
//!
//! Error types for fiscal operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Fiscal Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Local input   │  │     Authority           │ │
//! │  │  (fatal)        │  │  (fix & resend) │  │                         │ │
//! │  │                 │  │                 │  │  Rejected  (no retry)   │ │
//! │  │  MissingConfig  │  │  Validation     │  │  Network   (retried,    │ │
//! │  │  InvalidConfig  │  │  Payload        │  │            then final)  │ │
//! │  │  ConfigLoad...  │  │  NotFound       │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │    Database     │  │    Internal     │                              │
//! │  │  (ledger/store) │  │  (client build) │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use larder_core::{CoreError, ValidationError};
use larder_db::DbError;
use thiserror::Error;

/// Result type alias for fiscal operations.
pub type FiscalResult<T> = Result<T, FiscalError>;

/// Everything a fiscal operation can fail with.
#[derive(Debug, Error)]
pub enum FiscalError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// A required setting is absent. Raised at startup, never retried.
    #[error("Missing fiscal configuration: {0}")]
    MissingConfig(&'static str),

    /// A setting is present but unusable.
    #[error("Invalid fiscal configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Local Errors
    // =========================================================================
    /// The payload failed local checks. Nothing was sent.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A payload or ledger snapshot could not be (de)serialized.
    #[error("Payload error: {0}")]
    Payload(String),

    /// The record to submit does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    // =========================================================================
    // Authority Errors
    // =========================================================================
    /// The authority answered with a non-success result code.
    #[error("Rejected by tax authority ({code}): {message}")]
    Rejected { code: String, message: String },

    /// Every transport attempt failed.
    #[error("Network failure after {attempts} attempt(s): {message}")]
    Network { message: String, attempts: u32 },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<CoreError> for FiscalError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => FiscalError::Validation(e),
            CoreError::Payload(e) => FiscalError::Payload(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for FiscalError {
    fn from(err: serde_json::Error) -> Self {
        FiscalError::Payload(err.to_string())
    }
}

impl From<url::ParseError> for FiscalError {
    fn from(err: url::ParseError) -> Self {
        FiscalError::InvalidConfig(format!("base_url: {err}"))
    }
}

impl From<std::io::Error> for FiscalError {
    fn from(err: std::io::Error) -> Self {
        FiscalError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for FiscalError {
    fn from(err: toml::de::Error) -> Self {
        FiscalError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for FiscalError {
    fn from(err: toml::ser::Error) -> Self {
        FiscalError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl FiscalError {
    /// Returns true if resending the same payload later may succeed.
    ///
    /// Only network failures qualify. A rejection needs a changed payload.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FiscalError::Network { .. })
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            FiscalError::MissingConfig(_)
                | FiscalError::InvalidConfig(_)
                | FiscalError::ConfigLoadFailed(_)
                | FiscalError::ConfigSaveFailed(_)
        )
    }

    /// The authority result code, or `NETWORK_ERROR` for transport failures.
    pub fn result_code(&self) -> Option<&str> {
        match self {
            FiscalError::Rejected { code, .. } => Some(code),
            FiscalError::Network { .. } => Some(larder_core::RESULT_CODE_NETWORK_ERROR),
            _ => None,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        FiscalError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
