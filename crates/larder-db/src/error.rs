//! # Storage Errors
//!
//! What can go wrong below the fiscal service: SQLite itself, and the
//! ledger's own rules.
//!
//! ```text
//!   sqlx::Error ─────────┐
//!                        ├──► DbError ──► FiscalError::Database ──► outcome "internal"
//!   ledger rule broken ──┘
//! ```
//!
//! `InvalidTransition` is the one callers match on: it is how a guarded
//! ledger UPDATE that touched no rows surfaces.

use larder_core::{LedgerKind, LedgerLink, LedgerStatus};
use sqlx::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// ## When This Occurs
    /// - Writing an item code that another ingredient or recipe already holds
    #[error("Duplicate value for {field}")]
    UniqueViolation { field: String },

    /// ## When This Occurs
    /// - A ledger entry, recipe component or order line naming a record
    ///   that does not exist
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// A ledger status change the status machine does not allow.
    ///
    /// ## When This Occurs
    /// - Advancing an entry that is already `success`
    /// - Marking a `pending` entry for retry
    /// - Two writers racing on the same entry (the loser sees this)
    #[error("Ledger entry {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: LedgerStatus,
        to: LedgerStatus,
    },

    #[error("Ledger entry of kind {kind} cannot link to {link:?}")]
    InvalidLink { kind: LedgerKind, link: LedgerLink },

    /// The database file could not be opened or created.
    #[error("Cannot open database: {0}")]
    Open(String),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A receipt or failure-details column could not be written or read.
    #[error("JSON column error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Query failed: {0}")]
    Query(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

/// Constraint failures are classified by sqlx's error kind; SQLite names
/// the offending column after the colon (`UNIQUE constraint failed: t.col`).
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Row", "?"),
            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::UniqueViolation => DbError::UniqueViolation {
                    field: db_err
                        .message()
                        .rsplit(": ")
                        .next()
                        .unwrap_or_default()
                        .to_string(),
                },
                ErrorKind::ForeignKeyViolation => {
                    DbError::ForeignKeyViolation(db_err.message().to_string())
                }
                _ => DbError::Query(db_err.message().to_string()),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => DbError::Open(err.to_string()),
            other => DbError::Query(other.to_string()),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;
