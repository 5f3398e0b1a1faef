//! # larder-core: Pure Fiscal Domain Logic
//!
//! Turns back-office records into tax-authority payloads. No I/O: every
//! function here is deterministic given its inputs (and the clock, which is
//! always passed in).
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Larder Fiscal Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 fiscal-worker (CLI) / back office               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │           larder-fiscal: FiscalService + FiscalClient           │   │
//! │  └──────────────┬──────────────────────────────────┬───────────────┘   │
//! │                 │                                  │                    │
//! │  ┌──────────────▼──────────────────────────────┐   │                    │
//! │  │        ★ larder-core (THIS CRATE) ★         │   │                    │
//! │  │                                             │   │                    │
//! │  │  money   tax     units    payload  builder  │   │                    │
//! │  │  Money   A-E     KG/U/L   Item     build_*  │   │                    │
//! │  │          buckets NT/BX    Sale              │   │                    │
//! │  │                                             │   │                    │
//! │  │  codes        validation       ledger       │   │                    │
//! │  │  itemCd       totals rules     kinds,       │   │                    │
//! │  │  invcNo/sarNo                  statuses     │   │                    │
//! │  │                                             │   │                    │
//! │  │  NO I/O • NO DATABASE • NO NETWORK          │   │                    │
//! │  └─────────────────────────────────────────────┘   │                    │
//! │                                                    │                    │
//! │  ┌─────────────────────────────────────────────────▼───────────────┐   │
//! │  │              larder-db: records + transaction ledger            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money type with integer arithmetic
//! - [`tax`] - Tax classes A-E, rates, per-class buckets
//! - [`units`] - Unit-code vocabulary with lenient mapping
//! - [`types`] - Business records read from the datastore
//! - [`payload`] - Authority request bodies
//! - [`builder`] - Record → payload
//! - [`codes`] - Item codes, invoice and movement numbers
//! - [`validation`] - Checks run before anything is sent
//! - [`ledger`] - Ledger entry types and the status machine
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use larder_core::money::Money;
//! use larder_core::tax::{TaxRate, TaxType, TaxRates};
//!
//! let rates = TaxRates::default();
//! let supply = Money::from_cents(1300); // 13.00
//! let tax = supply.calculate_tax(rates.rate_for(TaxType::Standard));
//!
//! assert_eq!(tax.cents(), 208); // 2.08 at 16%
//! assert_eq!(rates.rate_for(TaxType::Standard), TaxRate::from_bps(1600));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod builder;
pub mod codes;
pub mod error;
pub mod ledger;
pub mod money;
pub mod payload;
pub mod tax;
pub mod types;
pub mod units;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use builder::{BusinessProfile, FiscalContext, Registrar};
pub use error::{CoreError, CoreResult, ValidationError};
pub use ledger::{
    AuthorityResult, FailureDetails, LedgerEntry, LedgerKind, LedgerLink, LedgerStatistics,
    LedgerStatus, NewLedgerEntry,
};
pub use money::Money;
pub use payload::{FiscalPayload, Operation};
pub use tax::{TaxRate, TaxRates, TaxType};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Authority result code meaning "accepted".
pub const RESULT_CODE_SUCCESS: &str = "000";

/// Result code recorded when every transport attempt failed.
pub const RESULT_CODE_NETWORK_ERROR: &str = "NETWORK_ERROR";
