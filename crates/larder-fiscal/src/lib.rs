//! # larder-fiscal: Tax Authority Integration for Larder
//!
//! Sends item registrations, sales, purchases and stock movements to the
//! tax authority's e-invoicing API, and records every submission in the
//! transaction ledger.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Fiscal Integration                               │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                  FiscalService (service.rs)                      │  │
//! │  │                                                                  │  │
//! │  │  register_item / register_recipe / sync_all_items               │  │
//! │  │  send_sale / send_purchase / send_stock_movement                │  │
//! │  │  complete_sale / receive_purchase                               │  │
//! │  │  retry_entry / retry_failed / reconcile_abandoned               │  │
//! │  │  fetch_codes / fetch_item_classes / fetch_branches              │  │
//! │  └───────────┬───────────────────────┬──────────────────────────────┘  │
//! │              │                       │                                  │
//! │              ▼                       ▼                                  │
//! │  ┌────────────────────┐  ┌──────────────────────────────────────┐      │
//! │  │ larder-db          │  │ FiscalClient (transport.rs)          │      │
//! │  │                    │  │                                      │      │
//! │  │ records            │  │ reqwest POST + tenant headers        │      │
//! │  │ LedgerRepository   │  │ with_retry (retry.rs), 2s, 4s, ...   │      │
//! │  │ pending → success  │  │ Accepted / Rejected / TransportFailed│      │
//! │  │        → failed    │  │ AuthorityReply (protocol.rs)         │      │
//! │  │        → retry     │  │                                      │      │
//! │  └────────────────────┘  └──────────────────────────────────────┘      │
//! │                                                                         │
//! │  FiscalConfig (config.rs): defaults → fiscal.toml → LARDER_* env       │
//! │  OperationReport (report.rs): what the back office displays            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Endpoint, tenant, business and tax settings
//! - [`error`] - Fiscal error types
//! - [`protocol`] - Authority reply envelope and request headers
//! - [`report`] - UI-facing operation outcomes
//! - [`retry`] - Exponential backoff around one attempt
//! - [`service`] - The fiscal operations
//! - [`transport`] - HTTP client for the authority
//!
//! ## Usage
//!
//! ```rust,ignore
//! use larder_fiscal::{FiscalConfig, FiscalService};
//! use larder_db::{Database, DbConfig};
//!
//! let config = Arc::new(FiscalConfig::load(None)?);
//! let db = Database::new(DbConfig::new("larder.db")).await?;
//! let service = FiscalService::new(db, config)?;
//!
//! let order = service.database().sales_orders().get_by_id(42).await?.unwrap();
//! let done = service.complete_sale(&order).await?;
//! println!("{:?}", OperationReport::from(&done));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod protocol;
pub mod report;
pub mod retry;
pub mod service;
pub mod transport;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{
    AuthoritySettings, EndpointPaths, FiscalConfig, RegistrarSettings, TaxSettings,
    TenantIdentity,
};
pub use error::{FiscalError, FiscalResult};
pub use protocol::AuthorityReply;
pub use report::{report, OperationReport, OutcomeKind};
pub use retry::{with_retry, Exhausted, RetryPolicy};
pub use service::{
    CompletedTransaction, FiscalService, FollowUpFailure, FollowUpStep, ItemRegistration,
    RecipeRegistration, RetryReport, Submission, SyncReport,
};
pub use transport::{AttemptFailure, FiscalClient, SendOutcome};
