//! # larder-db: Database Layer for Larder Fiscal
//!
//! SQLite storage for the back-office records the fiscal layer reads and
//! for the fiscal transaction ledger. Uses sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Larder Fiscal Data Flow                          │
//! │                                                                         │
//! │  FiscalService::send_sale(order)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    larder-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ IngredientRepo │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ RecipeRepo     │    │ 001_fiscal_  │  │   │
//! │  │   │ Connection    │    │ SalesOrderRepo │    │   schema.sql │  │   │
//! │  │   │ Management    │    │ SupplierRepo   │    │              │  │   │
//! │  │   │               │    │ LedgerRepo     │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   <data dir>/larder.db  (or LARDER_DB_PATH)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Record repositories and the ledger
//!
//! ## Usage
//!
//! ```rust,ignore
//! use larder_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/larder.db")).await?;
//!
//! let pending = db.ingredients().list_unregistered().await?;
//! let failed = db.ledger().list_failed(None).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::ingredient::{IngredientRepository, NewIngredient};
pub use repository::ledger::LedgerRepository;
pub use repository::recipe::{NewRecipe, RecipeRepository};
pub use repository::sales_order::{NewSalesOrder, NewSalesOrderLine, SalesOrderRepository};
pub use repository::supplier_order::{
    NewSupplierOrder, NewSupplierOrderLine, SupplierOrderRepository,
};
