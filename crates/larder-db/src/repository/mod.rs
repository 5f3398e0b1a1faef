//! # Repository Module
//!
//! Database repository implementations for the fiscal store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Who Reads / Writes What                              │
//! │                                                                         │
//! │  FiscalService                                                         │
//! │       │                                                                 │
//! │       ├── db.ingredients().list_unregistered()      read               │
//! │       ├── db.ingredients().set_fiscal_codes(..)     write-back         │
//! │       ├── db.sales_orders().get_by_id(..)           read               │
//! │       ├── db.*().set_fiscal_status(.., partial, ..) write-back         │
//! │       │                                                                 │
//! │       └── db.ledger()                                                  │
//! │             ├── create(entry)         → pending                        │
//! │             ├── advance(id, success)  pending → success                │
//! │             ├── fail(id, msg, detail) pending → failed                 │
//! │             ├── mark_retry(id)        failed  → retry                  │
//! │             └── statistics()          read-only                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`IngredientRepository`](ingredient::IngredientRepository) - Ingredients and their item codes
//! - [`RecipeRepository`](recipe::RecipeRepository) - Recipes and components
//! - [`SalesOrderRepository`](sales_order::SalesOrderRepository) - Customer orders
//! - [`SupplierOrderRepository`](supplier_order::SupplierOrderRepository) - Purchases
//! - [`LedgerRepository`](ledger::LedgerRepository) - Fiscal transaction ledger

pub mod ingredient;
pub mod ledger;
pub mod recipe;
pub mod sales_order;
pub mod supplier_order;

use sqlx::sqlite::SqliteQueryResult;

use crate::error::{DbError, DbResult};

/// Turns "no row updated" into `NotFound`.
pub(crate) fn expect_one_row(
    result: SqliteQueryResult,
    entity: &str,
    id: impl ToString,
) -> DbResult<()> {
    if result.rows_affected() == 0 {
        return Err(DbError::not_found(entity, id));
    }
    Ok(())
}
