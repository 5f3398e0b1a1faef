//! # Ledger Types
//!
//! One ledger entry per attempted fiscal operation. Entries are never
//! deleted; the ledger is both the audit trail and the source for replay.
//!
//! ## Status Machine
//! ```text
//!                 ┌──────────┐
//!      create ───►│ pending  │◄──────────────┐
//!                 └────┬─────┘               │
//!            accepted  │  rejected /         │ resubmit
//!           ┌──────────┤  network failure    │
//!           ▼          ▼                     │
//!     ┌──────────┐ ┌──────────┐  mark   ┌────┴─────┐
//!     │ success  │ │  failed  │────────►│  retry   │
//!     └──────────┘ └──────────┘  retry  └──────────┘
//!      (final)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use ts_rs::TS;

// =============================================================================
// Kind
// =============================================================================

/// What an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    ItemRegistration,
    ItemComposition,
    Sale,
    Purchase,
    StockIn,
    StockOut,
}

impl LedgerKind {
    pub const ALL: [LedgerKind; 6] = [
        LedgerKind::ItemRegistration,
        LedgerKind::ItemComposition,
        LedgerKind::Sale,
        LedgerKind::Purchase,
        LedgerKind::StockIn,
        LedgerKind::StockOut,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::ItemRegistration => "item_registration",
            LedgerKind::ItemComposition => "item_composition",
            LedgerKind::Sale => "sale",
            LedgerKind::Purchase => "purchase",
            LedgerKind::StockIn => "stock_in",
            LedgerKind::StockOut => "stock_out",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == value)
    }

    /// Whether an entry of this kind may point at the given record.
    ///
    /// | kind              | link                            |
    /// |-------------------|---------------------------------|
    /// | item_registration | ingredient or recipe            |
    /// | item_composition  | recipe                          |
    /// | sale              | sales order                     |
    /// | purchase          | supplier order                  |
    /// | stock_in          | supplier order or ingredient    |
    /// | stock_out         | sales order or ingredient       |
    pub const fn allows(&self, link: &LedgerLink) -> bool {
        matches!(
            (self, link),
            (LedgerKind::ItemRegistration, LedgerLink::Ingredient(_))
                | (LedgerKind::ItemRegistration, LedgerLink::Recipe(_))
                | (LedgerKind::ItemComposition, LedgerLink::Recipe(_))
                | (LedgerKind::Sale, LedgerLink::SalesOrder(_))
                | (LedgerKind::Purchase, LedgerLink::SupplierOrder(_))
                | (LedgerKind::StockIn, LedgerLink::SupplierOrder(_))
                | (LedgerKind::StockIn, LedgerLink::Ingredient(_))
                | (LedgerKind::StockOut, LedgerLink::SalesOrder(_))
                | (LedgerKind::StockOut, LedgerLink::Ingredient(_))
        )
    }
}

impl fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    Pending,
    Success,
    Failed,
    Retry,
}

impl LedgerStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            LedgerStatus::Pending => "pending",
            LedgerStatus::Success => "success",
            LedgerStatus::Failed => "failed",
            LedgerStatus::Retry => "retry",
        }
    }

    /// The one status an entry must be in to move to `self`.
    ///
    /// Every status has exactly one way in, which lets the repository guard
    /// a transition with a single `WHERE status = ?`.
    pub const fn predecessor(&self) -> LedgerStatus {
        match self {
            LedgerStatus::Success | LedgerStatus::Failed => LedgerStatus::Pending,
            LedgerStatus::Retry => LedgerStatus::Failed,
            LedgerStatus::Pending => LedgerStatus::Retry,
        }
    }

    /// The only moves an entry can make. `success` is final.
    pub fn can_transition_to(&self, next: LedgerStatus) -> bool {
        next.predecessor() == *self
    }
}

impl fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Link
// =============================================================================

/// The single business record an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum LedgerLink {
    Ingredient(i64),
    Recipe(i64),
    SalesOrder(i64),
    SupplierOrder(i64),
}

impl LedgerLink {
    /// Rebuilds the link from the four nullable columns. Exactly one must be
    /// set.
    pub fn from_columns(
        ingredient_id: Option<i64>,
        recipe_id: Option<i64>,
        sales_order_id: Option<i64>,
        supplier_order_id: Option<i64>,
    ) -> Option<Self> {
        match (ingredient_id, recipe_id, sales_order_id, supplier_order_id) {
            (Some(id), None, None, None) => Some(LedgerLink::Ingredient(id)),
            (None, Some(id), None, None) => Some(LedgerLink::Recipe(id)),
            (None, None, Some(id), None) => Some(LedgerLink::SalesOrder(id)),
            (None, None, None, Some(id)) => Some(LedgerLink::SupplierOrder(id)),
            _ => None,
        }
    }

    /// Splits into `(ingredient_id, recipe_id, sales_order_id, supplier_order_id)`.
    pub const fn columns(&self) -> (Option<i64>, Option<i64>, Option<i64>, Option<i64>) {
        match *self {
            LedgerLink::Ingredient(id) => (Some(id), None, None, None),
            LedgerLink::Recipe(id) => (None, Some(id), None, None),
            LedgerLink::SalesOrder(id) => (None, None, Some(id), None),
            LedgerLink::SupplierOrder(id) => (None, None, None, Some(id)),
        }
    }
}

// =============================================================================
// Entries
// =============================================================================

/// What the service hands the ledger before sending.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub kind: LedgerKind,
    pub link: LedgerLink,
    /// Item code, invoice number or movement number.
    pub reference_no: String,
    /// The tagged payload JSON, enough to replay the request.
    pub items_data: String,
}

/// A stored ledger row.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LedgerEntry {
    pub id: String,
    pub kind: LedgerKind,
    pub ingredient_id: Option<i64>,
    pub recipe_id: Option<i64>,
    pub sales_order_id: Option<i64>,
    pub supplier_order_id: Option<i64>,
    pub reference_no: String,
    pub items_data: String,
    pub result_code: Option<String>,
    pub result_message: Option<String>,
    pub receipt_data: Option<String>,
    pub status: LedgerStatus,
    pub retry_count: i64,
    #[ts(as = "Option<String>")]
    pub last_retry_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn link(&self) -> Option<LedgerLink> {
        LedgerLink::from_columns(
            self.ingredient_id,
            self.recipe_id,
            self.sales_order_id,
            self.supplier_order_id,
        )
    }
}

// =============================================================================
// Outcome Records
// =============================================================================

/// The authority's answer as stored on advance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorityResult {
    pub code: Option<String>,
    pub message: Option<String>,
    /// Raw `data` body of the reply.
    pub receipt: Option<serde_json::Value>,
}

/// Structured detail kept alongside a failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureDetails {
    /// Authority result code, or `NETWORK_ERROR`.
    pub result_code: Option<String>,
    pub result_message: Option<String>,
    /// Transport attempts made, for network failures.
    pub attempts: Option<u32>,
    /// HTTP status of the last attempt, when one was received.
    pub http_status: Option<u16>,
}

// =============================================================================
// Statistics
// =============================================================================

/// Read-side aggregation for the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerStatistics {
    pub total: i64,
    pub by_kind: BTreeMap<String, i64>,
    pub by_status: BTreeMap<String, i64>,
    pub by_result_code: BTreeMap<String, i64>,
    /// `success / total`, 0 when empty.
    pub success_rate: f64,
}
