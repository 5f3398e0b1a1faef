//! # Business Records
//!
//! The back-office records the fiscal layer reads. They belong to the
//! datastore; the fiscal layer only reads them and writes back the
//! authority-issued codes and a fiscal status.
//!
//! ## Record Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   Ingredient    │   │     Recipe      │   │   SalesOrder    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │◄──┤  components[]   │◄──┤  lines[]        │       │
//! │  │  unit ("kg")    │   │  price_cents    │   │  invoice_number │       │
//! │  │  item_code?     │   │  item_code?     │   │  fiscal_status  │       │
//! │  └────────▲────────┘   └─────────────────┘   └─────────────────┘       │
//! │           │                                                             │
//! │  ┌────────┴────────┐                                                    │
//! │  │  SupplierOrder  │   item_code = None  → not yet registered           │
//! │  │  ─────────────  │   fiscal_status     → unsubmitted / submitted /    │
//! │  │  lines[]        │                       partial / failed             │
//! │  │  vat_cents      │                                                    │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::tax::TaxType;
use crate::units::{PackagingUnit, QuantityUnit};

// =============================================================================
// Fiscal Status
// =============================================================================

/// Where a business record stands with the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum FiscalStatus {
    /// Never sent.
    #[default]
    Unsubmitted,
    /// Accepted by the authority, follow-on steps included.
    Submitted,
    /// The main submission was accepted but a follow-on step failed.
    /// `fiscal_note` says which.
    Partial,
    /// The last submission failed.
    Failed,
}

// =============================================================================
// Ingredient
// =============================================================================

/// A stocked ingredient. Registered with the authority as a raw material.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    /// Free-text unit as entered ("kg", "pcs", "Litres").
    pub unit: String,
    /// Free-text packaging, if known.
    pub packaging: Option<String>,
    /// Purchase cost per unit in cents.
    pub cost_cents: i64,
    /// Selling price per unit, when the ingredient is also sold directly.
    pub price_cents: Option<i64>,
    /// Known tax class; standard when unset.
    pub tax_type: Option<TaxType>,
    /// Authority classification code.
    pub item_class_code: Option<String>,
    /// Authority item code, once registered.
    pub item_code: Option<String>,
    pub fiscal_status: FiscalStatus,
    pub fiscal_note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Ingredient {
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }

    /// Price to register: the selling price when set, else cost.
    pub fn default_price(&self) -> Money {
        Money::from_cents(self.price_cents.unwrap_or(self.cost_cents))
    }

    pub fn quantity_unit(&self) -> QuantityUnit {
        QuantityUnit::from_unit(&self.unit)
    }

    pub fn packaging_unit(&self) -> PackagingUnit {
        PackagingUnit::from_packaging(self.packaging.as_deref())
    }

    #[inline]
    pub fn is_registered(&self) -> bool {
        self.item_code.is_some()
    }
}

// =============================================================================
// Recipe
// =============================================================================

/// A menu item built from ingredients. Registered as a finished product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Recipe {
    pub id: i64,
    pub name: String,
    pub price_cents: i64,
    pub tax_type: Option<TaxType>,
    pub item_class_code: Option<String>,
    pub item_code: Option<String>,
    pub fiscal_status: FiscalStatus,
    pub fiscal_note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    /// Loaded separately from `recipe_ingredients`.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub components: Vec<RecipeComponent>,
}

impl Recipe {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// One ingredient of a recipe, joined with the ingredient's fiscal codes.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RecipeComponent {
    pub ingredient_id: i64,
    pub ingredient_name: String,
    pub item_code: Option<String>,
    pub quantity: f64,
}

// =============================================================================
// Sales Order
// =============================================================================

/// A customer order. Sent to the authority as a sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesOrder {
    pub id: i64,
    /// Invoice number already issued for this order, if any.
    pub invoice_number: Option<String>,
    pub customer_tin: Option<String>,
    pub customer_name: Option<String>,
    /// Authority payment type code ("01" cash, "02" credit, ...).
    pub payment_type: String,
    pub fiscal_status: FiscalStatus,
    pub fiscal_note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub lines: Vec<SalesOrderLine>,
}

/// A sold line, joined with the sold item's fiscal codes.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesOrderLine {
    pub id: i64,
    pub recipe_id: Option<i64>,
    pub ingredient_id: Option<i64>,
    pub name: String,
    pub item_code: Option<String>,
    pub item_class_code: Option<String>,
    pub unit: String,
    pub quantity: f64,
    pub unit_price_cents: i64,
    pub discount_cents: i64,
    pub tax_type: Option<TaxType>,
}

// =============================================================================
// Supplier Order
// =============================================================================

/// A purchase from a supplier. Sent to the authority as a purchase.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SupplierOrder {
    pub id: i64,
    pub supplier_name: String,
    pub supplier_tin: Option<String>,
    /// The supplier's invoice number, if captured.
    pub invoice_number: Option<String>,
    /// Invoice-level VAT as printed on the supplier's document.
    pub vat_cents: i64,
    pub fiscal_status: FiscalStatus,
    pub fiscal_note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub lines: Vec<SupplierOrderLine>,
}

impl SupplierOrder {
    #[inline]
    pub fn vat(&self) -> Money {
        Money::from_cents(self.vat_cents)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SupplierOrderLine {
    pub id: i64,
    pub ingredient_id: i64,
    pub name: String,
    pub item_code: Option<String>,
    pub item_class_code: Option<String>,
    pub unit: String,
    pub quantity: f64,
    pub unit_cost_cents: i64,
    pub tax_type: Option<TaxType>,
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    /// Goods received (purchase, return from customer, adjustment up).
    In,
    /// Goods issued (sale, waste, adjustment down).
    Out,
}

/// One line of an ad-hoc stock movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockLine {
    pub name: String,
    pub item_code: String,
    pub item_class_code: Option<String>,
    pub unit: QuantityUnit,
    pub packaging: PackagingUnit,
    pub quantity: f64,
    pub unit_cost: Money,
    pub tax_type: TaxType,
}
