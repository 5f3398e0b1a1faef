//! # Supplier Order Repository
//!
//! Purchases from suppliers. Every line is an ingredient; its name, unit,
//! codes and tax class come from the ingredient row.

use chrono::Utc;
use larder_core::{FiscalStatus, SupplierOrder, SupplierOrderLine};
use sqlx::SqlitePool;
use tracing::debug;

use super::expect_one_row;
use crate::error::{DbError, DbResult};

/// Insert form of a supplier order.
#[derive(Debug, Clone, Default)]
pub struct NewSupplierOrder {
    pub supplier_name: String,
    pub supplier_tin: Option<String>,
    pub invoice_number: Option<String>,
    pub vat_cents: i64,
    pub lines: Vec<NewSupplierOrderLine>,
}

#[derive(Debug, Clone)]
pub struct NewSupplierOrderLine {
    pub ingredient_id: i64,
    pub quantity: f64,
    pub unit_cost_cents: i64,
}

impl NewSupplierOrderLine {
    pub fn new(ingredient_id: i64, quantity: f64, unit_cost_cents: i64) -> Self {
        NewSupplierOrderLine {
            ingredient_id,
            quantity,
            unit_cost_cents,
        }
    }
}

/// Repository for supplier order database operations.
#[derive(Debug, Clone)]
pub struct SupplierOrderRepository {
    pool: SqlitePool,
}

impl SupplierOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SupplierOrderRepository { pool }
    }

    /// Inserts an order and its lines in one transaction.
    pub async fn insert(&self, order: &NewSupplierOrder) -> DbResult<SupplierOrder> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO supplier_orders (
                supplier_name, supplier_tin, invoice_number, vat_cents,
                fiscal_status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&order.supplier_name)
        .bind(&order.supplier_tin)
        .bind(&order.invoice_number)
        .bind(order.vat_cents)
        .bind(FiscalStatus::Unsubmitted)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let order_id = result.last_insert_rowid();

        for line in &order.lines {
            sqlx::query(
                r#"
                INSERT INTO supplier_order_lines (order_id, ingredient_id, quantity, unit_cost_cents)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(order_id)
            .bind(line.ingredient_id)
            .bind(line.quantity)
            .bind(line.unit_cost_cents)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(order_id, supplier = %order.supplier_name, "Inserted supplier order");

        self.get_by_id(order_id)
            .await?
            .ok_or_else(|| DbError::not_found("SupplierOrder", order_id))
    }

    /// Loads an order with its lines.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<SupplierOrder>> {
        let order = sqlx::query_as::<_, SupplierOrder>(
            r#"
            SELECT
                id, supplier_name, supplier_tin, invoice_number, vat_cents,
                fiscal_status, fiscal_note, created_at
            FROM supplier_orders
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(mut order) = order else {
            return Ok(None);
        };

        order.lines = sqlx::query_as::<_, SupplierOrderLine>(
            r#"
            SELECT
                l.id,
                l.ingredient_id,
                i.name,
                i.item_code,
                i.item_class_code,
                i.unit,
                l.quantity,
                l.unit_cost_cents,
                i.tax_type
            FROM supplier_order_lines l
            JOIN ingredients i ON i.id = l.ingredient_id
            WHERE l.order_id = ?1
            ORDER BY l.id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(order))
    }

    pub async fn set_fiscal_status(
        &self,
        id: i64,
        status: FiscalStatus,
        note: Option<&str>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE supplier_orders SET fiscal_status = ?2, fiscal_note = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(status)
        .bind(note)
        .execute(&self.pool)
        .await?;

        expect_one_row(result, "SupplierOrder", id)
    }
}
