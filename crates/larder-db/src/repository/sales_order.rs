//! # Sales Order Repository
//!
//! Customer orders and their lines. Lines are read joined with the sold
//! recipe or ingredient so the fiscal layer sees the item codes and tax
//! class next to the quantities.
//!
//! ```text
//!  sales_order_lines ──┬── recipe_id     ──► recipes.item_code
//!                      └── ingredient_id ──► ingredients.item_code
//! ```

use chrono::Utc;
use larder_core::{FiscalStatus, SalesOrder, SalesOrderLine, TaxType};
use sqlx::SqlitePool;
use tracing::debug;

use super::expect_one_row;
use crate::error::{DbError, DbResult};

/// Insert form of a sales order.
#[derive(Debug, Clone)]
pub struct NewSalesOrder {
    pub customer_tin: Option<String>,
    pub customer_name: Option<String>,
    pub payment_type: String,
    pub lines: Vec<NewSalesOrderLine>,
}

impl NewSalesOrder {
    /// A cash sale to a walk-in customer.
    pub fn cash(lines: Vec<NewSalesOrderLine>) -> Self {
        NewSalesOrder {
            customer_tin: None,
            customer_name: None,
            payment_type: "01".to_string(),
            lines,
        }
    }
}

/// A line selling either a recipe or an ingredient.
#[derive(Debug, Clone)]
pub struct NewSalesOrderLine {
    pub recipe_id: Option<i64>,
    pub ingredient_id: Option<i64>,
    pub name: String,
    pub unit: String,
    pub quantity: f64,
    pub unit_price_cents: i64,
    pub discount_cents: i64,
    pub tax_type: Option<TaxType>,
}

impl NewSalesOrderLine {
    pub fn recipe(recipe_id: i64, name: impl Into<String>, quantity: f64, unit_price_cents: i64) -> Self {
        NewSalesOrderLine {
            recipe_id: Some(recipe_id),
            ingredient_id: None,
            name: name.into(),
            unit: "pcs".to_string(),
            quantity,
            unit_price_cents,
            discount_cents: 0,
            tax_type: None,
        }
    }

    pub fn ingredient(
        ingredient_id: i64,
        name: impl Into<String>,
        unit: impl Into<String>,
        quantity: f64,
        unit_price_cents: i64,
    ) -> Self {
        NewSalesOrderLine {
            recipe_id: None,
            ingredient_id: Some(ingredient_id),
            name: name.into(),
            unit: unit.into(),
            quantity,
            unit_price_cents,
            discount_cents: 0,
            tax_type: None,
        }
    }
}

/// Repository for sales order database operations.
#[derive(Debug, Clone)]
pub struct SalesOrderRepository {
    pool: SqlitePool,
}

impl SalesOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SalesOrderRepository { pool }
    }

    /// Inserts an order and its lines in one transaction.
    pub async fn insert(&self, order: &NewSalesOrder) -> DbResult<SalesOrder> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO sales_orders (customer_tin, customer_name, payment_type, fiscal_status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&order.customer_tin)
        .bind(&order.customer_name)
        .bind(&order.payment_type)
        .bind(FiscalStatus::Unsubmitted)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let order_id = result.last_insert_rowid();

        for line in &order.lines {
            sqlx::query(
                r#"
                INSERT INTO sales_order_lines (
                    order_id, recipe_id, ingredient_id, name, unit,
                    quantity, unit_price_cents, discount_cents, tax_type
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(order_id)
            .bind(line.recipe_id)
            .bind(line.ingredient_id)
            .bind(&line.name)
            .bind(&line.unit)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .bind(line.discount_cents)
            .bind(line.tax_type)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(order_id, lines = order.lines.len(), "Inserted sales order");

        self.get_by_id(order_id)
            .await?
            .ok_or_else(|| DbError::not_found("SalesOrder", order_id))
    }

    /// Loads an order with its lines.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<SalesOrder>> {
        let order = sqlx::query_as::<_, SalesOrder>(
            r#"
            SELECT
                id, invoice_number, customer_tin, customer_name, payment_type,
                fiscal_status, fiscal_note, created_at
            FROM sales_orders
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(mut order) = order else {
            return Ok(None);
        };

        order.lines = self.lines(id).await?;
        Ok(Some(order))
    }

    async fn lines(&self, order_id: i64) -> DbResult<Vec<SalesOrderLine>> {
        // The line's own tax class wins over the item's.
        let lines = sqlx::query_as::<_, SalesOrderLine>(
            r#"
            SELECT
                l.id,
                l.recipe_id,
                l.ingredient_id,
                l.name,
                COALESCE(r.item_code, i.item_code) AS item_code,
                COALESCE(r.item_class_code, i.item_class_code) AS item_class_code,
                l.unit,
                l.quantity,
                l.unit_price_cents,
                l.discount_cents,
                COALESCE(l.tax_type, r.tax_type, i.tax_type) AS tax_type
            FROM sales_order_lines l
            LEFT JOIN recipes r ON r.id = l.recipe_id
            LEFT JOIN ingredients i ON i.id = l.ingredient_id
            WHERE l.order_id = ?1
            ORDER BY l.id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Records the invoice number used for the order.
    ///
    /// A number already on the order is kept.
    pub async fn set_invoice_number(&self, id: i64, invoice_number: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE sales_orders SET invoice_number = COALESCE(invoice_number, ?2) WHERE id = ?1",
        )
        .bind(id)
        .bind(invoice_number)
        .execute(&self.pool)
        .await?;

        expect_one_row(result, "SalesOrder", id)
    }

    pub async fn set_fiscal_status(
        &self,
        id: i64,
        status: FiscalStatus,
        note: Option<&str>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE sales_orders SET fiscal_status = ?2, fiscal_note = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(status)
        .bind(note)
        .execute(&self.pool)
        .await?;

        expect_one_row(result, "SalesOrder", id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::ingredient::NewIngredient;
    use crate::repository::recipe::NewRecipe;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_lines_carry_item_codes_from_both_sources() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let soup = db.recipes().insert(&NewRecipe::new("Soup", 650)).await.unwrap();
        db.recipes()
            .set_fiscal_codes(soup.id, "KE2NTU0000001AAAA", "9010", TaxType::Standard)
            .await
            .unwrap();

        let eggs = db
            .ingredients()
            .insert(&NewIngredient::new("Eggs", "pcs", 20))
            .await
            .unwrap();
        db.ingredients()
            .set_fiscal_codes(eggs.id, "KE1NTU0000002BBBB", "5020", TaxType::Exempt)
            .await
            .unwrap();

        let order = db
            .sales_orders()
            .insert(&NewSalesOrder::cash(vec![
                NewSalesOrderLine::recipe(soup.id, "Soup", 2.0, 650),
                NewSalesOrderLine::ingredient(eggs.id, "Eggs", "pcs", 6.0, 25),
            ]))
            .await
            .unwrap();

        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.lines[0].item_code.as_deref(), Some("KE2NTU0000001AAAA"));
        assert_eq!(order.lines[0].tax_type, Some(TaxType::Standard));
        assert_eq!(order.lines[1].item_code.as_deref(), Some("KE1NTU0000002BBBB"));
        assert_eq!(order.lines[1].tax_type, Some(TaxType::Exempt));
        assert_eq!(order.payment_type, "01");
        assert!(order.invoice_number.is_none());
    }

    #[tokio::test]
    async fn test_invoice_number_is_not_overwritten() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let soup = db.recipes().insert(&NewRecipe::new("Soup", 650)).await.unwrap();
        let order = db
            .sales_orders()
            .insert(&NewSalesOrder::cash(vec![NewSalesOrderLine::recipe(
                soup.id, "Soup", 1.0, 650,
            )]))
            .await
            .unwrap();

        let orders = db.sales_orders();
        orders.set_invoice_number(order.id, "INV-7").await.unwrap();
        orders.set_invoice_number(order.id, "INV-8").await.unwrap();

        let order = orders.get_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(order.invoice_number.as_deref(), Some("INV-7"));
    }

    #[tokio::test]
    async fn test_failed_line_rolls_back_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        // Recipe 404 does not exist.
        let err = db
            .sales_orders()
            .insert(&NewSalesOrder::cash(vec![NewSalesOrderLine::recipe(
                404, "Ghost", 1.0, 100,
            )]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation(_)));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales_orders")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
