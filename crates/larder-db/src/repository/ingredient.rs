//! # Ingredient Repository
//!
//! Ingredients are the raw materials registered with the authority. The
//! fiscal layer reads them and writes back the issued item code.
//!
//! ```text
//!  list_unregistered() ──► [Tomato, Onion, ...]   (item_code IS NULL)
//!         │
//!         ▼  register each
//!  set_fiscal_codes(id, "KE1NTKG...", "5020230100", B)
//!         │
//!         ▼
//!  item_code set, fiscal_status = submitted
//! ```

use chrono::Utc;
use larder_core::{FiscalStatus, Ingredient, TaxType};
use sqlx::SqlitePool;
use tracing::debug;

use super::expect_one_row;
use crate::error::{DbError, DbResult};

const SELECT_INGREDIENT: &str = r#"
    SELECT
        id, name, unit, packaging, cost_cents, price_cents, tax_type,
        item_class_code, item_code, fiscal_status, fiscal_note,
        created_at, updated_at
    FROM ingredients
"#;

/// Insert form of an ingredient.
#[derive(Debug, Clone, Default)]
pub struct NewIngredient {
    pub name: String,
    pub unit: String,
    pub packaging: Option<String>,
    pub cost_cents: i64,
    pub price_cents: Option<i64>,
    pub tax_type: Option<TaxType>,
    pub item_class_code: Option<String>,
}

impl NewIngredient {
    pub fn new(name: impl Into<String>, unit: impl Into<String>, cost_cents: i64) -> Self {
        NewIngredient {
            name: name.into(),
            unit: unit.into(),
            cost_cents,
            ..Default::default()
        }
    }
}

/// Repository for ingredient database operations.
#[derive(Debug, Clone)]
pub struct IngredientRepository {
    pool: SqlitePool,
}

impl IngredientRepository {
    pub fn new(pool: SqlitePool) -> Self {
        IngredientRepository { pool }
    }

    /// Inserts an ingredient and returns the stored row.
    pub async fn insert(&self, ingredient: &NewIngredient) -> DbResult<Ingredient> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO ingredients (
                name, unit, packaging, cost_cents, price_cents, tax_type,
                item_class_code, fiscal_status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            "#,
        )
        .bind(&ingredient.name)
        .bind(&ingredient.unit)
        .bind(&ingredient.packaging)
        .bind(ingredient.cost_cents)
        .bind(ingredient.price_cents)
        .bind(ingredient.tax_type)
        .bind(&ingredient.item_class_code)
        .bind(FiscalStatus::Unsubmitted)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(id, name = %ingredient.name, "Inserted ingredient");

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Ingredient", id))
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Ingredient>> {
        let ingredient = sqlx::query_as::<_, Ingredient>(&format!("{SELECT_INGREDIENT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(ingredient)
    }

    /// Ingredients that hold no item code yet, oldest first.
    pub async fn list_unregistered(&self) -> DbResult<Vec<Ingredient>> {
        let ingredients = sqlx::query_as::<_, Ingredient>(&format!(
            "{SELECT_INGREDIENT} WHERE item_code IS NULL ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        debug!(count = ingredients.len(), "Unregistered ingredients");
        Ok(ingredients)
    }

    /// Writes back the codes the authority accepted and marks the ingredient
    /// submitted.
    pub async fn set_fiscal_codes(
        &self,
        id: i64,
        item_code: &str,
        item_class_code: &str,
        tax_type: TaxType,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE ingredients SET
                item_code = ?2,
                item_class_code = ?3,
                tax_type = ?4,
                fiscal_status = ?5,
                fiscal_note = NULL,
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(item_code)
        .bind(item_class_code)
        .bind(tax_type)
        .bind(FiscalStatus::Submitted)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        expect_one_row(result, "Ingredient", id)
    }

    pub async fn set_fiscal_status(
        &self,
        id: i64,
        status: FiscalStatus,
        note: Option<&str>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE ingredients SET fiscal_status = ?2, fiscal_note = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(status)
        .bind(note)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        expect_one_row(result, "Ingredient", id)
    }
}
