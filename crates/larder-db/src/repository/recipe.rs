//! # Recipe Repository
//!
//! Recipes are registered as finished products. Their components are sent
//! afterwards as item compositions, so a recipe is always loaded together
//! with its components and each component's item code.

use chrono::Utc;
use larder_core::{FiscalStatus, Recipe, RecipeComponent, TaxType};
use sqlx::SqlitePool;
use tracing::debug;

use super::expect_one_row;
use crate::error::{DbError, DbResult};

/// Insert form of a recipe.
#[derive(Debug, Clone, Default)]
pub struct NewRecipe {
    pub name: String,
    pub price_cents: i64,
    pub tax_type: Option<TaxType>,
    pub item_class_code: Option<String>,
}

impl NewRecipe {
    pub fn new(name: impl Into<String>, price_cents: i64) -> Self {
        NewRecipe {
            name: name.into(),
            price_cents,
            ..Default::default()
        }
    }
}

/// Repository for recipe database operations.
#[derive(Debug, Clone)]
pub struct RecipeRepository {
    pool: SqlitePool,
}

impl RecipeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RecipeRepository { pool }
    }

    pub async fn insert(&self, recipe: &NewRecipe) -> DbResult<Recipe> {
        let result = sqlx::query(
            r#"
            INSERT INTO recipes (
                name, price_cents, tax_type, item_class_code,
                fiscal_status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(&recipe.name)
        .bind(recipe.price_cents)
        .bind(recipe.tax_type)
        .bind(&recipe.item_class_code)
        .bind(FiscalStatus::Unsubmitted)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(id, name = %recipe.name, "Inserted recipe");

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Recipe", id))
    }

    /// Adds an ingredient to a recipe.
    pub async fn add_component(
        &self,
        recipe_id: i64,
        ingredient_id: i64,
        quantity: f64,
    ) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, quantity) VALUES (?1, ?2, ?3)",
        )
        .bind(recipe_id)
        .bind(ingredient_id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Loads a recipe with its components.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Recipe>> {
        let recipe = sqlx::query_as::<_, Recipe>(
            r#"
            SELECT
                id, name, price_cents, tax_type, item_class_code, item_code,
                fiscal_status, fiscal_note, created_at, updated_at
            FROM recipes
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(mut recipe) = recipe else {
            return Ok(None);
        };

        recipe.components = self.components(id).await?;
        Ok(Some(recipe))
    }

    async fn components(&self, recipe_id: i64) -> DbResult<Vec<RecipeComponent>> {
        let components = sqlx::query_as::<_, RecipeComponent>(
            r#"
            SELECT
                ri.ingredient_id,
                i.name AS ingredient_name,
                i.item_code,
                ri.quantity
            FROM recipe_ingredients ri
            JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE ri.recipe_id = ?1
            ORDER BY ri.ingredient_id
            "#,
        )
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(components)
    }

    /// Writes back the codes the authority accepted.
    ///
    /// Leaves `fiscal_status` alone: the caller decides between submitted and
    /// partial once the compositions have been sent.
    pub async fn set_fiscal_codes(
        &self,
        id: i64,
        item_code: &str,
        item_class_code: &str,
        tax_type: TaxType,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE recipes SET
                item_code = ?2,
                item_class_code = ?3,
                tax_type = ?4,
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(item_code)
        .bind(item_class_code)
        .bind(tax_type)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        expect_one_row(result, "Recipe", id)
    }

    pub async fn set_fiscal_status(
        &self,
        id: i64,
        status: FiscalStatus,
        note: Option<&str>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE recipes SET fiscal_status = ?2, fiscal_note = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(status)
        .bind(note)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        expect_one_row(result, "Recipe", id)
    }
}
