//! Recipe catalog service

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    RawMaterial, RawMaterialRow, RecipeLine, RecipeLineRow, RecipeRequirement, UnitConversion,
    UnitConversionRow, UNIT_CONVERSION_COLUMNS,
};
use crate::services::conversion::{load_material, resolve_for_material};
use shared::{validate_positive_amount, validate_unit, Actor};

/// Recipe service
#[derive(Clone)]
pub struct RecipeService {
    db: PgPool,
}

/// One ingredient line of a recipe
#[derive(Debug, Deserialize)]
pub struct RecipeLineInput {
    pub raw_material_id: Uuid,
    /// Amount per produced piece
    pub quantity: Decimal,
    pub unit: String,
}

/// Input for replacing or extending a recipe
#[derive(Debug, Deserialize)]
pub struct UpsertRecipeInput {
    pub lines: Vec<RecipeLineInput>,
}

const RECIPE_LINE_COLUMNS: &str =
    "id, menu_maintenance_id, raw_material_id, quantity, unit, created_at, updated_at";

/// Ensure the menu exists in the catalog
pub async fn ensure_menu_exists(conn: &mut PgConnection, menu_maintenance_id: Uuid) -> AppResult<()> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM menu_maintenance WHERE id = $1)",
    )
    .bind(menu_maintenance_id)
    .fetch_one(&mut *conn)
    .await?;

    if !exists {
        return Err(AppError::NotFound("Menu".to_string()));
    }
    Ok(())
}

/// Load a menu's recipe with each line's material and conversion.
///
/// An empty result means the menu has no recipe.
pub async fn load_requirements(
    conn: &mut PgConnection,
    menu_maintenance_id: Uuid,
) -> AppResult<Vec<RecipeRequirement>> {
    let lines = sqlx::query_as::<_, RecipeLineRow>(&format!(
        "SELECT {} FROM recipe_lines WHERE menu_maintenance_id = $1 ORDER BY raw_material_id",
        RECIPE_LINE_COLUMNS
    ))
    .bind(menu_maintenance_id)
    .fetch_all(&mut *conn)
    .await?;

    if lines.is_empty() {
        return Ok(Vec::new());
    }

    let material_ids: Vec<Uuid> = lines.iter().map(|l| l.raw_material_id).collect();

    let materials: HashMap<Uuid, RawMaterial> = sqlx::query_as::<_, RawMaterialRow>(
        r#"
        SELECT id, name, category, unit, unit_price, critical_level, created_at, updated_at
        FROM raw_materials
        WHERE id = ANY($1)
        "#,
    )
    .bind(&material_ids)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|row| (row.id, RawMaterial::from(row)))
    .collect();

    let conversions: Vec<UnitConversion> = sqlx::query_as::<_, UnitConversionRow>(&format!(
        "SELECT {} FROM unit_conversions WHERE raw_material_id = ANY($1)",
        UNIT_CONVERSION_COLUMNS
    ))
    .bind(&material_ids)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(UnitConversion::from)
    .collect();

    lines
        .into_iter()
        .map(|row| {
            let line = RecipeLine::from(row);
            let material = materials
                .get(&line.raw_material_id)
                .cloned()
                .ok_or_else(|| AppError::NotFound("Raw material".to_string()))?;
            let conversion = conversions
                .iter()
                .find(|c| c.raw_material_id == line.raw_material_id && c.equivalent_unit == line.unit)
                .cloned();
            Ok(RecipeRequirement {
                line,
                material,
                conversion,
            })
        })
        .collect()
}

impl RecipeService {
    /// Create a new RecipeService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List a menu's recipe lines
    pub async fn list_recipe(&self, menu_maintenance_id: Uuid) -> AppResult<Vec<RecipeLine>> {
        let mut conn = self.db.acquire().await?;
        ensure_menu_exists(&mut conn, menu_maintenance_id).await?;

        let lines = sqlx::query_as::<_, RecipeLineRow>(&format!(
            "SELECT {} FROM recipe_lines WHERE menu_maintenance_id = $1 ORDER BY created_at",
            RECIPE_LINE_COLUMNS
        ))
        .bind(menu_maintenance_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(lines.into_iter().map(RecipeLine::from).collect())
    }

    /// Insert or update recipe lines, one per raw material.
    ///
    /// Every unit must resolve to the material's base unit before anything
    /// is written.
    pub async fn upsert_lines(
        &self,
        actor: &Actor,
        menu_maintenance_id: Uuid,
        input: UpsertRecipeInput,
    ) -> AppResult<Vec<RecipeLine>> {
        actor.require_admin("maintain recipes")?;

        if input.lines.is_empty() {
            return Err(AppError::Validation {
                field: "lines".to_string(),
                message: "At least one recipe line is required".to_string(),
            });
        }

        let mut tx = self.db.begin().await?;
        ensure_menu_exists(&mut tx, menu_maintenance_id).await?;

        for line in &input.lines {
            validate_positive_amount("quantity", line.quantity)?;
            validate_unit(&line.unit)?;
            let material = load_material(&mut tx, line.raw_material_id).await?;
            resolve_for_material(&mut tx, &material, line.quantity, line.unit.trim()).await?;
        }

        let mut saved = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            let row = sqlx::query_as::<_, RecipeLineRow>(&format!(
                r#"
                INSERT INTO recipe_lines (menu_maintenance_id, raw_material_id, quantity, unit)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (menu_maintenance_id, raw_material_id)
                DO UPDATE SET quantity = EXCLUDED.quantity, unit = EXCLUDED.unit, updated_at = NOW()
                RETURNING {}
                "#,
                RECIPE_LINE_COLUMNS
            ))
            .bind(menu_maintenance_id)
            .bind(line.raw_material_id)
            .bind(line.quantity)
            .bind(line.unit.trim())
            .fetch_one(&mut *tx)
            .await?;
            saved.push(RecipeLine::from(row));
        }

        tx.commit().await?;

        tracing::info!(
            menu_maintenance_id = %menu_maintenance_id,
            lines = saved.len(),
            "Recipe updated"
        );

        Ok(saved)
    }

    /// Remove one ingredient from a recipe
    pub async fn delete_line(
        &self,
        actor: &Actor,
        menu_maintenance_id: Uuid,
        raw_material_id: Uuid,
    ) -> AppResult<()> {
        actor.require_admin("maintain recipes")?;

        let result = sqlx::query(
            "DELETE FROM recipe_lines WHERE menu_maintenance_id = $1 AND raw_material_id = $2",
        )
        .bind(menu_maintenance_id)
        .bind(raw_material_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Recipe line".to_string()));
        }

        Ok(())
    }
}
