//! Unit conversion service: resolving recipe and purchase units to base units

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    RawMaterial, RawMaterialRow, ResolvedQuantity, UnitConversion, UnitConversionRow,
    UNIT_CONVERSION_COLUMNS,
};
use shared::{resolve_to_base, validate_conversion, Actor};

/// Conversion service
#[derive(Clone)]
pub struct ConversionService {
    db: PgPool,
}

/// Input for creating a unit conversion
#[derive(Debug, Deserialize)]
pub struct CreateConversionInput {
    pub raw_material_id: Uuid,
    pub equivalent_unit: String,
    /// Equivalent units per one base unit
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub srp: Option<Decimal>,
    #[serde(default)]
    pub is_default_retail: bool,
}

/// Query for resolving a quantity
#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub raw_material_id: Uuid,
    pub quantity: Decimal,
    pub unit: String,
}

/// Load a raw material
pub async fn load_material(conn: &mut PgConnection, raw_material_id: Uuid) -> AppResult<RawMaterial> {
    let row = sqlx::query_as::<_, RawMaterialRow>(
        r#"
        SELECT id, name, category, unit, unit_price, critical_level, created_at, updated_at
        FROM raw_materials
        WHERE id = $1
        "#,
    )
    .bind(raw_material_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Raw material".to_string()))?;

    Ok(row.into())
}

/// Load the conversion for `(raw_material_id, equivalent_unit)`, if any
pub async fn find_conversion(
    conn: &mut PgConnection,
    raw_material_id: Uuid,
    equivalent_unit: &str,
) -> AppResult<Option<UnitConversion>> {
    let row = sqlx::query_as::<_, UnitConversionRow>(&format!(
        "SELECT {} FROM unit_conversions WHERE raw_material_id = $1 AND equivalent_unit = $2",
        UNIT_CONVERSION_COLUMNS
    ))
    .bind(raw_material_id)
    .bind(equivalent_unit)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(UnitConversion::from))
}

/// Load a conversion by id
pub async fn load_conversion(conn: &mut PgConnection, id: Uuid) -> AppResult<UnitConversion> {
    let row = sqlx::query_as::<_, UnitConversionRow>(&format!(
        "SELECT {} FROM unit_conversions WHERE id = $1",
        UNIT_CONVERSION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Unit conversion".to_string()))?;

    Ok(row.into())
}

/// Resolve `quantity` of `unit` for a material already loaded
pub async fn resolve_for_material(
    conn: &mut PgConnection,
    material: &RawMaterial,
    quantity: Decimal,
    unit: &str,
) -> AppResult<ResolvedQuantity> {
    let conversion = if unit == material.unit {
        None
    } else {
        find_conversion(conn, material.id, unit).await?
    };

    Ok(resolve_to_base(material, conversion.as_ref(), quantity, unit)?)
}

impl ConversionService {
    /// Create a new ConversionService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Convert a quantity in any known unit of a material to its base unit
    pub async fn resolve_unit(&self, query: ResolveQuery) -> AppResult<ResolvedQuantity> {
        let mut conn = self.db.acquire().await?;
        let material = load_material(&mut conn, query.raw_material_id).await?;
        resolve_for_material(&mut conn, &material, query.quantity, &query.unit).await
    }

    /// Create a conversion for a material.
    ///
    /// Marking it as the default retail conversion clears the flag on the
    /// material's other conversions.
    pub async fn create_conversion(
        &self,
        actor: &Actor,
        input: CreateConversionInput,
    ) -> AppResult<UnitConversion> {
        actor.require_admin("maintain unit conversions")?;

        let mut tx = self.db.begin().await?;
        let material = load_material(&mut tx, input.raw_material_id).await?;

        validate_conversion(
            &material.unit,
            &input.equivalent_unit,
            input.quantity,
            input.unit_price,
            input.srp,
        )?;

        if find_conversion(&mut tx, material.id, input.equivalent_unit.trim())
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "{} already has a conversion for '{}'",
                material.name,
                input.equivalent_unit.trim()
            )));
        }

        if input.is_default_retail {
            sqlx::query(
                r#"
                UPDATE unit_conversions
                SET is_default_retail = FALSE, updated_at = NOW()
                WHERE raw_material_id = $1 AND is_default_retail
                "#,
            )
            .bind(material.id)
            .execute(&mut *tx)
            .await?;
        }

        let row = sqlx::query_as::<_, UnitConversionRow>(&format!(
            r#"
            INSERT INTO unit_conversions (
                raw_material_id, base_unit, equivalent_unit, quantity, unit_price, srp, is_default_retail
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            UNIT_CONVERSION_COLUMNS
        ))
        .bind(material.id)
        .bind(&material.unit)
        .bind(input.equivalent_unit.trim())
        .bind(input.quantity)
        .bind(input.unit_price)
        .bind(input.srp)
        .bind(input.is_default_retail)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            raw_material_id = %material.id,
            equivalent_unit = %row.equivalent_unit,
            "Unit conversion created"
        );

        Ok(row.into())
    }
}
