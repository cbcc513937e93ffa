//! Stock ledger service and the deduction engine
//!
//! A deduction locks every stock record the recipe touches (ascending id),
//! plans against the locked rows, then applies the plan as one conditional
//! bulk update. Every applied line is written to `stock_movements`, keyed by
//! the operation id, so an operation can never be applied twice.

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::external::Notifier;
use crate::models::{
    DeductionResult, StockLevel, StockMovement, StockRecord, StockRecordRow,
    MOVEMENT_PRODUCTION_DEDUCTION,
};
use crate::services::recipe::{ensure_menu_exists, load_requirements};
use shared::{aggregate_by_record, plan_deduction, validate_production_quantity, Actor, LedgerError};

/// Stock service
#[derive(Clone)]
pub struct StockService {
    db: PgPool,
    notifier: Notifier,
}

/// Input for a direct deduction
#[derive(Debug, Deserialize)]
pub struct DeductInput {
    pub menu_maintenance_id: Uuid,
    pub quantity: i32,
    /// Idempotency key; a replay with the same key is rejected
    pub operation_id: Option<Uuid>,
}

const STOCK_LEVEL_SELECT: &str = r#"
    SELECT s.id AS stock_record_id, s.raw_material_id, m.name AS material_name, m.category,
           s.unit, s.quantity, s.available, m.critical_level, s.updated_at
    FROM stock_records s
    JOIN raw_materials m ON m.id = s.raw_material_id
"#;

/// Lock the stock records of the given materials in ascending id order
pub async fn lock_stock(
    conn: &mut PgConnection,
    raw_material_ids: &[Uuid],
) -> AppResult<Vec<StockRecord>> {
    let rows = sqlx::query_as::<_, StockRecordRow>(
        r#"
        SELECT id, raw_material_id, unit, quantity, available, created_at, updated_at
        FROM stock_records
        WHERE raw_material_id = ANY($1)
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(raw_material_ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(StockRecord::from).collect())
}

/// Map a unique violation on the movement ledger to a conflict
pub fn replayed_operation(err: sqlx::Error, operation_id: Uuid) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => AppError::Conflict(
            format!("Operation {} has already been applied", operation_id),
        ),
        _ => AppError::DatabaseError(err),
    }
}

/// Deduct the recipe of `menu_maintenance_id` for `produced_quantity` pieces.
///
/// Runs on the caller's transaction. On error nothing has been written that
/// the caller's rollback does not undo.
pub async fn deduct_in_tx(
    conn: &mut PgConnection,
    operation_id: Uuid,
    menu_maintenance_id: Uuid,
    produced_quantity: i32,
    actor_id: Uuid,
) -> AppResult<DeductionResult> {
    let requirements = load_requirements(conn, menu_maintenance_id).await?;
    if requirements.is_empty() {
        return Err(LedgerError::NoRecipeDefined { menu_maintenance_id }.into());
    }

    let mut material_ids: Vec<Uuid> = requirements.iter().map(|r| r.material.id).collect();
    material_ids.sort();
    material_ids.dedup();

    let stock = lock_stock(conn, &material_ids).await?;

    let plan = plan_deduction(
        menu_maintenance_id,
        &requirements,
        &stock,
        Decimal::from(produced_quantity),
    )
    .map_err(|e| {
        if let LedgerError::InsufficientStock { shortfalls } = &e {
            tracing::warn!(
                menu_maintenance_id = %menu_maintenance_id,
                shortfalls = shortfalls.len(),
                "Deduction rejected"
            );
        }
        e
    })?;

    let totals = aggregate_by_record(&plan.receipts);
    let ids: Vec<Uuid> = totals.iter().map(|(id, _)| *id).collect();
    let amounts: Vec<Decimal> = totals.iter().map(|(_, amount)| *amount).collect();
    let unit_costs: Vec<Decimal> = ids
        .iter()
        .map(|id| {
            plan.receipts
                .iter()
                .find(|r| r.stock_record_id == *id)
                .map(|r| r.unit_cost)
                .unwrap_or_default()
        })
        .collect();

    let result = sqlx::query(
        r#"
        UPDATE stock_records s
        SET available = s.available - d.amount, updated_at = NOW()
        FROM UNNEST($1::uuid[], $2::numeric[]) AS d(id, amount)
        WHERE s.id = d.id AND s.available >= d.amount
        "#,
    )
    .bind(&ids)
    .bind(&amounts)
    .execute(&mut *conn)
    .await?;

    // Rows are locked, so a short count means the plan and the table disagree
    if result.rows_affected() != ids.len() as u64 {
        return Err(AppError::Internal(
            "Stock changed while the deduction was being applied".to_string(),
        ));
    }

    sqlx::query(
        r#"
        INSERT INTO stock_movements (operation_id, stock_record_id, delta, kind, unit_cost, created_by)
        SELECT $1, d.id, -d.amount, $2, d.unit_cost, $3
        FROM UNNEST($4::uuid[], $5::numeric[], $6::numeric[]) AS d(id, amount, unit_cost)
        "#,
    )
    .bind(operation_id)
    .bind(MOVEMENT_PRODUCTION_DEDUCTION)
    .bind(actor_id)
    .bind(&ids)
    .bind(&amounts)
    .bind(&unit_costs)
    .execute(&mut *conn)
    .await
    .map_err(|e| replayed_operation(e, operation_id))?;

    Ok(DeductionResult::from_plan(operation_id, plan))
}

/// Send a low-stock alert for every material the deduction left at or below
/// its critical level
pub async fn alert_low_stock(notifier: &Notifier, result: &DeductionResult) {
    for receipt in result.receipts.iter().filter(|r| r.is_below_critical()) {
        notifier
            .low_stock(&receipt.material_name, receipt.remaining_available, &receipt.unit)
            .await;
    }
}

impl StockService {
    /// Create a new StockService instance
    pub fn new(db: PgPool, notifier: Notifier) -> Self {
        Self { db, notifier }
    }

    /// Deduct a recipe outside a production run
    pub async fn deduct_for_production(
        &self,
        actor: &Actor,
        input: DeductInput,
    ) -> AppResult<DeductionResult> {
        actor.require_admin("deduct stock")?;
        validate_production_quantity(input.quantity)?;

        let operation_id = input.operation_id.unwrap_or_else(Uuid::new_v4);

        let mut tx = self.db.begin().await?;
        ensure_menu_exists(&mut tx, input.menu_maintenance_id).await?;
        let result = deduct_in_tx(
            &mut tx,
            operation_id,
            input.menu_maintenance_id,
            input.quantity,
            actor.user_id,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            operation_id = %operation_id,
            menu_maintenance_id = %input.menu_maintenance_id,
            quantity = input.quantity,
            total_cost = %result.total_cost,
            "Stock deducted"
        );

        alert_low_stock(&self.notifier, &result).await;

        Ok(result)
    }

    /// All stock levels
    pub async fn list_stock(&self) -> AppResult<Vec<StockLevel>> {
        let levels = sqlx::query_as::<_, StockLevel>(&format!(
            "{} ORDER BY m.name, s.unit",
            STOCK_LEVEL_SELECT
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(levels)
    }

    /// Stock levels at or below their material's critical level
    pub async fn low_stock(&self) -> AppResult<Vec<StockLevel>> {
        let levels = sqlx::query_as::<_, StockLevel>(&format!(
            "{} WHERE s.available <= m.critical_level ORDER BY s.available - m.critical_level, m.name",
            STOCK_LEVEL_SELECT
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(levels)
    }

    /// Ledger entries for one stock record, newest first
    pub async fn movements(&self, stock_record_id: Uuid) -> AppResult<Vec<StockMovement>> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM stock_records WHERE id = $1)",
        )
        .bind(stock_record_id)
        .fetch_one(&self.db)
        .await?;

        if !exists {
            return Err(AppError::NotFound("Stock record".to_string()));
        }

        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, operation_id, stock_record_id, delta, kind, unit_cost, created_by, created_at
            FROM stock_movements
            WHERE stock_record_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(stock_record_id)
        .fetch_all(&self.db)
        .await?;

        Ok(movements)
    }
}
