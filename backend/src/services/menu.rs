//! Menu servings counter
//!
//! Servings change only through conditional updates that keep them
//! non-negative, and every change is appended to `servings_adjustments`.

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{MenuItem, MenuItemRow, ServingsCheck, ServingsReason, MENU_ITEM_COLUMNS};
use shared::{
    apply_servings_delta, has_sufficient_servings, validate_adjustment_reason, Actor, LedgerError,
    ServingsShortfall,
};

/// Menu service
#[derive(Clone)]
pub struct MenuService {
    db: PgPool,
}

/// Input for a manual servings adjustment
#[derive(Debug, Deserialize)]
pub struct AdjustServingsInput {
    pub delta: i32,
    /// Why the count changed (spoilage, recount, ...), kept with the adjustment
    pub reason: Option<String>,
}

/// Query for a servings check
#[derive(Debug, Deserialize)]
pub struct ServingsQuery {
    pub quantity: i32,
}

/// Credit a completed production to its sellable menu item.
///
/// Creates the item on the first completion of a menu, priced at `srp`
/// when given and at the catalog price otherwise.
pub async fn merge_from_production(
    conn: &mut PgConnection,
    menu_maintenance_id: Uuid,
    quantity: i32,
    srp: Option<Decimal>,
    production_id: Uuid,
    actor_id: Uuid,
) -> AppResult<MenuItem> {
    let row = sqlx::query_as::<_, MenuItemRow>(&format!(
        r#"
        INSERT INTO menu_items (menu_maintenance_id, name, price, servings, created_by)
        SELECT m.id, m.name, COALESCE($2, m.price), $3, $4
        FROM menu_maintenance m
        WHERE m.id = $1
        ON CONFLICT (menu_maintenance_id)
        DO UPDATE SET servings = menu_items.servings + EXCLUDED.servings, updated_at = NOW()
        RETURNING {}
        "#,
        MENU_ITEM_COLUMNS
    ))
    .bind(menu_maintenance_id)
    .bind(srp)
    .bind(quantity)
    .bind(actor_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Menu".to_string()))?;

    record_adjustments(
        conn,
        &[(row.id, quantity)],
        ServingsReason::ProductionCompleted,
        Some(production_id),
        None,
        actor_id,
    )
    .await?;

    tracing::info!(
        menu_item_id = %row.id,
        production_id = %production_id,
        servings = row.servings,
        "Servings merged from production"
    );

    Ok(row.into())
}

/// Lock menu items in ascending id order. Fails if any id is unknown.
pub async fn lock_menu_items(conn: &mut PgConnection, ids: &[Uuid]) -> AppResult<Vec<MenuItem>> {
    let mut ids = ids.to_vec();
    ids.sort();
    ids.dedup();

    let rows = sqlx::query_as::<_, MenuItemRow>(&format!(
        "SELECT {} FROM menu_items WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        MENU_ITEM_COLUMNS
    ))
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    if rows.len() != ids.len() {
        return Err(AppError::NotFound("Menu item".to_string()));
    }

    Ok(rows.into_iter().map(MenuItem::from).collect())
}

/// Apply signed servings deltas to locked items.
///
/// The update refuses any row that would go negative; a refused row fails
/// the whole call.
pub async fn apply_servings(
    conn: &mut PgConnection,
    deltas: &[(Uuid, i32)],
    reason: ServingsReason,
    reference_id: Option<Uuid>,
    note: Option<&str>,
    actor_id: Uuid,
) -> AppResult<()> {
    if deltas.is_empty() {
        return Ok(());
    }

    let ids: Vec<Uuid> = deltas.iter().map(|(id, _)| *id).collect();
    let amounts: Vec<i32> = deltas.iter().map(|(_, delta)| *delta).collect();

    let updated = sqlx::query_as::<_, MenuItemRow>(
        r#"
        UPDATE menu_items m
        SET servings = m.servings + d.delta, updated_at = NOW()
        FROM UNNEST($1::uuid[], $2::int4[]) AS d(id, delta)
        WHERE m.id = d.id AND m.servings + d.delta >= 0
        RETURNING m.id, m.menu_maintenance_id, m.name, m.price, m.servings, m.created_by,
                  m.created_at, m.updated_at
        "#,
    )
    .bind(&ids)
    .bind(&amounts)
    .fetch_all(&mut *conn)
    .await?;

    if updated.len() != ids.len() {
        let shortfalls = lock_menu_items(conn, &ids)
            .await?
            .into_iter()
            .filter_map(|item| {
                let delta = deltas.iter().find(|(id, _)| *id == item.id)?.1;
                (i64::from(item.servings) + i64::from(delta) < 0).then(|| ServingsShortfall {
                    menu_item_id: item.id,
                    name: item.name,
                    requested: delta.saturating_neg(),
                    servings: item.servings,
                })
            })
            .collect();
        return Err(LedgerError::InsufficientServings { shortfalls }.into());
    }

    record_adjustments(conn, deltas, reason, reference_id, note, actor_id).await
}

async fn record_adjustments(
    conn: &mut PgConnection,
    deltas: &[(Uuid, i32)],
    reason: ServingsReason,
    reference_id: Option<Uuid>,
    note: Option<&str>,
    actor_id: Uuid,
) -> AppResult<()> {
    let ids: Vec<Uuid> = deltas.iter().map(|(id, _)| *id).collect();
    let amounts: Vec<i32> = deltas.iter().map(|(_, delta)| *delta).collect();

    sqlx::query(
        r#"
        INSERT INTO servings_adjustments (menu_item_id, delta, reason, reference_id, note, created_by)
        SELECT d.id, d.delta, $3, $4, $5, $6
        FROM UNNEST($1::uuid[], $2::int4[]) AS d(id, delta)
        "#,
    )
    .bind(&ids)
    .bind(&amounts)
    .bind(reason.as_str())
    .bind(reference_id)
    .bind(note)
    .bind(actor_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

impl MenuService {
    /// Create a new MenuService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get a sellable menu item
    pub async fn get_menu_item(&self, id: Uuid) -> AppResult<MenuItem> {
        let row = sqlx::query_as::<_, MenuItemRow>(&format!(
            "SELECT {} FROM menu_items WHERE id = $1",
            MENU_ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Menu item".to_string()))?;

        Ok(row.into())
    }

    /// Current servings and whether `quantity` more can be sold
    pub async fn check_servings_available(&self, id: Uuid, quantity: i32) -> AppResult<ServingsCheck> {
        shared::validate_order_quantity(quantity)?;
        let item = self.get_menu_item(id).await?;

        Ok(ServingsCheck {
            menu_item_id: item.id,
            requested: quantity,
            servings: item.servings,
            available: has_sufficient_servings(item.servings, quantity),
        })
    }

    /// Manually add or remove servings
    pub async fn adjust_servings(
        &self,
        actor: &Actor,
        id: Uuid,
        input: AdjustServingsInput,
    ) -> AppResult<MenuItem> {
        actor.require_admin("adjust servings")?;

        if input.delta == 0 {
            return Err(AppError::Validation {
                field: "delta".to_string(),
                message: "Delta must not be zero".to_string(),
            });
        }
        let note = input.reason.as_deref().map(str::trim);
        if let Some(note) = note {
            validate_adjustment_reason(note)?;
        }

        let mut tx = self.db.begin().await?;
        let mut items = lock_menu_items(&mut tx, &[id]).await?;
        let mut item = items.pop().ok_or_else(|| AppError::NotFound("Menu item".to_string()))?;

        let servings = apply_servings_delta(&item, input.delta)?;
        apply_servings(
            &mut tx,
            &[(id, input.delta)],
            ServingsReason::ManualAdjustment,
            None,
            note,
            actor.user_id,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            menu_item_id = %id,
            delta = input.delta,
            servings,
            reason = note.unwrap_or(""),
            "Servings adjusted"
        );

        item.servings = servings;
        Ok(item)
    }
}
