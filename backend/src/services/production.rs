//! Production service: run lifecycle and the staff approval workflow
//!
//! Decisions come from the shared state machines; this service carries them
//! out on a locked run inside one transaction, so a failed deduction leaves
//! the run exactly as it was.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::external::Notifier;
use crate::models::{
    ApprovalAction, ApprovalDecision, ApprovalPlan, ApprovalStatus, CommitEffects,
    DeductionResult, ProductionChanges, ProductionRun, ProductionRunRow, ProductionStatus,
    RequestRoute, RunState, PRODUCTION_COLUMNS,
};
use crate::services::menu::merge_from_production;
use crate::services::recipe::{ensure_menu_exists, load_requirements};
use crate::services::stock::{alert_low_stock, deduct_in_tx};
use shared::{
    commit_effects, estimate_recipe_cost, plan_approval, route_change, route_create,
    validate_changes, validate_production_quantity, Actor,
};

/// Production service
#[derive(Clone)]
pub struct ProductionService {
    db: PgPool,
    notifier: Notifier,
}

/// Input for creating a production run
#[derive(Debug, Deserialize)]
pub struct CreateProductionInput {
    pub menu_maintenance_id: Uuid,
    pub quantity: i32,
    pub status: Option<ProductionStatus>,
    pub srp: Option<Decimal>,
    pub notes: Option<String>,
}

/// Input for an admin decision
#[derive(Debug, Deserialize)]
pub struct ApproveInput {
    pub decision: ApprovalDecision,
    pub notes: Option<String>,
}

/// Result of a request that may remove the run
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProductionOutcome {
    Saved { run: ProductionRun },
    Deleted { id: Uuid },
}

async fn fetch_run(conn: &mut PgConnection, id: Uuid, lock: bool) -> AppResult<ProductionRun> {
    let row = sqlx::query_as::<_, ProductionRunRow>(&format!(
        "SELECT {} FROM production_runs WHERE id = $1{}",
        PRODUCTION_COLUMNS,
        if lock { " FOR UPDATE" } else { "" }
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Production run".to_string()))?;

    row.try_into()
}

async fn expected_cost(
    conn: &mut PgConnection,
    menu_maintenance_id: Uuid,
    quantity: i32,
) -> AppResult<Decimal> {
    let requirements = load_requirements(conn, menu_maintenance_id).await?;
    Ok(estimate_recipe_cost(
        menu_maintenance_id,
        &requirements,
        Decimal::from(quantity),
    )?)
}

/// Apply `changes` to `run` in memory
fn apply_changes(run: &mut ProductionRun, changes: &ProductionChanges) {
    if let Some(quantity) = changes.quantity {
        run.quantity = quantity;
    }
    if let Some(status) = changes.status {
        run.status = status;
    }
    if changes.srp.is_some() {
        run.srp = changes.srp;
    }
    if changes.notes.is_some() {
        run.notes = changes.notes.clone();
    }
}

/// Carry out the side effects of committing `run` (already holding its
/// new field values) and mark it approved by `actor`.
async fn commit_run(
    conn: &mut PgConnection,
    run: &mut ProductionRun,
    effects: CommitEffects,
    actor: &Actor,
    approval_notes: Option<String>,
) -> AppResult<Option<DeductionResult>> {
    let deduction = if effects.deduct {
        let result = deduct_in_tx(
            conn,
            run.id,
            run.menu_maintenance_id,
            run.quantity,
            actor.user_id,
        )
        .await?;
        run.inventory_deducted = true;
        run.actual_cost = Some(result.total_cost);
        Some(result)
    } else {
        None
    };

    if effects.merge_servings {
        merge_from_production(
            conn,
            run.menu_maintenance_id,
            run.quantity,
            run.srp,
            run.id,
            actor.user_id,
        )
        .await?;
    }

    let row = sqlx::query_as::<_, ProductionRunRow>(&format!(
        r#"
        UPDATE production_runs
        SET quantity = $2, status = $3, approval_status = $4, approval_action = NULL,
            inventory_deducted = $5, expected_cost = $6, actual_cost = $7, srp = $8, notes = $9,
            approval_notes = COALESCE($10, approval_notes), pending_changes = NULL,
            approved_by = $11, approved_at = NOW(), updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        PRODUCTION_COLUMNS
    ))
    .bind(run.id)
    .bind(run.quantity)
    .bind(run.status.as_str())
    .bind(ApprovalStatus::Approved.as_str())
    .bind(run.inventory_deducted)
    .bind(run.expected_cost)
    .bind(run.actual_cost)
    .bind(run.srp)
    .bind(&run.notes)
    .bind(approval_notes)
    .bind(actor.user_id)
    .fetch_one(&mut *conn)
    .await?;

    *run = row.try_into()?;
    Ok(deduction)
}

impl ProductionService {
    /// Create a new ProductionService instance
    pub fn new(db: PgPool, notifier: Notifier) -> Self {
        Self { db, notifier }
    }

    /// Get a production run
    pub async fn get_run(&self, id: Uuid) -> AppResult<ProductionRun> {
        let mut conn = self.db.acquire().await?;
        fetch_run(&mut conn, id, false).await
    }

    /// Runs waiting for an admin decision, oldest first
    pub async fn list_pending(&self) -> AppResult<Vec<ProductionRun>> {
        let rows = sqlx::query_as::<_, ProductionRunRow>(&format!(
            "SELECT {} FROM production_runs WHERE approval_status = $1 ORDER BY updated_at",
            PRODUCTION_COLUMNS
        ))
        .bind(ApprovalStatus::Pending.as_str())
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(ProductionRun::try_from).collect()
    }

    /// Create a production run.
    ///
    /// An admin's run is approved and deducted at once; a staff run waits
    /// for approval.
    pub async fn create_run(
        &self,
        actor: &Actor,
        input: CreateProductionInput,
    ) -> AppResult<ProductionRun> {
        validate_production_quantity(input.quantity)?;
        let status = input.status.unwrap_or(ProductionStatus::Planned);
        if status == ProductionStatus::Cancelled {
            return Err(AppError::Validation {
                field: "status".to_string(),
                message: "A production run cannot be created cancelled".to_string(),
            });
        }

        let mut tx = self.db.begin().await?;
        ensure_menu_exists(&mut tx, input.menu_maintenance_id).await?;
        let cost = expected_cost(&mut tx, input.menu_maintenance_id, input.quantity).await?;

        let route = route_create(actor);
        let (approval_status, approval_action) = match route {
            RequestRoute::Direct => (ApprovalStatus::Approved, None),
            RequestRoute::Deferred(action) => (ApprovalStatus::Pending, Some(action.as_str())),
        };

        let row = sqlx::query_as::<_, ProductionRunRow>(&format!(
            r#"
            INSERT INTO production_runs (
                menu_maintenance_id, quantity, status, approval_status, approval_action,
                inventory_deducted, expected_cost, srp, notes, requested_by
            )
            VALUES ($1, $2, $3, $4, $5, FALSE, $6, $7, $8, $9)
            RETURNING {}
            "#,
            PRODUCTION_COLUMNS
        ))
        .bind(input.menu_maintenance_id)
        .bind(input.quantity)
        .bind(status.as_str())
        .bind(approval_status.as_str())
        .bind(approval_action)
        .bind(cost)
        .bind(input.srp)
        .bind(&input.notes)
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut run = ProductionRun::try_from(row)?;

        let deduction = match route {
            RequestRoute::Direct => {
                let effects = commit_effects(None, run.status, false);
                commit_run(&mut tx, &mut run, effects, actor, None).await?
            }
            RequestRoute::Deferred(_) => None,
        };

        tx.commit().await?;

        tracing::info!(
            production_id = %run.id,
            menu_maintenance_id = %run.menu_maintenance_id,
            quantity = run.quantity,
            approval_status = %run.approval_status,
            "Production run created"
        );

        self.after_commit(&run, deduction.as_ref()).await;
        Ok(run)
    }

    /// Update a production run.
    ///
    /// Admin updates apply directly. Staff updates are stored as pending
    /// changes for an admin to decide on.
    pub async fn update_run(
        &self,
        actor: &Actor,
        id: Uuid,
        changes: ProductionChanges,
    ) -> AppResult<ProductionRun> {
        let mut tx = self.db.begin().await?;
        let mut run = fetch_run(&mut tx, id, true).await?;

        let state = RunState::from(&run);
        let route = route_change(actor, &state, ApprovalAction::Update)?;
        validate_changes(&state, run.quantity, &changes)?;

        let deduction = match route {
            RequestRoute::Direct => {
                let previous = run.status;
                apply_changes(&mut run, &changes);
                if changes.quantity.is_some() {
                    run.expected_cost =
                        expected_cost(&mut tx, run.menu_maintenance_id, run.quantity).await?;
                }
                let effects = commit_effects(Some(previous), run.status, run.inventory_deducted);
                commit_run(&mut tx, &mut run, effects, actor, None).await?
            }
            RequestRoute::Deferred(action) => {
                let row = sqlx::query_as::<_, ProductionRunRow>(&format!(
                    r#"
                    UPDATE production_runs
                    SET approval_status = $2, approval_action = $3, pending_changes = $4,
                        requested_by = $5, updated_at = NOW()
                    WHERE id = $1
                    RETURNING {}
                    "#,
                    PRODUCTION_COLUMNS
                ))
                .bind(id)
                .bind(ApprovalStatus::Pending.as_str())
                .bind(action.as_str())
                .bind(Json(&changes))
                .bind(actor.user_id)
                .fetch_one(&mut *tx)
                .await?;
                run = row.try_into()?;
                None
            }
        };

        tx.commit().await?;

        tracing::info!(
            production_id = %run.id,
            status = %run.status,
            approval_status = %run.approval_status,
            "Production run updated"
        );

        self.after_commit(&run, deduction.as_ref()).await;
        Ok(run)
    }

    /// Delete a production run. Deleting never restocks.
    pub async fn delete_run(&self, actor: &Actor, id: Uuid) -> AppResult<ProductionOutcome> {
        let mut tx = self.db.begin().await?;
        let run = fetch_run(&mut tx, id, true).await?;

        let outcome = match route_change(actor, &RunState::from(&run), ApprovalAction::Delete)? {
            RequestRoute::Direct => {
                sqlx::query("DELETE FROM production_runs WHERE id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                ProductionOutcome::Deleted { id }
            }
            RequestRoute::Deferred(action) => {
                let row = sqlx::query_as::<_, ProductionRunRow>(&format!(
                    r#"
                    UPDATE production_runs
                    SET approval_status = $2, approval_action = $3, pending_changes = NULL,
                        requested_by = $4, updated_at = NOW()
                    WHERE id = $1
                    RETURNING {}
                    "#,
                    PRODUCTION_COLUMNS
                ))
                .bind(id)
                .bind(ApprovalStatus::Pending.as_str())
                .bind(action.as_str())
                .bind(actor.user_id)
                .fetch_one(&mut *tx)
                .await?;
                ProductionOutcome::Saved {
                    run: row.try_into()?,
                }
            }
        };

        tx.commit().await?;

        match &outcome {
            ProductionOutcome::Deleted { id } => {
                tracing::info!(production_id = %id, "Production run deleted");
            }
            ProductionOutcome::Saved { run } => {
                tracing::info!(production_id = %run.id, "Production run delete requested");
                self.notifier
                    .approval_requested(run.id, ApprovalAction::Delete.as_str())
                    .await;
            }
        }

        Ok(outcome)
    }

    /// Decide on a pending request.
    ///
    /// If the approved change needs a deduction and stock is short, the whole
    /// decision rolls back and the run stays pending.
    pub async fn approve_run(
        &self,
        actor: &Actor,
        id: Uuid,
        input: ApproveInput,
    ) -> AppResult<ProductionOutcome> {
        let mut tx = self.db.begin().await?;
        let mut run = fetch_run(&mut tx, id, true).await?;

        let changes = run.pending_changes.clone().unwrap_or_default();
        let next_status = changes.status.unwrap_or(run.status);
        let state = RunState::from(&run);

        let mut deduction = None;
        let outcome = match plan_approval(actor, &state, input.decision, next_status)? {
            ApprovalPlan::Reject => {
                let row = sqlx::query_as::<_, ProductionRunRow>(&format!(
                    r#"
                    UPDATE production_runs
                    SET approval_status = $2, approval_notes = $3, pending_changes = NULL,
                        approved_by = $4, approved_at = NOW(), updated_at = NOW()
                    WHERE id = $1
                    RETURNING {}
                    "#,
                    PRODUCTION_COLUMNS
                ))
                .bind(id)
                .bind(ApprovalStatus::Rejected.as_str())
                .bind(&input.notes)
                .bind(actor.user_id)
                .fetch_one(&mut *tx)
                .await?;
                ProductionOutcome::Saved {
                    run: row.try_into()?,
                }
            }
            ApprovalPlan::DeleteRun => {
                sqlx::query("DELETE FROM production_runs WHERE id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                ProductionOutcome::Deleted { id }
            }
            ApprovalPlan::Commit(effects) => {
                apply_changes(&mut run, &changes);
                if changes.quantity.is_some() {
                    run.expected_cost =
                        expected_cost(&mut tx, run.menu_maintenance_id, run.quantity).await?;
                }
                deduction = commit_run(&mut tx, &mut run, effects, actor, input.notes.clone()).await?;
                ProductionOutcome::Saved { run }
            }
        };

        tx.commit().await?;

        tracing::info!(
            production_id = %id,
            decision = ?input.decision,
            approved_by = %actor.user_id,
            "Production request decided"
        );

        if let Some(result) = &deduction {
            alert_low_stock(&self.notifier, result).await;
        }

        Ok(outcome)
    }

    async fn after_commit(&self, run: &ProductionRun, deduction: Option<&DeductionResult>) {
        if let Some(result) = deduction {
            alert_low_stock(&self.notifier, result).await;
        }
        if run.approval_status == ApprovalStatus::Pending {
            if let Some(action) = run.approval_action {
                self.notifier.approval_requested(run.id, action.as_str()).await;
            }
        }
    }
}
