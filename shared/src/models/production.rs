//! Production runs and the approval workflow
//!
//! Two state machines are layered here: the production lifecycle
//! (`ProductionStatus`) and the staff-request / admin-decision wrapper
//! (`ApprovalStatus` + `ApprovalAction`). The functions in this module only
//! decide what must happen; the backend carries the decisions out inside a
//! transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::types::Actor;

/// Production lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl ProductionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductionStatus::Planned => "planned",
            ProductionStatus::InProgress => "in_progress",
            ProductionStatus::Completed => "completed",
            ProductionStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "planned" => Some(ProductionStatus::Planned),
            "in_progress" => Some(ProductionStatus::InProgress),
            "completed" => Some(ProductionStatus::Completed),
            "cancelled" => Some(ProductionStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProductionStatus::Completed | ProductionStatus::Cancelled)
    }

    fn rank(&self) -> u8 {
        match self {
            ProductionStatus::Planned => 0,
            ProductionStatus::InProgress => 1,
            ProductionStatus::Completed => 2,
            ProductionStatus::Cancelled => 3,
        }
    }

    /// Planned → InProgress → Completed, any open run → Cancelled
    pub fn can_transition_to(&self, next: ProductionStatus) -> bool {
        if *self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        next == ProductionStatus::Cancelled || next.rank() > self.rank()
    }
}

impl std::fmt::Display for ProductionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Approval state of the latest request on a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Approved,
    Pending,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "approved" => Some(ApprovalStatus::Approved),
            "pending" => Some(ApprovalStatus::Pending),
            "rejected" => Some(ApprovalStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutation a pending request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    Create,
    Update,
    Delete,
}

impl ApprovalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalAction::Create => "create",
            ApprovalAction::Update => "update",
            ApprovalAction::Delete => "delete",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "create" => Some(ApprovalAction::Create),
            "update" => Some(ApprovalAction::Update),
            "delete" => Some(ApprovalAction::Delete),
            _ => None,
        }
    }
}

/// Admin decision on a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

/// A production run of a menu
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionRun {
    pub id: Uuid,
    pub menu_maintenance_id: Uuid,
    /// Pieces to produce
    pub quantity: i32,
    pub status: ProductionStatus,
    pub approval_status: ApprovalStatus,
    pub approval_action: Option<ApprovalAction>,
    pub inventory_deducted: bool,
    pub expected_cost: Decimal,
    pub actual_cost: Option<Decimal>,
    pub srp: Option<Decimal>,
    pub notes: Option<String>,
    pub approval_notes: Option<String>,
    pub pending_changes: Option<ProductionChanges>,
    pub requested_by: Option<Uuid>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Field changes for a production run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductionChanges {
    pub quantity: Option<i32>,
    pub status: Option<ProductionStatus>,
    pub srp: Option<Decimal>,
    pub notes: Option<String>,
}

impl ProductionChanges {
    pub fn is_empty(&self) -> bool {
        self.quantity.is_none() && self.status.is_none() && self.srp.is_none() && self.notes.is_none()
    }
}

/// The fields of a run the workflow reasons about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunState {
    pub status: ProductionStatus,
    pub approval_status: ApprovalStatus,
    pub approval_action: Option<ApprovalAction>,
    pub inventory_deducted: bool,
}

impl From<&ProductionRun> for RunState {
    fn from(run: &ProductionRun) -> Self {
        Self {
            status: run.status,
            approval_status: run.approval_status,
            approval_action: run.approval_action,
            inventory_deducted: run.inventory_deducted,
        }
    }
}

/// How a create/update/delete request is carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestRoute {
    /// Privileged caller: apply now
    Direct,
    /// Unprivileged caller: record as pending with this action
    Deferred(ApprovalAction),
}

/// Side effects of committing an approved run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommitEffects {
    /// Run the deduction engine and set `inventory_deducted`
    pub deduct: bool,
    /// Credit the produced pieces to the menu's servings
    pub merge_servings: bool,
}

/// What an approval decision does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalPlan {
    Reject,
    DeleteRun,
    Commit(CommitEffects),
}

/// Route a create request
pub fn route_create(actor: &Actor) -> RequestRoute {
    if actor.role.is_privileged() {
        RequestRoute::Direct
    } else {
        RequestRoute::Deferred(ApprovalAction::Create)
    }
}

/// Route an update or delete request on an existing run.
///
/// A run with a request already waiting for a decision accepts no other
/// request, privileged or not.
pub fn route_change(
    actor: &Actor,
    state: &RunState,
    action: ApprovalAction,
) -> LedgerResult<RequestRoute> {
    if action == ApprovalAction::Create {
        return Err(LedgerError::InvalidApprovalState(
            "create is not a change to an existing run".to_string(),
        ));
    }
    if state.approval_status == ApprovalStatus::Pending && action == ApprovalAction::Update {
        return Err(LedgerError::InvalidApprovalState(
            "run already has a request pending approval".to_string(),
        ));
    }
    if actor.role.is_privileged() {
        return Ok(RequestRoute::Direct);
    }
    if state.approval_status == ApprovalStatus::Pending {
        return Err(LedgerError::InvalidApprovalState(
            "run already has a request pending approval".to_string(),
        ));
    }
    Ok(RequestRoute::Deferred(action))
}

/// Validate that `changes` form a legal update of a run in `state` that
/// currently produces `current_quantity` pieces.
///
/// Once stock has been deducted the quantity is fixed: the deduction covered
/// exactly `current_quantity` pieces.
pub fn validate_changes(
    state: &RunState,
    current_quantity: i32,
    changes: &ProductionChanges,
) -> LedgerResult<()> {
    if changes.is_empty() {
        return Err(LedgerError::validation("changes", "No changes requested"));
    }
    if let Some(quantity) = changes.quantity {
        crate::validation::validate_production_quantity(quantity)?;
        if state.inventory_deducted && quantity != current_quantity {
            return Err(LedgerError::validation(
                "quantity",
                "Quantity cannot change after stock has been deducted",
            ));
        }
    }
    if let Some(next) = changes.status {
        if !state.status.can_transition_to(next) {
            return Err(LedgerError::transition(state.status, next));
        }
    }
    if let Some(srp) = changes.srp {
        if srp < Decimal::ZERO {
            return Err(LedgerError::validation("srp", "SRP cannot be negative"));
        }
    }
    Ok(())
}

/// Side effects of committing a run that moves from `previous` to `next`.
///
/// `previous` is `None` for a run being created. Cancelled runs never
/// deduct; servings are credited only on the transition into Completed.
pub fn commit_effects(
    previous: Option<ProductionStatus>,
    next: ProductionStatus,
    inventory_deducted: bool,
) -> CommitEffects {
    CommitEffects {
        deduct: !inventory_deducted && next != ProductionStatus::Cancelled,
        merge_servings: next == ProductionStatus::Completed
            && previous != Some(ProductionStatus::Completed),
    }
}

/// Decide what an admin decision on a run does.
///
/// `previous_status` is the run's status before pending changes are applied
/// and `next_status` the status after.
pub fn plan_approval(
    actor: &Actor,
    state: &RunState,
    decision: ApprovalDecision,
    next_status: ProductionStatus,
) -> LedgerResult<ApprovalPlan> {
    actor.require_admin("approve production")?;

    if state.approval_status != ApprovalStatus::Pending {
        return Err(LedgerError::InvalidApprovalState(format!(
            "run is {}, only pending runs can be decided",
            state.approval_status
        )));
    }

    if decision == ApprovalDecision::Rejected {
        return Ok(ApprovalPlan::Reject);
    }

    match state.approval_action {
        Some(ApprovalAction::Delete) => Ok(ApprovalPlan::DeleteRun),
        Some(ApprovalAction::Create) => Ok(ApprovalPlan::Commit(commit_effects(
            None,
            next_status,
            state.inventory_deducted,
        ))),
        Some(ApprovalAction::Update) => Ok(ApprovalPlan::Commit(commit_effects(
            Some(state.status),
            next_status,
            state.inventory_deducted,
        ))),
        None => Err(LedgerError::InvalidApprovalState(
            "pending run has no requested action".to_string(),
        )),
    }
}
