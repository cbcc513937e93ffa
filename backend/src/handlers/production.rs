//! HTTP handlers for production run endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{ProductionChanges, ProductionRun};
use crate::services::production::{
    ApproveInput, CreateProductionInput, ProductionOutcome, ProductionService,
};
use crate::AppState;

/// Create a production run
pub async fn create_production(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateProductionInput>,
) -> AppResult<(StatusCode, Json<ProductionRun>)> {
    let service = ProductionService::new(state.db, state.notifier);
    let run = service.create_run(&current_user.0.actor(), input).await?;
    Ok((StatusCode::CREATED, Json(run)))
}

/// Get a production run
pub async fn get_production(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(production_id): Path<Uuid>,
) -> AppResult<Json<ProductionRun>> {
    let service = ProductionService::new(state.db, state.notifier);
    let run = service.get_run(production_id).await?;
    Ok(Json(run))
}

/// List runs waiting for approval
pub async fn list_pending_productions(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<ProductionRun>>> {
    let service = ProductionService::new(state.db, state.notifier);
    let runs = service.list_pending().await?;
    Ok(Json(runs))
}

/// Update a production run
pub async fn update_production(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(production_id): Path<Uuid>,
    Json(changes): Json<ProductionChanges>,
) -> AppResult<Json<ProductionRun>> {
    let service = ProductionService::new(state.db, state.notifier);
    let run = service
        .update_run(&current_user.0.actor(), production_id, changes)
        .await?;
    Ok(Json(run))
}

/// Delete a production run, or request deletion
pub async fn delete_production(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(production_id): Path<Uuid>,
) -> AppResult<Json<ProductionOutcome>> {
    let service = ProductionService::new(state.db, state.notifier);
    let outcome = service
        .delete_run(&current_user.0.actor(), production_id)
        .await?;
    Ok(Json(outcome))
}

/// Approve or reject a pending request
pub async fn approve_production(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(production_id): Path<Uuid>,
    Json(input): Json<ApproveInput>,
) -> AppResult<Json<ProductionOutcome>> {
    let service = ProductionService::new(state.db, state.notifier);
    let outcome = service
        .approve_run(&current_user.0.actor(), production_id, input)
        .await?;
    Ok(Json(outcome))
}
