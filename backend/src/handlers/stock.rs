//! HTTP handlers for stock and deduction endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{DeductionResult, StockLevel, StockMovement};
use crate::services::stock::{DeductInput, StockService};
use crate::AppState;

/// Deduct a menu's recipe from stock
pub async fn deduct_for_production(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<DeductInput>,
) -> AppResult<Json<DeductionResult>> {
    let service = StockService::new(state.db, state.notifier);
    let result = service
        .deduct_for_production(&current_user.0.actor(), input)
        .await?;
    Ok(Json(result))
}

/// List stock levels
pub async fn list_stock(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<StockLevel>>> {
    let service = StockService::new(state.db, state.notifier);
    let levels = service.list_stock().await?;
    Ok(Json(levels))
}

/// List stock at or below critical level
pub async fn list_low_stock(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<StockLevel>>> {
    let service = StockService::new(state.db, state.notifier);
    let levels = service.low_stock().await?;
    Ok(Json(levels))
}

/// Ledger entries for a stock record
pub async fn list_stock_movements(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(stock_record_id): Path<Uuid>,
) -> AppResult<Json<Vec<StockMovement>>> {
    let service = StockService::new(state.db, state.notifier);
    let movements = service.movements(stock_record_id).await?;
    Ok(Json(movements))
}
