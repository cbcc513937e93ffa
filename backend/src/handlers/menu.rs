//! HTTP handlers for menu servings endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{MenuItem, ServingsCheck};
use crate::services::menu::{AdjustServingsInput, MenuService, ServingsQuery};
use crate::AppState;

/// Check whether a quantity can be sold
pub async fn check_servings(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(menu_item_id): Path<Uuid>,
    Query(query): Query<ServingsQuery>,
) -> AppResult<Json<ServingsCheck>> {
    let service = MenuService::new(state.db);
    let check = service
        .check_servings_available(menu_item_id, query.quantity)
        .await?;
    Ok(Json(check))
}

/// Manually adjust servings
pub async fn adjust_servings(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(menu_item_id): Path<Uuid>,
    Json(input): Json<AdjustServingsInput>,
) -> AppResult<Json<MenuItem>> {
    let service = MenuService::new(state.db);
    let item = service
        .adjust_servings(&current_user.0.actor(), menu_item_id, input)
        .await?;
    Ok(Json(item))
}
