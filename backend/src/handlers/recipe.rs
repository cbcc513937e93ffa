//! HTTP handlers for recipe endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::RecipeLine;
use crate::services::recipe::{RecipeService, UpsertRecipeInput};
use crate::AppState;

/// List a menu's recipe
pub async fn list_recipe(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(menu_maintenance_id): Path<Uuid>,
) -> AppResult<Json<Vec<RecipeLine>>> {
    let service = RecipeService::new(state.db);
    let lines = service.list_recipe(menu_maintenance_id).await?;
    Ok(Json(lines))
}

/// Insert or update recipe lines
pub async fn upsert_recipe(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(menu_maintenance_id): Path<Uuid>,
    Json(input): Json<UpsertRecipeInput>,
) -> AppResult<Json<Vec<RecipeLine>>> {
    let service = RecipeService::new(state.db);
    let lines = service
        .upsert_lines(&current_user.0.actor(), menu_maintenance_id, input)
        .await?;
    Ok(Json(lines))
}

/// Remove an ingredient from a recipe
pub async fn delete_recipe_line(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((menu_maintenance_id, raw_material_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let service = RecipeService::new(state.db);
    service
        .delete_line(&current_user.0.actor(), menu_maintenance_id, raw_material_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
