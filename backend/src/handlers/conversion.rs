//! HTTP handlers for unit conversion endpoints

use axum::{
    extract::{Query, State},
    Json,
};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{ResolvedQuantity, UnitConversion};
use crate::services::conversion::{ConversionService, CreateConversionInput, ResolveQuery};
use crate::AppState;

/// Resolve a quantity in any known unit to the material's base unit
pub async fn resolve_unit(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ResolveQuery>,
) -> AppResult<Json<ResolvedQuantity>> {
    let service = ConversionService::new(state.db);
    let resolved = service.resolve_unit(query).await?;
    Ok(Json(resolved))
}

/// Create a unit conversion
pub async fn create_conversion(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateConversionInput>,
) -> AppResult<Json<UnitConversion>> {
    let service = ConversionService::new(state.db);
    let conversion = service
        .create_conversion(&current_user.0.actor(), input)
        .await?;
    Ok(Json(conversion))
}
