//! HTTP handlers for purchase order endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::PurchaseOrder;
use crate::services::purchasing::{
    CreatePurchaseOrderInput, PurchasingService, ReceiveInput, ReceivingResult,
};
use crate::AppState;

/// Create a purchase order
pub async fn create_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreatePurchaseOrderInput>,
) -> AppResult<(StatusCode, Json<PurchaseOrder>)> {
    let service = PurchasingService::new(state.db);
    let purchase_order = service
        .create_purchase_order(&current_user.0.actor(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(purchase_order)))
}

/// Get a purchase order
pub async fn get_purchase_order(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(purchase_order_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrder>> {
    let service = PurchasingService::new(state.db);
    let purchase_order = service.get_purchase_order(purchase_order_id).await?;
    Ok(Json(purchase_order))
}

/// Receive a delivery into stock
pub async fn receive_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(purchase_order_id): Path<Uuid>,
    Json(input): Json<ReceiveInput>,
) -> AppResult<Json<ReceivingResult>> {
    let service = PurchasingService::new(state.db);
    let result = service
        .receive(&current_user.0.actor(), purchase_order_id, input)
        .await?;
    Ok(Json(result))
}
