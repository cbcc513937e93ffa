//! HTTP handlers for order endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::Order;
use crate::services::order::{OrderService, PlaceOrderInput, UpdateOrderStatusInput};
use crate::AppState;

/// Place an order
pub async fn place_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<PlaceOrderInput>,
) -> AppResult<(StatusCode, Json<Order>)> {
    let service = OrderService::new(state.db);
    let order = service.place_order(&current_user.0.actor(), input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Get an order
pub async fn get_order(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    let service = OrderService::new(state.db);
    let order = service.get_order(order_id).await?;
    Ok(Json(order))
}

/// Change an order's status
pub async fn update_order_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdateOrderStatusInput>,
) -> AppResult<Json<Order>> {
    let service = OrderService::new(state.db);
    let order = service
        .update_status(&current_user.0.actor(), order_id, input.status)
        .await?;
    Ok(Json(order))
}

/// Cancel an order
pub async fn cancel_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    let service = OrderService::new(state.db);
    let order = service.cancel_order(&current_user.0.actor(), order_id).await?;
    Ok(Json(order))
}

/// Delete an order
pub async fn delete_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = OrderService::new(state.db);
    service.delete_order(&current_user.0.actor(), order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
