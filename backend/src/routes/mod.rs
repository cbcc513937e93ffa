//! Route definitions for the restaurant operations API

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::{
    handlers,
    middleware::{auth_middleware, require_admin},
    AppState,
};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - unit conversions
        .nest("/conversions", conversion_routes(state.clone()))
        // Protected routes - recipe catalog
        .nest("/recipes", recipe_routes(state.clone()))
        // Protected routes - direct deductions (admin)
        .nest("/deductions", deduction_routes(state.clone()))
        // Protected routes - production runs and approvals
        .nest("/productions", production_routes(state.clone()))
        // Protected routes - purchasing and receiving
        .nest("/purchase-orders", purchase_order_routes(state.clone()))
        // Protected routes - stock ledger
        .nest("/stock", stock_routes(state.clone()))
        // Protected routes - menu servings
        .nest("/menu-items", menu_item_routes(state.clone()))
        // Protected routes - orders
        .nest("/orders", order_routes(state))
}

/// Authenticate every route of `router`
fn protected(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Authenticate, then require the admin role
fn admin_only(router: Router<AppState>, state: AppState) -> Router<AppState> {
    protected(router.route_layer(middleware::from_fn(require_admin)), state)
}

/// Unit conversion routes
fn conversion_routes(state: AppState) -> Router<AppState> {
    let read = Router::new().route("/resolve", get(handlers::resolve_unit));
    let write = Router::new().route("/", post(handlers::create_conversion));

    protected(read, state.clone()).merge(admin_only(write, state))
}

/// Recipe routes; writes are admin-checked by the service
fn recipe_routes(state: AppState) -> Router<AppState> {
    protected(
        Router::new()
            .route(
                "/:menu_maintenance_id",
                get(handlers::list_recipe).put(handlers::upsert_recipe),
            )
            .route(
                "/:menu_maintenance_id/:raw_material_id",
                delete(handlers::delete_recipe_line),
            ),
        state,
    )
}

/// Direct deduction routes (admin)
fn deduction_routes(state: AppState) -> Router<AppState> {
    admin_only(
        Router::new().route("/", post(handlers::deduct_for_production)),
        state,
    )
}

/// Production routes
fn production_routes(state: AppState) -> Router<AppState> {
    let runs = Router::new()
        .route("/", post(handlers::create_production))
        .route("/pending", get(handlers::list_pending_productions))
        .route(
            "/:production_id",
            get(handlers::get_production)
                .put(handlers::update_production)
                .delete(handlers::delete_production),
        );
    let approvals = Router::new().route(
        "/:production_id/approve",
        post(handlers::approve_production),
    );

    protected(runs, state.clone()).merge(admin_only(approvals, state))
}

/// Purchase order routes
fn purchase_order_routes(state: AppState) -> Router<AppState> {
    protected(
        Router::new()
            .route("/", post(handlers::create_purchase_order))
            .route("/:purchase_order_id", get(handlers::get_purchase_order))
            .route(
                "/:purchase_order_id/receive",
                post(handlers::receive_purchase_order),
            ),
        state,
    )
}

/// Stock routes
fn stock_routes(state: AppState) -> Router<AppState> {
    protected(
        Router::new()
            .route("/", get(handlers::list_stock))
            .route("/low", get(handlers::list_low_stock))
            .route("/:stock_record_id/movements", get(handlers::list_stock_movements)),
        state,
    )
}

/// Menu servings routes; adjustments are admin-checked by the service
fn menu_item_routes(state: AppState) -> Router<AppState> {
    protected(
        Router::new().route(
            "/:menu_item_id/servings",
            get(handlers::check_servings).post(handlers::adjust_servings),
        ),
        state,
    )
}

/// Order routes
fn order_routes(state: AppState) -> Router<AppState> {
    protected(
        Router::new()
            .route("/", post(handlers::place_order))
            .route(
                "/:order_id",
                get(handlers::get_order).delete(handlers::delete_order),
            )
            .route("/:order_id/status", put(handlers::update_order_status))
            .route("/:order_id/cancel", post(handlers::cancel_order)),
        state,
    )
}
