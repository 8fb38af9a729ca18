use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    dto::orders::{CapturePaymentRequest, OrderList, OrderWithItems},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/checkout", post(checkout))
        .route("/{id}", get(get_order))
        .route("/{id}", delete(delete_order))
        .route("/{id}/capture", post(capture_payment))
        .route("/{id}/cancel", post(cancel_order))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by order status"),
    ),
    responses(
        (status = 200, description = "The caller's order history", body = ApiResponse<OrderList>)
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let response = order_service::list_orders(&state, &user, query).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/orders/checkout",
    responses(
        (status = 200, description = "Pending order created, stock reserved", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Cart is empty"),
        (status = 409, description = "Insufficient stock for a cart line")
    ),
    tag = "Orders"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let response = order_service::checkout(&state, &user).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    responses(
        (status = 200, description = "Order with its items", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Not found")
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let response = order_service::get_order(&state, &user, id).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/capture",
    request_body = CapturePaymentRequest,
    responses(
        (status = 200, description = "Order confirmed (or already was)", body = ApiResponse<OrderWithItems>),
        (status = 402, description = "Payment declined, order stays pending"),
        (status = 409, description = "Order is cancelled or a concurrent update won"),
        (status = 503, description = "Gateway unavailable, retry later")
    ),
    tag = "Orders"
)]
pub async fn capture_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CapturePaymentRequest>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let response = order_service::capture_payment(&state, &user, id, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/cancel",
    responses(
        (status = 200, description = "Order cancelled, stock released", body = ApiResponse<OrderWithItems>),
        (status = 409, description = "Order already cancelled")
    ),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let response = order_service::cancel_order(&state, &user, id).await?;
    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/api/orders/{id}",
    responses(
        (status = 200, description = "Order hidden from the caller's history"),
        (status = 409, description = "Order must be cancelled first")
    ),
    tag = "Orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let response = order_service::delete_order(&state, &user, id).await?;
    Ok(Json(response))
}
