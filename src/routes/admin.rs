use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post},
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::orders::{OrderList, OrderWithItems},
    dto::products::VariantList,
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::{OrderListQuery, Pagination},
    services::{admin_service, order_service},
    state::AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct LowStockQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub threshold: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RestockRequest {
    pub delta: i32,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_all_orders))
        .route("/orders/{id}", get(get_order_admin))
        .route("/orders/{id}", delete(hard_delete_order))
        .route("/orders/{id}/cancel", post(cancel_order_admin))
        .route("/orders/{id}/hide", post(hide_order))
        .route("/variants/low-stock", get(list_low_stock))
        .route("/variants/{id}/restock", post(restock_variant))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by order status"),
    ),
    responses(
        (status = 200, description = "All orders not hidden by an admin", body = ApiResponse<OrderList>),
        (status = 403, description = "Admin only")
    ),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let response = admin_service::list_all_orders(&state, &user, query).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}",
    responses(
        (status = 200, description = "Order with its items, deletion flags included", body = ApiResponse<OrderWithItems>),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Not found")
    ),
    tag = "Admin"
)]
pub async fn get_order_admin(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let response = admin_service::get_order_admin(&state, &user, id).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/admin/orders/{id}/cancel",
    responses(
        (status = 200, description = "Order cancelled, stock released", body = ApiResponse<OrderWithItems>),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Order already cancelled")
    ),
    tag = "Admin"
)]
pub async fn cancel_order_admin(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    crate::middleware::auth::ensure_admin(&user)?;
    let response = order_service::cancel_order(&state, &user, id).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/admin/orders/{id}/hide",
    responses(
        (status = 200, description = "Cancelled order hidden from admin listings"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Order must be cancelled first")
    ),
    tag = "Admin"
)]
pub async fn hide_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let response = admin_service::hide_order(&state, &user, id).await?;
    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/api/admin/orders/{id}",
    responses(
        (status = 200, description = "Order erased; reserved stock was released first"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Not found")
    ),
    tag = "Admin"
)]
pub async fn hard_delete_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let response = admin_service::hard_delete_order(&state, &user, id).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/admin/variants/low-stock",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("threshold" = Option<i32>, Query, description = "Stock threshold, default 5"),
    ),
    responses(
        (status = 200, description = "Variants at or below the threshold", body = ApiResponse<VariantList>),
        (status = 403, description = "Admin only")
    ),
    tag = "Admin"
)]
pub async fn list_low_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<LowStockQuery>,
) -> AppResult<Json<ApiResponse<VariantList>>> {
    let response = admin_service::list_low_stock(&state, &user, query).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/admin/variants/{id}/restock",
    request_body = RestockRequest,
    responses(
        (status = 200, description = "Stock adjusted through the ledger"),
        (status = 400, description = "Adjustment would make stock negative"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Not found")
    ),
    tag = "Admin"
)]
pub async fn restock_variant(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RestockRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let response = admin_service::restock_variant(&state, &user, id, payload).await?;
    Ok(Json(response))
}
