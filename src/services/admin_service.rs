use chrono::Utc;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::{log_audit, AuditAction},
    dto::orders::{OrderList, OrderWithItems},
    dto::products::VariantList,
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{Column as OrderCol, Entity as Orders},
        product_variants::{Column as VariantCol, Entity as Variants},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::OrderStatus,
    response::{ApiResponse, Meta},
    routes::admin::{LowStockQuery, RestockRequest},
    routes::params::{OrderListQuery, SortOrder},
    services::inventory_service,
    services::order_service::{
        order_from_entity, order_item_from_entity, parse_status_filter, status_of, stock_lines,
    },
    services::product_service::variant_from_entity,
    state::AppState,
};

/// Admin order listing. Orders hidden by a user still show up here; orders an
/// admin has hidden do not.
pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all().add(OrderCol::DeletedByAdmin.eq(false));
    if let Some(status) = parse_status_filter(query.status.as_deref())? {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let mut finder = Orders::find().filter(condition);

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

/// Admin detail view. Deliberately ignores both deletion flags: soft-deleted
/// records stay queryable until a hard delete erases them.
pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Order found",
        OrderWithItems {
            order: order_from_entity(order)?,
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Hide a cancelled order from admin listings. The record is kept; only the
/// hard delete below erases anything.
pub async fn hide_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let status = status_of(&order)?;
    // Same precondition as the user-side delete: an order still holding stock
    // stays visible.
    if status.holds_stock() {
        return Err(AppError::InvalidTransition {
            status: status.as_str(),
            action: "hide",
        });
    }

    let result = Orders::update_many()
        .col_expr(OrderCol::DeletedByAdmin, Expr::value(true))
        .col_expr(OrderCol::UpdatedAt, Expr::value(Utc::now()))
        .filter(OrderCol::Id.eq(order.id))
        .filter(OrderCol::Status.eq(OrderStatus::Cancelled.as_str()))
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::StorageConflict);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::OrderHidden,
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order hidden",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Permanently erase an order, from any status. If the order still holds
/// reserved stock (pending or confirmed), the stock is released in the same
/// transaction before the rows go away, so an override delete cannot leak
/// inventory.
pub async fn hard_delete_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let status = status_of(&order)?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&txn)
        .await?;

    if status.holds_stock() {
        inventory_service::release(&txn, &stock_lines(&items)).await?;
    }

    OrderItems::delete_many()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .exec(&txn)
        .await?;
    Orders::delete_by_id(order.id).exec(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::OrderHardDeleted,
        Some("orders"),
        Some(serde_json::json!({ "order_id": id, "status": status.as_str() })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<VariantList>> {
    ensure_admin(user)?;
    let threshold = query.threshold.unwrap_or(5);
    let (page, limit, offset) = query.pagination.normalize();

    let finder = Variants::find()
        .filter(VariantCol::Stock.lte(threshold))
        .order_by_asc(VariantCol::Stock);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(variant_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Low stock",
        VariantList { items },
        Some(meta),
    ))
}

/// Restock (or correct) a single variant through the inventory ledger.
pub async fn restock_variant(
    state: &AppState,
    user: &AuthUser,
    variant_id: Uuid,
    payload: RestockRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    if payload.delta == 0 {
        return Err(AppError::BadRequest("delta must not be 0".into()));
    }

    let txn = state.orm.begin().await?;
    inventory_service::adjust(&txn, variant_id, payload.delta).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::InventoryAdjust,
        Some("product_variants"),
        Some(serde_json::json!({ "variant_id": variant_id, "delta": payload.delta })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Inventory updated",
        serde_json::json!({ "variant_id": variant_id }),
        Some(Meta::empty()),
    ))
}
