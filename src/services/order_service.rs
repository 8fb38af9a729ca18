use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, FromQueryResult, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::{log_audit, AuditAction},
    dto::orders::{CapturePaymentRequest, OrderList, OrderWithItems},
    entity::{
        cart_items::{self, Column as CartCol, Entity as CartItems},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
        },
        product_variants,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, OrderStatus},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::inventory_service::{self, StockLine},
    state::AppState,
};

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all()
        .add(OrderCol::UserId.eq(user.user_id))
        .add(OrderCol::DeletedByUser.eq(false));
    if let Some(status) = parse_status_filter(query.status.as_deref())? {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
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
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

/// Convert the user's cart into a pending order.
///
/// Cart snapshot, order persistence and stock reservation run in one
/// transaction: either the order exists with its stock held, or nothing
/// changed. Payment capture is deliberately a separate call so a crash here
/// never strands a charge without an order.
pub async fn checkout(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    #[derive(Debug, FromQueryResult)]
    struct CheckoutRow {
        product_id: Uuid,
        variant_id: Uuid,
        quantity: i32,
        size: String,
        color: String,
        price: i64,
    }

    let rows = CartItems::find()
        .select_only()
        .column_as(CartCol::ProductId, "product_id")
        .column_as(CartCol::VariantId, "variant_id")
        .column_as(CartCol::Quantity, "quantity")
        .column_as(product_variants::Column::Size, "size")
        .column_as(product_variants::Column::Color, "color")
        .column_as(crate::entity::products::Column::Price, "price")
        .join(JoinType::InnerJoin, cart_items::Relation::ProductVariants.def())
        .join(JoinType::InnerJoin, product_variants::Relation::Products.def())
        .filter(CartCol::UserId.eq(user.user_id))
        .lock(LockType::Update)
        .into_model::<CheckoutRow>()
        .all(&txn)
        .await?;

    if rows.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let mut total_amount: i64 = 0;
    for row in &rows {
        if row.quantity <= 0 {
            return Err(AppError::BadRequest("Cart has invalid quantity".into()));
        }
        total_amount += row.price * (row.quantity as i64);
    }

    let order_id = Uuid::new_v4();
    let order = OrderActive {
        id: Set(order_id),
        user_id: Set(user.user_id),
        total_amount: Set(total_amount),
        currency: Set(state.currency.clone()),
        status: Set(OrderStatus::Pending.as_str().into()),
        payment_capture_id: Set(None),
        deleted_by_user: Set(false),
        deleted_by_admin: Set(false),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut order_items: Vec<OrderItem> = Vec::new();
    let mut lines: Vec<StockLine> = Vec::new();

    for row in &rows {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(row.product_id),
            variant_id: Set(row.variant_id),
            size: Set(row.size.clone()),
            color: Set(row.color.clone()),
            quantity: Set(row.quantity),
            unit_price: Set(row.price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;

        lines.push(StockLine {
            product_id: item.product_id,
            variant_id: item.variant_id,
            size: item.size.clone(),
            color: item.color.clone(),
            quantity: item.quantity,
        });
        order_items.push(order_item_from_entity(item));
    }

    // All-or-nothing: a shortfall on any line aborts the transaction and the
    // order above is rolled back with it.
    inventory_service::reserve(&txn, &lines).await?;

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::Checkout,
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total_amount": total_amount })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Checkout success",
        OrderWithItems {
            order: order_from_entity(order)?,
            items: order_items,
        },
        Some(Meta::empty()),
    ))
}

/// Capture payment for a pending order and confirm it.
///
/// Calling this again after a successful capture returns the confirmed order
/// unchanged without touching the gateway. Decline and gateway outage leave
/// the order pending with its stock still reserved.
pub async fn capture_payment(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: CapturePaymentRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = find_user_order(state, user, id).await?;
    let status = status_of(&order)?;

    if status == OrderStatus::Confirmed {
        let items = load_items(state, order.id).await?;
        return Ok(ApiResponse::success(
            "Payment already captured",
            OrderWithItems {
                order: order_from_entity(order)?,
                items,
            },
            Some(Meta::empty()),
        ));
    }
    if !status.can_transition(OrderStatus::Confirmed) {
        return Err(AppError::InvalidTransition {
            status: status.as_str(),
            action: "capture payment for",
        });
    }

    let capture = state
        .gateway
        .capture(
            order.id,
            order.total_amount,
            &order.currency,
            &payload.payment_token,
        )
        .await?;

    // Optimistic guard: flip pending -> confirmed only if nobody else moved
    // the order since we read it.
    let result = Orders::update_many()
        .col_expr(
            OrderCol::Status,
            Expr::value(OrderStatus::Confirmed.as_str()),
        )
        .col_expr(OrderCol::PaymentCaptureId, Expr::value(capture.0.clone()))
        .col_expr(OrderCol::UpdatedAt, Expr::value(Utc::now()))
        .filter(OrderCol::Id.eq(order.id))
        .filter(OrderCol::Status.eq(OrderStatus::Pending.as_str()))
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::StorageConflict);
    }

    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let items = load_items(state, order.id).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::PaymentCaptured,
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "capture_id": capture.0 })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Payment captured",
        OrderWithItems {
            order: order_from_entity(order)?,
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Cancel a pending or confirmed order and give its stock back.
///
/// The status flip and the release run in one transaction, and the flip is
/// conditional on the status we read, so two concurrent cancels cannot both
/// release.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    let mut condition = Condition::all().add(OrderCol::Id.eq(id));
    if !user.is_admin() {
        condition = condition.add(OrderCol::UserId.eq(user.user_id));
    }
    let order = Orders::find()
        .filter(condition)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let status = status_of(&order)?;

    if !status.can_transition(OrderStatus::Cancelled) {
        return Err(AppError::InvalidTransition {
            status: status.as_str(),
            action: "cancel",
        });
    }

    let result = Orders::update_many()
        .col_expr(
            OrderCol::Status,
            Expr::value(OrderStatus::Cancelled.as_str()),
        )
        .col_expr(OrderCol::UpdatedAt, Expr::value(Utc::now()))
        .filter(OrderCol::Id.eq(order.id))
        .filter(OrderCol::Status.eq(status.as_str()))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::StorageConflict);
    }

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&txn)
        .await?;
    inventory_service::release(&txn, &stock_lines(&items)).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::OrderCancelled,
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let items = load_items(state, order.id).await?;
    Ok(ApiResponse::success(
        "Order cancelled",
        OrderWithItems {
            order: order_from_entity(order)?,
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Hide a cancelled order from the user's own history. The record stays in
/// storage and remains visible to admin views.
pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let order = find_user_order(state, user, id).await?;
    let status = status_of(&order)?;

    // Only once the order no longer holds stock (i.e. it is cancelled) may it
    // leave the user's history.
    if status.holds_stock() {
        return Err(AppError::InvalidTransition {
            status: status.as_str(),
            action: "delete",
        });
    }

    let result = Orders::update_many()
        .col_expr(OrderCol::DeletedByUser, Expr::value(true))
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
        AuditAction::OrderDeleted,
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order removed from history",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = find_user_order(state, user, id).await?;
    let items = load_items(state, order.id).await?;

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order)?,
            items,
        },
        Some(Meta::empty()),
    ))
}

async fn find_user_order(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<OrderModel> {
    Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id))
                .add(OrderCol::DeletedByUser.eq(false)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

async fn load_items(state: &AppState, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect())
}

pub(crate) fn parse_status_filter(status: Option<&str>) -> AppResult<Option<OrderStatus>> {
    match status.filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => OrderStatus::parse(raw)
            .map(Some)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown order status '{raw}'"))),
    }
}

pub(crate) fn status_of(model: &OrderModel) -> AppResult<OrderStatus> {
    OrderStatus::parse(&model.status).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "order {} has unknown status {:?}",
            model.id,
            model.status
        ))
    })
}

pub(crate) fn stock_lines(items: &[OrderItemModel]) -> Vec<StockLine> {
    items
        .iter()
        .map(|item| StockLine {
            product_id: item.product_id,
            variant_id: item.variant_id,
            size: item.size.clone(),
            color: item.color.clone(),
            quantity: item.quantity,
        })
        .collect()
}

pub(crate) fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    let status = status_of(&model)?;
    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        total_amount: model.total_amount,
        currency: model.currency,
        status,
        payment_capture_id: model.payment_capture_id,
        deleted_by_user: model.deleted_by_user,
        deleted_by_admin: model.deleted_by_admin,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

pub(crate) fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        variant_id: model.variant_id,
        size: model.size,
        color: model.color,
        quantity: model.quantity,
        unit_price: model.unit_price,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
