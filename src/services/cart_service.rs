use chrono::DateTime;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::{log_audit, AuditAction},
    db::DbPool,
    dto::cart::{AddToCartRequest, CartItemDto, CartList, UpdateCartItemRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::CartItem,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
};

#[derive(FromRow)]
struct CartWithVariantRow {
    cart_id: Uuid,
    quantity: i32,
    product_id: Uuid,
    name: String,
    price: i64,
    variant_id: Uuid,
    size: String,
    color: String,
    stock: i32,
    created_at: DateTime<chrono::Utc>,
}

/// Cart lines are a wish list, not a hold: nothing here touches stock.
/// Reservation happens at checkout.
pub async fn list_cart(
    pool: &DbPool,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<CartList>> {
    let (page, limit, offset) = pagination.normalize();
    let rows = sqlx::query_as::<_, CartWithVariantRow>(
        r#"
        SELECT ci.id AS cart_id, ci.quantity, ci.created_at,
               p.id AS product_id, p.name, p.price,
               v.id AS variant_id, v.size, v.color, v.stock
        FROM cart_items ci
        JOIN product_variants v ON v.id = ci.variant_id
        JOIN products p ON p.id = ci.product_id
        WHERE ci.user_id = $1
        ORDER BY ci.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cart_items WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(pool)
        .await?;

    let items = rows
        .into_iter()
        .map(|row| CartItemDto {
            id: row.cart_id,
            product_id: row.product_id,
            product_name: row.name,
            unit_price: row.price,
            variant_id: row.variant_id,
            size: row.size,
            color: row.color,
            in_stock: row.stock,
            quantity: row.quantity,
            created_at: row.created_at,
        })
        .collect();

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("OK", CartList { items }, Some(meta)))
}

/// Upsert a line for the given (product, size, color). An existing line's
/// quantity is replaced, not incremented.
pub async fn add_to_cart(
    pool: &DbPool,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let variant: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM product_variants WHERE product_id = $1 AND size = $2 AND color = $3",
    )
    .bind(payload.product_id)
    .bind(&payload.size)
    .bind(&payload.color)
    .fetch_optional(pool)
    .await?;
    let Some((variant_id,)) = variant else {
        return Err(AppError::NotFound);
    };

    let cart_item = sqlx::query_as::<_, CartItem>(
        r#"
        INSERT INTO cart_items (user_id, product_id, variant_id, quantity)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, variant_id) DO UPDATE SET quantity = EXCLUDED.quantity
        RETURNING *
        "#,
    )
    .bind(user.user_id)
    .bind(payload.product_id)
    .bind(variant_id)
    .bind(payload.quantity)
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        AuditAction::CartUpdate,
        Some("cart_items"),
        Some(serde_json::json!({ "variant_id": variant_id, "quantity": payload.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("OK", cart_item, None))
}

/// Replace the quantity of an existing line. Unlike add, a missing line is an
/// error rather than an insert.
pub async fn update_cart_item(
    pool: &DbPool,
    user: &AuthUser,
    variant_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let cart_item: Option<CartItem> = sqlx::query_as(
        r#"
        UPDATE cart_items
        SET quantity = $3
        WHERE user_id = $1 AND variant_id = $2
        RETURNING *
        "#,
    )
    .bind(user.user_id)
    .bind(variant_id)
    .bind(payload.quantity)
    .fetch_optional(pool)
    .await?;
    let cart_item = cart_item.ok_or(AppError::NotFound)?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        AuditAction::CartUpdate,
        Some("cart_items"),
        Some(serde_json::json!({ "variant_id": variant_id, "quantity": payload.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("OK", cart_item, None))
}

pub async fn remove_from_cart(
    pool: &DbPool,
    user: &AuthUser,
    variant_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM cart_items WHERE variant_id = $1 AND user_id = $2")
        .bind(variant_id)
        .bind(user.user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        AuditAction::CartRemove,
        Some("cart_items"),
        Some(serde_json::json!({ "variant_id": variant_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
