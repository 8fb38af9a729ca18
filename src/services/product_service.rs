use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::{log_audit, AuditAction},
    dto::products::{CreateProductRequest, ProductList, ProductWithVariants, UpdateProductRequest},
    entity::{
        product_variants::{
            ActiveModel as VariantActive, Column as VariantCol, Entity as Variants,
            Model as VariantModel,
        },
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Product, ProductVariant},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn get_product(
    state: &AppState,
    id: Uuid,
) -> AppResult<ApiResponse<ProductWithVariants>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let variants = Variants::find()
        .filter(VariantCol::ProductId.eq(id))
        .order_by_asc(VariantCol::Size)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(variant_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "OK",
        ProductWithVariants {
            product: product_from_entity(product),
            variants,
        },
        Some(Meta::empty()),
    ))
}

/// Create a product together with its variants. Initial stock arrives here;
/// every later stock change goes through the inventory ledger.
pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<ProductWithVariants>> {
    ensure_admin(user)?;
    if payload.variants.is_empty() {
        return Err(AppError::BadRequest(
            "product needs at least one variant".into(),
        ));
    }
    for variant in &payload.variants {
        if variant.stock < 0 {
            return Err(AppError::BadRequest("stock cannot be negative".into()));
        }
    }

    let txn = state.orm.begin().await?;

    let total_stock: i32 = payload.variants.iter().map(|v| v.stock).sum();
    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        description: Set(payload.description),
        price: Set(payload.price),
        total_stock: Set(total_stock),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut variants = Vec::new();
    for variant in payload.variants {
        let model = VariantActive {
            id: Set(Uuid::new_v4()),
            product_id: Set(product.id),
            size: Set(variant.size),
            color: Set(variant.color),
            stock: Set(variant.stock),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        variants.push(variant_from_entity(model));
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::ProductCreate,
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product created",
        ProductWithVariants {
            product: product_from_entity(product),
            variants,
        },
        Some(Meta::empty()),
    ))
}

/// Update catalog metadata. Stock is not accepted here; it belongs to the
/// inventory ledger.
pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;

    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    let updated = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::ProductUpdate,
        Some("products"),
        Some(serde_json::json!({ "product_id": updated.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product updated",
        product_from_entity(updated),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let result = Products::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::ProductDelete,
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub(crate) fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        name: model.name,
        description: model.description,
        price: model.price,
        total_stock: model.total_stock,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub(crate) fn variant_from_entity(model: VariantModel) -> ProductVariant {
    ProductVariant {
        id: model.id,
        product_id: model.product_id,
        size: model.size,
        color: model.color,
        stock: model.stock,
    }
}
