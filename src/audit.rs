use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

/// Everything the storefront records in its audit trail. A closed set so a
/// typo cannot silently create a new action name.
#[derive(Debug, Clone, Copy)]
pub enum AuditAction {
    Checkout,
    PaymentCaptured,
    OrderCancelled,
    OrderDeleted,
    OrderHidden,
    OrderHardDeleted,
    CartUpdate,
    CartRemove,
    InventoryAdjust,
    ProductCreate,
    ProductUpdate,
    ProductDelete,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Checkout => "checkout",
            AuditAction::PaymentCaptured => "payment_captured",
            AuditAction::OrderCancelled => "order_cancelled",
            AuditAction::OrderDeleted => "order_deleted",
            AuditAction::OrderHidden => "order_hidden",
            AuditAction::OrderHardDeleted => "order_hard_deleted",
            AuditAction::CartUpdate => "cart_update",
            AuditAction::CartRemove => "cart_remove",
            AuditAction::InventoryAdjust => "inventory_adjust",
            AuditAction::ProductCreate => "product_create",
            AuditAction::ProductUpdate => "product_update",
            AuditAction::ProductDelete => "product_delete",
        }
    }
}

pub async fn log_audit(
    pool: &DbPool,
    user_id: Option<Uuid>,
    action: AuditAction,
    resource: Option<&str>,
    metadata: Option<Value>,
) -> AppResult<()> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(action.as_str())
    .bind(resource)
    .bind(metadata)
    .execute(pool)
    .await?;

    Ok(())
}
