use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    /// Sum of the variants' stock, recomputed by the inventory ledger on
    /// every mutation. A display summary, never the reservation check.
    pub total_stock: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct ProductVariant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub size: String,
    pub color: String,
    pub stock: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

/// Order lifecycle. Deletion flags are orthogonal annotations on the order
/// record, not states: a cancelled order can additionally be hidden from the
/// user's or the admin's listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// The transition table. `pending -> confirmed`, `pending -> cancelled`
    /// and `confirmed -> cancelled` are the only legal moves; `cancelled` is
    /// terminal.
    pub fn can_transition(self, to: OrderStatus) -> bool {
        matches!(
            (self, to),
            (OrderStatus::Pending, OrderStatus::Confirmed)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Confirmed, OrderStatus::Cancelled)
        )
    }

    /// Whether stock reserved at checkout is still held for an order in this
    /// status. Cancellation is the only transition that releases it.
    pub fn holds_stock(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_amount: i64,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_capture_id: Option<String>,
    pub deleted_by_user: bool,
    pub deleted_by_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub size: String,
    pub color: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::OrderStatus::*;

    #[test]
    fn transition_table() {
        assert!(Pending.can_transition(Confirmed));
        assert!(Pending.can_transition(Cancelled));
        assert!(Confirmed.can_transition(Cancelled));

        assert!(!Confirmed.can_transition(Pending));
        assert!(!Cancelled.can_transition(Pending));
        assert!(!Cancelled.can_transition(Confirmed));
        assert!(!Pending.can_transition(Pending));
    }

    #[test]
    fn cancelled_is_terminal() {
        for target in [Pending, Confirmed, Cancelled] {
            assert!(!Cancelled.can_transition(target));
        }
    }

    #[test]
    fn parse_round_trips() {
        for status in [Pending, Confirmed, Cancelled] {
            assert_eq!(super::OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(super::OrderStatus::parse("shipped"), None);
    }

    #[test]
    fn stock_is_held_until_cancelled() {
        assert!(Pending.holds_stock());
        assert!(Confirmed.holds_stock());
        assert!(!Cancelled.holds_stock());
    }
}
