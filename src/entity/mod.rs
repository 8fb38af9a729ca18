pub mod audit_logs;
pub mod cart_items;
pub mod order_items;
pub mod orders;
pub mod product_variants;
pub mod products;
pub mod users;
