use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Product, ProductVariant};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub variants: Vec<CreateVariantRequest>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateVariantRequest {
    pub size: String,
    pub color: String,
    pub stock: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<Product>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductWithVariants {
    pub product: Product,
    pub variants: Vec<ProductVariant>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VariantList {
    pub items: Vec<ProductVariant>,
}
