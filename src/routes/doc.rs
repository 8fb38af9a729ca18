use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{AddToCartRequest, CartItemDto, CartList, UpdateCartItemRequest},
        orders::{CapturePaymentRequest, OrderList, OrderWithItems},
        products::{
            CreateProductRequest, CreateVariantRequest, ProductList, ProductWithVariants,
            UpdateProductRequest, VariantList,
        },
    },
    models::{CartItem, Order, OrderItem, OrderStatus, Product, ProductVariant, User},
    response::{ApiResponse, Meta},
    routes::{admin, cart, health, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        cart::cart_list,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        orders::capture_payment,
        orders::cancel_order,
        orders::delete_order,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::cancel_order_admin,
        admin::hide_order,
        admin::hard_delete_order,
        admin::list_low_stock,
        admin::restock_variant
    ),
    components(
        schemas(
            User,
            Product,
            ProductVariant,
            CartItem,
            Order,
            OrderItem,
            OrderStatus,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartItemDto,
            CartList,
            CapturePaymentRequest,
            OrderList,
            OrderWithItems,
            CreateProductRequest,
            CreateVariantRequest,
            UpdateProductRequest,
            ProductList,
            ProductWithVariants,
            VariantList,
            admin::LowStockQuery,
            admin::RestockRequest,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<ProductWithVariants>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<CartList>,
            ApiResponse<VariantList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order lifecycle endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
