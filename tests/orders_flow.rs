use std::sync::Arc;

use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set, Statement};
use uuid::Uuid;

use storefront_api::{
    db::{create_orm_conn, create_pool},
    dto::cart::{AddToCartRequest, UpdateCartItemRequest},
    dto::orders::CapturePaymentRequest,
    entity::{
        product_variants::{ActiveModel as VariantActive, Entity as Variants},
        products::{ActiveModel as ProductActive, Entity as Products},
        users::ActiveModel as UserActive,
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::OrderStatus,
    payment::MockGateway,
    routes::admin::RestockRequest,
    routes::params::{OrderListQuery, Pagination},
    services::{admin_service, cart_service, order_service},
    state::AppState,
};

// End-to-end lifecycle: cart -> checkout (reservation) -> capture -> cancel /
// soft delete / hard delete, with the stock ledger checked at every step.
// Single test body on purpose: the steps share one database.
#[tokio::test]
async fn order_lifecycle_and_inventory_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    let user_id = create_user(&state, "user", "user@example.com").await?;
    let admin_id = create_user(&state, "admin", "admin@example.com").await?;
    let user = AuthUser {
        user_id,
        role: "user".into(),
    };
    let admin = AuthUser {
        user_id: admin_id,
        role: "admin".into(),
    };

    // Product with two variants; (M, red) starts at stock 2.
    let product_id = create_product(&state, "Trail Hoodie", 1000).await?;
    let m_red = create_variant(&state, product_id, "M", "red", 2).await?;
    let l_blue = create_variant(&state, product_id, "L", "blue", 5).await?;
    refresh_total(&state, product_id).await?;

    // --- Checkout reserves stock, all-or-nothing ---------------------------

    cart_service::add_to_cart(
        &state.pool,
        &user,
        AddToCartRequest {
            product_id,
            size: "M".into(),
            color: "red".into(),
            quantity: 2,
        },
    )
    .await?;

    let order = order_service::checkout(&state, &user)
        .await?
        .data
        .unwrap()
        .order;
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount, 2000);
    assert_eq!(variant_stock(&state, m_red).await?, 0);
    assert_eq!(variant_stock(&state, l_blue).await?, 5);
    assert_eq!(product_total(&state, product_id).await?, 5);

    // Cart was cleared on success.
    let cart = cart_service::list_cart(&state.pool, &user, page_one()).await?;
    assert!(cart.data.unwrap().items.is_empty());

    // One more unit cannot be had; nothing changes.
    cart_service::add_to_cart(
        &state.pool,
        &user,
        AddToCartRequest {
            product_id,
            size: "M".into(),
            color: "red".into(),
            quantity: 1,
        },
    )
    .await?;
    let err = order_service::checkout(&state, &user).await.unwrap_err();
    match err {
        AppError::InsufficientStock {
            product_id: failed_product,
            available,
            requested,
            ref size,
            ref color,
        } => {
            assert_eq!(failed_product, product_id);
            assert_eq!((available, requested), (0, 1));
            assert_eq!((size.as_str(), color.as_str()), ("M", "red"));
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
    assert_eq!(variant_stock(&state, m_red).await?, 0);
    assert_eq!(product_total(&state, product_id).await?, 5);

    // The failed checkout rolled back; the cart line is still there.
    cart_service::remove_from_cart(&state.pool, &user, m_red).await?;
    let err = order_service::checkout(&state, &user).await.unwrap_err();
    assert!(matches!(err, AppError::EmptyCart));

    // --- Payment capture ---------------------------------------------------

    let err = order_service::capture_payment(
        &state,
        &user,
        order.id,
        CapturePaymentRequest {
            payment_token: "tok_declined".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::PaymentDeclined(_)));

    let err = order_service::capture_payment(
        &state,
        &user,
        order.id,
        CapturePaymentRequest {
            payment_token: "tok_offline".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::GatewayUnavailable(_)));

    // Both failures left the order pending with stock still held.
    let pending = order_service::get_order(&state, &user, order.id)
        .await?
        .data
        .unwrap()
        .order;
    assert_eq!(pending.status, OrderStatus::Pending);
    assert!(pending.payment_capture_id.is_none());
    assert_eq!(variant_stock(&state, m_red).await?, 0);

    let confirmed = order_service::capture_payment(
        &state,
        &user,
        order.id,
        CapturePaymentRequest {
            payment_token: "tok_visa".into(),
        },
    )
    .await?
    .data
    .unwrap()
    .order;
    assert_eq!(confirmed.status, OrderStatus::Confirmed);
    let capture_id = confirmed.payment_capture_id.clone().expect("capture id");
    // The order id went to the gateway as the idempotency reference, so the
    // mock's capture id is a pure function of it: a racing second capture
    // could only ever obtain this same id.
    assert_eq!(capture_id, format!("cap_{}", order.id.simple()));

    // Second capture is idempotent: same order back, no second charge.
    let again = order_service::capture_payment(
        &state,
        &user,
        order.id,
        CapturePaymentRequest {
            payment_token: "tok_visa".into(),
        },
    )
    .await?
    .data
    .unwrap()
    .order;
    assert_eq!(again.status, OrderStatus::Confirmed);
    assert_eq!(again.payment_capture_id.as_deref(), Some(capture_id.as_str()));

    // --- Cancellation releases exactly once --------------------------------

    let cancelled = order_service::cancel_order(&state, &user, order.id)
        .await?
        .data
        .unwrap()
        .order;
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(variant_stock(&state, m_red).await?, 2);
    assert_eq!(product_total(&state, product_id).await?, 7);

    let err = order_service::cancel_order(&state, &user, order.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidTransition {
            status: "cancelled",
            ..
        }
    ));
    assert_eq!(variant_stock(&state, m_red).await?, 2);

    // Capture on a cancelled order is rejected without touching the gateway.
    let err = order_service::capture_payment(
        &state,
        &user,
        order.id,
        CapturePaymentRequest {
            payment_token: "tok_visa".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidTransition {
            status: "cancelled",
            ..
        }
    ));

    // Released stock is available again.
    cart_service::add_to_cart(
        &state.pool,
        &user,
        AddToCartRequest {
            product_id,
            size: "M".into(),
            color: "red".into(),
            quantity: 1,
        },
    )
    .await?;
    let second_order = order_service::checkout(&state, &user)
        .await?
        .data
        .unwrap()
        .order;
    assert_eq!(variant_stock(&state, m_red).await?, 1);

    // --- Soft delete semantics ---------------------------------------------

    // A pending order still holds stock and cannot be hidden; the error names
    // the status it was actually in.
    let err = order_service::delete_order(&state, &user, second_order.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidTransition {
            status: "pending",
            ..
        }
    ));

    order_service::delete_order(&state, &user, order.id).await?;

    let mine = order_service::list_orders(&state, &user, all_orders_query())
        .await?
        .data
        .unwrap()
        .items;
    assert!(mine.iter().all(|o| o.id != order.id));
    assert!(mine.iter().any(|o| o.id == second_order.id));
    let err = order_service::get_order(&state, &user, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    // Admin still sees the user-hidden order.
    let all = admin_service::list_all_orders(&state, &admin, all_orders_query())
        .await?
        .data
        .unwrap()
        .items;
    assert!(all.iter().any(|o| o.id == order.id));

    // Admin hide removes it from admin listings but keeps the record.
    admin_service::hide_order(&state, &admin, order.id).await?;
    let all = admin_service::list_all_orders(&state, &admin, all_orders_query())
        .await?
        .data
        .unwrap()
        .items;
    assert!(all.iter().all(|o| o.id != order.id));
    let hidden = admin_service::get_order_admin(&state, &admin, order.id)
        .await?
        .data
        .unwrap()
        .order;
    assert!(hidden.deleted_by_user && hidden.deleted_by_admin);

    // --- Hard delete releases reserved stock before erasing ----------------

    admin_service::hard_delete_order(&state, &admin, second_order.id).await?;
    assert_eq!(variant_stock(&state, m_red).await?, 2);
    assert_eq!(product_total(&state, product_id).await?, 7);
    let err = admin_service::get_order_admin(&state, &admin, second_order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    // --- Cart line errors and restock --------------------------------------

    // A (size, color) combination that was never stocked is a missing
    // resource, same as updating or removing an absent line.
    let err = cart_service::add_to_cart(
        &state.pool,
        &user,
        AddToCartRequest {
            product_id,
            size: "XXL".into(),
            color: "red".into(),
            quantity: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let err = cart_service::update_cart_item(
        &state.pool,
        &user,
        l_blue,
        UpdateCartItemRequest { quantity: 3 },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let err = cart_service::remove_from_cart(&state.pool, &user, l_blue)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    admin_service::restock_variant(&state, &admin, l_blue, RestockRequest { delta: 3 }).await?;
    assert_eq!(variant_stock(&state, l_blue).await?, 8);
    assert_eq!(product_total(&state, product_id).await?, 10);

    let err = admin_service::restock_variant(&state, &admin, l_blue, RestockRequest { delta: -100 })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE order_items, orders, cart_items, audit_logs, product_variants, products, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(AppState {
        pool,
        orm,
        gateway: Arc::new(MockGateway),
        currency: "usd".into(),
    })
}

async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        role: Set(role.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

async fn create_product(state: &AppState, name: &str, price: i64) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.into()),
        description: Set(None),
        price: Set(price),
        total_stock: Set(0),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(product.id)
}

async fn create_variant(
    state: &AppState,
    product_id: Uuid,
    size: &str,
    color: &str,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let variant = VariantActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        size: Set(size.into()),
        color: Set(color.into()),
        stock: Set(stock),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(variant.id)
}

async fn refresh_total(state: &AppState, product_id: Uuid) -> anyhow::Result<()> {
    state
        .orm
        .execute(Statement::from_sql_and_values(
            state.orm.get_database_backend(),
            "UPDATE products SET total_stock = (SELECT COALESCE(SUM(stock), 0) FROM product_variants WHERE product_id = $1) WHERE id = $1",
            [product_id.into()],
        ))
        .await?;
    Ok(())
}

async fn variant_stock(state: &AppState, variant_id: Uuid) -> anyhow::Result<i32> {
    let variant = Variants::find_by_id(variant_id)
        .one(&state.orm)
        .await?
        .expect("variant exists");
    Ok(variant.stock)
}

async fn product_total(state: &AppState, product_id: Uuid) -> anyhow::Result<i32> {
    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .expect("product exists");
    Ok(product.total_stock)
}

fn page_one() -> Pagination {
    Pagination {
        page: Some(1),
        per_page: Some(20),
    }
}

fn all_orders_query() -> OrderListQuery {
    OrderListQuery {
        pagination: page_one(),
        status: None,
        sort_order: None,
    }
}
