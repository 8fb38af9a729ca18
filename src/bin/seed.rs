use storefront_api::{config::AppConfig, db::create_pool};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "admin").await?;
    let user_id = ensure_user(&pool, "user@example.com", "user").await?;
    seed_products(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

// Accounts here exist only so seeded data has owners; credentials are issued
// by the external auth service, hence the placeholder hash.
async fn ensure_user(pool: &sqlx::PgPool, email: &str, role: &str) -> anyhow::Result<Uuid> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, role)
        VALUES ($1, $2, 'managed-externally', $3)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(role)
    .fetch_optional(pool)
    .await?;

    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let products: Vec<(&str, &str, i64, Vec<(&str, &str, i32)>)> = vec![
        (
            "Trail Hoodie",
            "Fleece-lined hoodie",
            550000,
            vec![("S", "gray", 20), ("M", "gray", 30), ("M", "red", 15)],
        ),
        (
            "Canvas Tote",
            "Everyday carry bag",
            120000,
            vec![("one-size", "natural", 100)],
        ),
        (
            "Wool Socks",
            "Hiking weight",
            50000,
            vec![("M", "blue", 80), ("L", "blue", 60), ("L", "green", 40)],
        ),
    ];

    for (name, desc, price, variants) in products {
        let total_stock: i32 = variants.iter().map(|(_, _, stock)| stock).sum();
        let product: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO products (id, name, description, price, total_stock)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(desc)
        .bind(price)
        .bind(total_stock)
        .fetch_optional(pool)
        .await?;

        let Some((product_id,)) = product else {
            continue;
        };

        for (size, color, stock) in variants {
            sqlx::query(
                r#"
                INSERT INTO product_variants (id, product_id, size, color, stock)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (product_id, size, color) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(product_id)
            .bind(size)
            .bind(color)
            .bind(stock)
            .execute(pool)
            .await?;
        }
    }

    println!("Seeded products");
    Ok(())
}
