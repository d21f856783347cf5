use rust_decimal::Decimal;
use sqlx::PgPool;
use storefront_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    models::Role,
    services::auth_service::hash_password,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url, 2).await?;
    run_migrations(&pool).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "admin123", Role::Admin).await?;
    let user_id = ensure_user(&pool, "user@example.com", "user123", Role::User).await?;
    seed_catalog(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &PgPool,
    email: &str,
    password: &str,
    role: Role,
) -> anyhow::Result<i64> {
    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    // Existing accounts keep their password; only the role is reasserted.
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO users (email, password_hash, first_name, last_name, city, address, zip, role)
        VALUES ($1, $2, 'Demo', $3, 'Sarajevo', 'Zmaja od Bosne 8', '71000', $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(email)
    .bind(password_hash)
    .bind(role.as_str())
    .bind(role.as_str())
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(id)
}

async fn ensure_category(pool: &PgPool, name: &str) -> anyhow::Result<i64> {
    sqlx::query("INSERT INTO categories (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
        .bind(name)
        .execute(pool)
        .await?;
    let (id,): (i64,) = sqlx::query_as("SELECT id FROM categories WHERE name = $1")
        .bind(name)
        .fetch_one(pool)
        .await?;
    Ok(id)
}

async fn seed_catalog(pool: &PgPool) -> anyhow::Result<()> {
    let products = [
        ("Wheels", "BBS RS", "Three-piece forged wheel, 17 inch", Decimal::new(250000, 2), 10),
        ("Wheels", "OZ Futura", "Split-rim classic, 18 inch", Decimal::new(180000, 2), 8),
        ("Suspension", "KW Variant 3", "Adjustable coilover kit", Decimal::new(210000, 2), 5),
        ("Exhaust", "Akrapovic Slip-On", "Titanium slip-on exhaust", Decimal::new(149999, 2), 4),
        ("Accessories", "Lug Nut Set", "Twenty forged lug nuts", Decimal::new(4999, 2), 100),
    ];

    for (category, name, description, price, stock) in products {
        let category_id = ensure_category(pool, category).await?;
        sqlx::query(
            r#"
            INSERT INTO products (name, description, category_id, price, stock_quantity)
            SELECT $1, $2, $3, $4, $5
            WHERE NOT EXISTS (SELECT 1 FROM products WHERE name = $1)
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(category_id)
        .bind(price)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    println!("Seeded catalog");
    Ok(())
}
