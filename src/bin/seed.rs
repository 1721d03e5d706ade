use marketplace_api::{
    config::AppConfig,
    db,
    models::{ProductStatus, Role},
    services::auth_service::hash_password,
};
use serde_json::json;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = db::connect(&config.database_url).await?.pool;
    db::migrate(&pool).await?;

    let support_id =
        ensure_user(&pool, "Customer Service", "support@example.com", "support123", Role::Admin).await?;
    let supplier_id =
        ensure_user(&pool, "Demo Supplier", "supplier@example.com", "supplier123", Role::Supplier).await?;
    let customer_id =
        ensure_user(&pool, "Demo Customer", "customer@example.com", "customer123", Role::Customer).await?;
    ensure_user(&pool, "Demo Courier", "delivery@example.com", "delivery123", Role::Delivery).await?;
    seed_products(&pool, supplier_id).await?;

    println!(
        "Seed completed. Support ID: {support_id}, Supplier ID: {supplier_id}, Customer ID: {customer_id}"
    );
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(role.as_str())
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={})", role.as_str());
    Ok(id)
}

async fn seed_products(pool: &sqlx::PgPool, supplier_id: Uuid) -> anyhow::Result<()> {
    let products = [
        ("Leather Tote", "Bags", "Handmade", &[("Color", "Brown", 450000, 12), ("Color", "Black", 450000, 8)][..]),
        ("Cotton Scarf", "Apparel", "Weavers Co", &[("Size", "Standard", 90000, 40)][..]),
        ("Coffee Set", "Kitchen", "Jebena", &[("Pieces", "6", 320000, 15), ("Pieces", "12", 560000, 5)][..]),
    ];

    for (name, category, brand, variants) in products {
        let existing: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM products WHERE supplier_id = $1 AND name = $2")
                .bind(supplier_id)
                .bind(name)
                .fetch_optional(pool)
                .await?;
        if existing.is_some() {
            continue;
        }

        let product_id = Uuid::new_v4();
        let attribute = variants.first().map(|v| v.0).unwrap_or("Option");
        sqlx::query(
            r#"
            INSERT INTO products (id, supplier_id, name, description, category, brand, images, attributes, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(product_id)
        .bind(supplier_id)
        .bind(name)
        .bind(format!("{name} from the demo supplier"))
        .bind(category)
        .bind(brand)
        .bind(vec![format!("https://picsum.photos/seed/{product_id}/600")])
        .bind(vec![attribute.to_string()])
        .bind(ProductStatus::Verified.as_str())
        .execute(pool)
        .await?;

        for (key, value, price, stock) in variants.iter().copied() {
            sqlx::query(
                r#"
                INSERT INTO product_variants (id, product_id, attribute_values, price, stock, image_url)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(product_id)
            .bind(json!({ key: value }))
            .bind(price as i64)
            .bind(stock as i32)
            .bind(format!("https://picsum.photos/seed/{product_id}-{value}/300"))
            .execute(pool)
            .await?;
        }
    }

    println!("Seeded products");
    Ok(())
}
