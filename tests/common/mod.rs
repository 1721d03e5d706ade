#![allow(dead_code)]

use std::collections::BTreeMap;

use marketplace_api::{
    config::{AppConfig, MediaConfig, PaymentConfig},
    connectivity::Connectivity,
    db::{self, Databases},
    domain::submission::{MediaFile, ProductForm, ProductSubmission, VariantForm, VariantSubmission},
    dto::auth::RegisterRequest,
    media::MediaClient,
    middleware::auth::AuthUser,
    models::Role,
    services::auth_service::{hash_password, register_user},
    state::AppState,
};
use secrecy::SecretString;
use uuid::Uuid;

pub fn database_url() -> Option<String> {
    match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
        Ok(url) => Some(url),
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests.");
            None
        }
    }
}

pub fn test_config(database_url: &str, media_url: &str) -> AppConfig {
    AppConfig {
        database_url: database_url.to_string(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: SecretString::from("integration-secret".to_string()),
        jwt_ttl_hours: 1,
        max_upload_bytes: 1024 * 1024,
        payment: PaymentConfig {
            checkout_url: "https://checkout.example.com/hosted".into(),
            public_key: "PUBK_TEST".into(),
            return_base_url: "https://shop.example.com/api/payments".into(),
            currency: "ETB".into(),
            session_ttl_minutes: 15,
        },
        media: MediaConfig {
            base_url: media_url.to_string(),
            api_key: SecretString::from("media-key".to_string()),
            timeout_secs: 5,
        },
    }
}

pub async fn setup_state(database_url: &str, media_url: &str) -> anyhow::Result<AppState> {
    let config = test_config(database_url, media_url);
    let Databases { pool, orm } = db::connect(database_url).await?;
    db::migrate(&pool).await?;
    let media = MediaClient::new(&config.media)?;
    Ok(AppState::new(pool, orm, config, media, Connectivity::fixed(true)))
}

/// Registers a fresh account; emails are unique per run so tests can share a database.
pub async fn register(state: &AppState, role: Role) -> anyhow::Result<AuthUser> {
    let email = format!("{}-{}@example.com", role.as_str(), Uuid::new_v4().simple());
    let resp = register_user(
        state,
        RegisterRequest {
            name: format!("Test {}", role.as_str()),
            email: email.clone(),
            password: "secret123".into(),
            phone: Some("+251911000000".into()),
            role: Some(role),
        },
    )
    .await?;
    let profile = resp.data.expect("profile");
    Ok(AuthUser {
        user_id: profile.id,
        role: profile.role,
        email: profile.email,
    })
}

/// Support staff cannot self-register.
pub async fn create_admin(state: &AppState) -> anyhow::Result<AuthUser> {
    let email = format!("support-{}@example.com", Uuid::new_v4().simple());
    let (id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO users (id, name, email, password_hash, role) VALUES ($1, $2, $3, $4, 'admin') RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind("Support")
    .bind(&email)
    .bind(hash_password("secret123")?)
    .fetch_one(&state.pool)
    .await?;
    Ok(AuthUser {
        user_id: id,
        role: Role::Admin,
        email,
    })
}

pub fn image(name: &str) -> MediaFile {
    MediaFile {
        file_name: name.to_string(),
        content_type: "image/png".into(),
        bytes: vec![0x89, b'P', b'N', b'G', 1, 2, 3],
    }
}

/// A one-attribute product with a variant per color.
pub fn submission(name: &str, colors: &[(&str, i64, i64)]) -> ProductSubmission {
    let forms: Vec<VariantForm> = colors
        .iter()
        .map(|(color, price, stock)| VariantForm {
            values: BTreeMap::from([("Color".to_string(), color.to_string())]),
            price: Some(*price),
            stock: Some(*stock),
        })
        .collect();
    let variants = forms
        .iter()
        .enumerate()
        .map(|(i, form)| VariantSubmission {
            values: form.values.clone(),
            price: form.price,
            stock: form.stock,
            image: Some(image(&format!("variant-{i}.png"))),
        })
        .collect();

    ProductSubmission {
        form: ProductForm {
            name: name.to_string(),
            description: Some("Integration product".into()),
            category: "Bags".into(),
            brand: None,
            attributes: vec!["Color".into()],
            variants: forms,
        },
        images: vec![image("cover.png")],
        video: None,
        variants,
    }
}
