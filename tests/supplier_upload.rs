mod common;

use marketplace_api::{models::Role, services::supplier_service};
use serde_json::json;
use uuid::Uuid;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

use common::{database_url, register, setup_state, submission};

#[tokio::test]
async fn failed_variant_upload_removes_the_product() -> anyhow::Result<()> {
    let Some(database_url) = database_url() else {
        return Ok(());
    };
    let media = MockServer::start().await;
    // The cover image goes through, the variant image does not.
    Mock::given(method("POST"))
        .and(path("/product-images/upload"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "secure_url": "https://cdn.example.com/cover.png" })),
        )
        .up_to_n_times(1)
        .mount(&media)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&media)
        .await;

    let state = setup_state(&database_url, &media.uri()).await?;
    let supplier = register(&state, Role::Supplier).await?;

    let outcome = supplier_service::submit_product(
        &state,
        &supplier,
        submission("Half Uploaded", &[("Black", 1200, 4)]),
    )
    .await;
    assert!(outcome.is_err());

    let (products,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE supplier_id = $1")
        .bind(supplier.user_id)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(products, 0);

    let orphans: Option<(Uuid,)> = sqlx::query_as(
        "SELECT v.id FROM product_variants v LEFT JOIN products p ON p.id = v.product_id WHERE p.id IS NULL",
    )
    .fetch_optional(&state.pool)
    .await?;
    assert!(orphans.is_none());

    Ok(())
}

#[tokio::test]
async fn invalid_submission_uploads_nothing() -> anyhow::Result<()> {
    let Some(database_url) = database_url() else {
        return Ok(());
    };
    let media = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&media)
        .await;

    let state = setup_state(&database_url, &media.uri()).await?;
    let supplier = register(&state, Role::Supplier).await?;

    let mut bad = submission("No Price", &[("White", 0, 1)]);
    bad.variants[0].price = None;
    let outcome = supplier_service::submit_product(&state, &supplier, bad).await;
    assert!(outcome.is_err());

    Ok(())
}
