use chrono::Utc;
use futures::future::try_join_all;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::Serialize;
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    audit,
    domain::submission::{self, ProductSubmission, UploadProgress, ValidVariant},
    dto::products::{ModerationRequest, ProductDetail, ProductList},
    entity::products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products},
    error::{AppError, AppResult},
    media::AssetCategory,
    middleware::auth::{AuthUser, ensure_admin, ensure_role},
    models::{Product, ProductStatus, Role, Variant},
    realtime::{HubEvent, topics},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::catalog_service::{load_variants, product_from_entity},
    state::AppState,
};

#[derive(Debug, Serialize)]
struct ProgressEvent<'a> {
    product: &'a str,
    percent: u8,
    stage: &'static str,
}

fn report(state: &AppState, user: &AuthUser, product: &str, percent: u8, stage: &'static str) {
    tracing::info!(supplier_id = %user.user_id, product, percent, stage, "upload progress");
    state.hub.publish(
        &topics::uploads(user.user_id),
        HubEvent::new(
            "upload_progress",
            ProgressEvent {
                product,
                percent,
                stage,
            },
        ),
    );
}

async fn upload_variant(
    state: &AppState,
    user: &AuthUser,
    product: &Product,
    variant: &ValidVariant,
    progress: &UploadProgress,
) -> AppResult<Variant> {
    let image_url = state
        .media
        .upload(AssetCategory::ProductImages, &variant.image)
        .await?;

    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO product_variants (id, product_id, attribute_values, price, stock, image_url)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(product.id)
    .bind(Json(&variant.values))
    .bind(variant.price)
    .bind(variant.stock)
    .bind(&image_url)
    .execute(&state.pool)
    .await?;

    report(state, user, &product.name, progress.advance(), "variant");
    Ok(Variant {
        id,
        product_id: product.id,
        attribute_values: variant.values.clone(),
        price: variant.price,
        stock: variant.stock,
        image_url,
    })
}

/// Validates a product with its variants, uploads its media and writes it as
/// `unverified`. When any variant step fails the product is removed again.
pub async fn submit_product(
    state: &AppState,
    user: &AuthUser,
    submission: ProductSubmission,
) -> AppResult<ApiResponse<ProductDetail>> {
    ensure_role(user, Role::Supplier)?;
    let valid = submission::validate(submission)?;
    let progress = UploadProgress::for_product(&valid);

    let mut images = Vec::with_capacity(valid.images.len());
    for image in &valid.images {
        images.push(
            state
                .media
                .upload(AssetCategory::ProductImages, image)
                .await?,
        );
        report(state, user, &valid.name, progress.advance(), "image");
    }
    let video_url = match &valid.video {
        Some(video) => {
            let url = state
                .media
                .upload(AssetCategory::ProductVideos, video)
                .await?;
            report(state, user, &valid.name, progress.advance(), "video");
            Some(url)
        }
        None => None,
    };

    let model = ProductActive {
        id: Set(Uuid::new_v4()),
        supplier_id: Set(user.user_id),
        name: Set(valid.name.clone()),
        description: Set(valid.description.clone()),
        category: Set(valid.category.clone()),
        brand: Set(valid.brand.clone()),
        images: Set(images),
        video_url: Set(video_url),
        attributes: Set(valid.attributes.clone()),
        status: Set(ProductStatus::Unverified.as_str().to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;
    let product = product_from_entity(model)?;

    let uploads = valid
        .variants
        .iter()
        .map(|variant| upload_variant(state, user, &product, variant, &progress));
    let variants = match try_join_all(uploads).await {
        Ok(variants) => variants,
        Err(err) => {
            tracing::warn!(product_id = %product.id, error = %err, "variant upload failed, removing product");
            if let Err(cleanup) = Products::delete_by_id(product.id).exec(&state.orm).await {
                tracing::error!(product_id = %product.id, error = %cleanup, "failed to remove partial product");
            }
            report(state, user, &product.name, progress.percent(), "failed");
            return Err(err);
        }
    };

    report(state, user, &product.name, 100, "done");
    audit::record(
        &state.pool,
        user.user_id,
        "product_submit",
        "products",
        serde_json::json!({ "product_id": product.id, "variants": variants.len() }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product submitted for review",
        ProductDetail {
            product,
            variants,
            average_rating: None,
            review_count: 0,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_own_products(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_role(user, Role::Supplier)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Products::find()
        .filter(ProdCol::SupplierId.eq(user.user_id))
        .order_by_desc(ProdCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

/// Customer-service moderation of a submitted product.
pub async fn moderate_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: ModerationRequest,
) -> AppResult<ApiResponse<ProductDetail>> {
    ensure_admin(user)?;
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ProductActive = existing.into();
    active.status = Set(payload.status.as_str().to_string());
    let model = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "product_moderate",
        "products",
        serde_json::json!({ "product_id": id, "status": payload.status }),
    )
    .await;

    let product = product_from_entity(model)?;
    let variants = load_variants(&state.pool, id).await?;
    Ok(ApiResponse::success(
        "Product status updated",
        ProductDetail {
            product,
            variants,
            average_rating: None,
            review_count: 0,
        },
        None,
    ))
}
