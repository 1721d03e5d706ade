use std::collections::BTreeMap;

use chrono::Utc;
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    sea_query::{Expr, extension::postgres::PgExpr},
};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::products::{ProductDetail, ProductList, ReviewList},
    entity::{
        products::{Column as ProdCol, Entity as Products, Model as ProductModel},
        reviews::{Column as ReviewCol, Entity as Reviews, Model as ReviewModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Product, ProductStatus, Review, Variant},
    response::{ApiResponse, Meta},
    routes::params::ProductQuery,
    state::AppState,
};

#[derive(FromRow)]
struct VariantRow {
    id: Uuid,
    product_id: Uuid,
    attribute_values: Json<BTreeMap<String, String>>,
    price: i64,
    stock: i32,
    image_url: String,
}

impl From<VariantRow> for Variant {
    fn from(row: VariantRow) -> Self {
        Variant {
            id: row.id,
            product_id: row.product_id,
            attribute_values: row.attribute_values.0,
            price: row.price,
            stock: row.stock,
            image_url: row.image_url,
        }
    }
}

/// Escapes LIKE metacharacters so user input only ever matches literally.
fn like_prefix(input: &str) -> String {
    let mut pattern = String::with_capacity(input.len() + 1);
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Anyone may browse verified products; other moderation states are for staff.
fn listable_status(
    requested: Option<ProductStatus>,
    viewer: Option<&AuthUser>,
) -> AppResult<ProductStatus> {
    match requested.unwrap_or(ProductStatus::Verified) {
        ProductStatus::Verified => Ok(ProductStatus::Verified),
        other => match viewer {
            None => Err(AppError::Unauthorized),
            Some(user) => ensure_admin(user).map(|()| other),
        },
    }
}

pub async fn list_products(
    state: &AppState,
    viewer: Option<&AuthUser>,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let status = listable_status(query.status, viewer)?;
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(ProdCol::Status.eq(status.as_str()));

    if let Some(category) = query.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        condition = condition.add(ProdCol::Category.eq(category));
    }
    if let Some(prefix) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        condition = condition.add(Expr::col(ProdCol::Name).ilike(like_prefix(prefix)));
    }

    let finder = Products::find()
        .filter(condition)
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

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductDetail>> {
    let product = find_product(state, id).await?;
    let variants = load_variants(&state.pool, id).await?;

    let (review_count, average_rating): (i64, Option<f64>) = sqlx::query_as(
        "SELECT COUNT(*), AVG(rating)::float8 FROM reviews WHERE product_id = $1",
    )
    .bind(id)
    .fetch_one(&state.pool)
    .await?;

    Ok(ApiResponse::success(
        "Product",
        ProductDetail {
            product,
            variants,
            average_rating,
            review_count,
        },
        None,
    ))
}

pub async fn product_reviews(
    state: &AppState,
    id: Uuid,
) -> AppResult<ApiResponse<ReviewList>> {
    find_product(state, id).await?;
    let items = Reviews::find()
        .filter(ReviewCol::ProductId.eq(id))
        .order_by_desc(ReviewCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(review_from_entity)
        .collect();

    Ok(ApiResponse::ok(ReviewList { items }))
}

pub async fn find_product(state: &AppState, id: Uuid) -> AppResult<Product> {
    Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
        .and_then(product_from_entity)
}

pub async fn load_variants(pool: &DbPool, product_id: Uuid) -> AppResult<Vec<Variant>> {
    let rows = sqlx::query_as::<_, VariantRow>(
        r#"
        SELECT id, product_id, attribute_values, price, stock, image_url
        FROM product_variants
        WHERE product_id = $1
        ORDER BY created_at, id
        "#,
    )
    .bind(product_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Variant::from).collect())
}

pub async fn find_variant(
    pool: &DbPool,
    product_id: Uuid,
    variant_id: Uuid,
) -> AppResult<Option<Variant>> {
    let row = sqlx::query_as::<_, VariantRow>(
        r#"
        SELECT id, product_id, attribute_values, price, stock, image_url
        FROM product_variants
        WHERE id = $1 AND product_id = $2
        "#,
    )
    .bind(variant_id)
    .bind(product_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Variant::from))
}

pub fn product_from_entity(model: ProductModel) -> AppResult<Product> {
    let status = model
        .status
        .parse::<ProductStatus>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    Ok(Product {
        id: model.id,
        supplier_id: model.supplier_id,
        name: model.name,
        description: model.description,
        category: model.category,
        brand: model.brand,
        images: model.images,
        video_url: model.video_url,
        attributes: model.attributes,
        status,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

pub fn review_from_entity(model: ReviewModel) -> Review {
    Review {
        id: model.id,
        order_id: model.order_id,
        item_index: model.item_index,
        product_id: model.product_id,
        rating: model.rating,
        review_text: model.review_text,
        user_email: model.user_email,
        order_snapshot: model.order_snapshot,
        product_snapshot: model.product_snapshot,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
