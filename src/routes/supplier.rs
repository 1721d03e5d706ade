use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Multipart, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use utoipa::ToSchema;

use crate::{
    domain::submission::{MediaFile, ProductForm, ProductSubmission, VariantSubmission},
    dto::{
        orders::OrderList,
        products::{ProductDetail, ProductList},
        profile::UploadResponse,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_role},
    models::Role,
    response::ApiResponse,
    routes::{
        params::{OrderListQuery, Pagination},
        uploads::{FileUpload, read_file, single_file},
    },
    services::{order_service, profile_service, supplier_service},
    state::AppState,
};

const VARIANT_IMAGE_PREFIX: &str = "variant_image_";

/// Multipart layout of a product submission.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct ProductUpload {
    /// JSON: name, description, category, brand, attributes and variants.
    product: String,
    /// Repeat once per product image.
    #[schema(value_type = String, format = Binary)]
    image: Vec<u8>,
    #[schema(value_type = Option<String>, format = Binary)]
    video: Option<Vec<u8>>,
    /// One `variant_image_{n}` part per variant, `n` being its zero-based index.
    #[schema(value_type = String, format = Binary)]
    variant_image_0: Vec<u8>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(submit_product))
        .route("/orders", get(list_orders))
        .route("/license", post(upload_license))
}

async fn read_submission(mut multipart: Multipart) -> AppResult<ProductSubmission> {
    let mut form: Option<ProductForm> = None;
    let mut images = Vec::new();
    let mut video: Option<MediaFile> = None;
    let mut variant_images: BTreeMap<usize, MediaFile> = BTreeMap::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "product" => {
                let text = field.text().await?;
                let parsed = serde_json::from_str(&text)
                    .map_err(|e| AppError::BadRequest(format!("invalid product json: {e}")))?;
                form = Some(parsed);
            }
            "image" => images.push(read_file(field).await?),
            "video" => {
                if video.is_some() {
                    return Err(AppError::BadRequest("only one video is allowed".into()));
                }
                video = Some(read_file(field).await?);
            }
            other => match other.strip_prefix(VARIANT_IMAGE_PREFIX) {
                Some(index) => {
                    let index: usize = index.parse().map_err(|_| {
                        AppError::BadRequest(format!("invalid variant image part '{other}'"))
                    })?;
                    let file = read_file(field).await?;
                    if variant_images.insert(index, file).is_some() {
                        return Err(AppError::BadRequest(format!(
                            "variant {index} has more than one image"
                        )));
                    }
                }
                None => tracing::debug!(field = other, "ignoring multipart field"),
            },
        }
    }

    let form = form.ok_or_else(|| AppError::BadRequest("missing 'product' part".into()))?;
    let variants: Vec<VariantSubmission> = form
        .variants
        .iter()
        .enumerate()
        .map(|(index, variant)| VariantSubmission {
            values: variant.values.clone(),
            price: variant.price,
            stock: variant.stock,
            image: variant_images.remove(&index),
        })
        .collect();
    if let Some(index) = variant_images.keys().next() {
        return Err(AppError::BadRequest(format!(
            "image given for unknown variant {index}"
        )));
    }

    Ok(ProductSubmission {
        form,
        images,
        video,
        variants,
    })
}

#[utoipa::path(
    post,
    path = "/api/supplier/products",
    request_body(content = ProductUpload, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Product stored as unverified", body = ApiResponse<ProductDetail>),
        (status = 400, description = "Submission failed validation"),
        (status = 502, description = "Media host failed; nothing was kept")
    ),
    security(("bearer_auth" = [])),
    tag = "Supplier"
)]
pub async fn submit_product(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<ProductDetail>>)> {
    ensure_role(&user, Role::Supplier)?;
    let submission = read_submission(multipart).await?;
    let resp = supplier_service::submit_product(&state, &user, submission).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/supplier/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses((status = 200, description = "Products of the supplier in any status", body = ApiResponse<ProductList>)),
    security(("bearer_auth" = [])),
    tag = "Supplier"
)]
pub async fn list_products(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = supplier_service::list_own_products(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/supplier/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("sort_order" = Option<String>, Query, description = "asc or desc")
    ),
    responses((status = 200, description = "Orders containing the supplier's products", body = ApiResponse<OrderList>)),
    security(("bearer_auth" = [])),
    tag = "Supplier"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    ensure_role(&user, Role::Supplier)?;
    let resp = order_service::list_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/supplier/license",
    request_body(content = FileUpload, content_type = "multipart/form-data"),
    responses((status = 200, description = "Trade license stored", body = ApiResponse<UploadResponse>)),
    security(("bearer_auth" = [])),
    tag = "Supplier"
)]
pub async fn upload_license(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<UploadResponse>>> {
    ensure_role(&user, Role::Supplier)?;
    let file = single_file(&mut multipart, "file").await?;
    let resp = profile_service::upload_trade_license(&state, &user, file).await?;
    Ok(Json(resp))
}
