use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::products::{ProductDetail, ProductList, ReviewList},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::ProductQuery,
    services::catalog_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/{id}", get(get_product))
        .route("/{id}/reviews", get(product_reviews))
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("category" = Option<String>, Query, description = "Exact category"),
        ("q" = Option<String>, Query, description = "Name prefix"),
        ("status" = Option<String>, Query, description = "unverified, verified or rejected; default verified. Anything but verified needs an admin token")
    ),
    responses(
        (status = 200, description = "Catalog page", body = ApiResponse<ProductList>),
        (status = 401, description = "Unmoderated listing without a token"),
        (status = 403, description = "Unmoderated listing by a non-admin")
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = catalog_service::list_products(&state, viewer.as_ref(), query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product with its variants", body = ApiResponse<ProductDetail>),
        (status = 404, description = "Not found")
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ProductDetail>>> {
    let resp = catalog_service::get_product(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}/reviews",
    params(("id" = Uuid, Path, description = "Product id")),
    responses((status = 200, description = "Reviews of the product", body = ApiResponse<ReviewList>)),
    tag = "Products"
)]
pub async fn product_reviews(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ReviewList>>> {
    let resp = catalog_service::product_reviews(&state, id).await?;
    Ok(Json(resp))
}
