use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get},
};

use crate::{
    dto::cart::AddToCartRequest,
    error::AppResult,
    middleware::auth::AuthUser,
    models::Cart,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).post(add_to_cart).delete(clear_cart))
        .route("/items/{index}", delete(remove_line))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses((status = 200, description = "Current cart with its total", body = ApiResponse<Cart>)),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let resp = cart_service::get_cart(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Line appended to the cart", body = ApiResponse<Cart>),
        (status = 400, description = "Bad request"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let resp = cart_service::add_to_cart(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart/items/{index}",
    params(("index" = usize, Path, description = "Zero-based line index")),
    responses(
        (status = 200, description = "Line removed", body = ApiResponse<Cart>),
        (status = 404, description = "No such line")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_line(
    State(state): State<AppState>,
    user: AuthUser,
    Path(index): Path<usize>,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let resp = cart_service::remove_line(&state, &user, index).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart",
    responses((status = 200, description = "Cart emptied", body = ApiResponse<Cart>)),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let resp = cart_service::clear_cart(&state, &user).await?;
    Ok(Json(resp))
}
