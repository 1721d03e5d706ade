use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::checkout::{CheckoutRequest, CheckoutResponse},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::checkout_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(checkout))
}

#[utoipa::path(
    post,
    path = "/api/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Payment session opened for the cart", body = ApiResponse<CheckoutResponse>),
        (status = 400, description = "Missing details or empty cart")
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<Json<ApiResponse<CheckoutResponse>>> {
    let resp = checkout_service::checkout(&state, &user, payload).await?;
    Ok(Json(resp))
}
