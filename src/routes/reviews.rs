use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::reviews::{ReviewProgress, SubmitReviewRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::review_service,
    state::AppState,
};

/// Mounted under `/api/orders`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/reviews/next", get(next_review))
        .route("/{id}/reviews", post(submit_review))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}/reviews/next",
    params(("id" = Uuid, Path, description = "Delivered order id")),
    responses(
        (status = 200, description = "Next item awaiting a review, or completion", body = ApiResponse<ReviewProgress>),
        (status = 409, description = "Order not delivered yet")
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn next_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ReviewProgress>>> {
    let resp = review_service::next_review(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/reviews",
    params(("id" = Uuid, Path, description = "Delivered order id")),
    request_body = SubmitReviewRequest,
    responses(
        (status = 200, description = "Review stored, next step returned", body = ApiResponse<ReviewProgress>),
        (status = 400, description = "Rating out of range or item already reviewed")
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn submit_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitReviewRequest>,
) -> AppResult<Json<ApiResponse<ReviewProgress>>> {
    let resp = review_service::submit_review(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
