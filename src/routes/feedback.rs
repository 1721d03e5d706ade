use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};

use crate::{
    dto::feedback::{CreateFeedbackRequest, FeedbackList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Feedback,
    response::ApiResponse,
    routes::params::Pagination,
    services::feedback_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_feedback).post(create_feedback))
}

#[utoipa::path(
    post,
    path = "/api/feedback",
    request_body = CreateFeedbackRequest,
    responses(
        (status = 201, description = "Feedback stored", body = ApiResponse<Feedback>),
        (status = 400, description = "Rating out of range or missing fields")
    ),
    security(("bearer_auth" = [])),
    tag = "Feedback"
)]
pub async fn create_feedback(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateFeedbackRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Feedback>>)> {
    let resp = feedback_service::create_feedback(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/feedback",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses((status = 200, description = "Feedback entries", body = ApiResponse<FeedbackList>)),
    security(("bearer_auth" = [])),
    tag = "Feedback"
)]
pub async fn list_feedback(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<FeedbackList>>> {
    let resp = feedback_service::list_feedback(&state, &user, pagination).await?;
    Ok(Json(resp))
}
