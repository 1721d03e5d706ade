use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::sse::{Event, Sse},
    routing::{get, patch, post},
};
use futures::Stream;
use uuid::Uuid;

use crate::{
    dto::notifications::{MarkedRead, NotificationList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Notification,
    response::ApiResponse,
    routes::params::Pagination,
    services::notification_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/{id}/read", patch(mark_read))
        .route("/read-all", post(mark_all_read))
        .route("/stream", get(stream))
}

#[utoipa::path(
    get,
    path = "/api/notifications",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses((status = 200, description = "Notifications, newest first", body = ApiResponse<NotificationList>)),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<NotificationList>>> {
    let resp = notification_service::list_notifications(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/notifications/{id}/read",
    params(("id" = Uuid, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Marked as read", body = ApiResponse<Notification>),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Notification>>> {
    let resp = notification_service::mark_read(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/notifications/read-all",
    responses((status = 200, description = "Count of notifications marked", body = ApiResponse<MarkedRead>)),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn mark_all_read(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<MarkedRead>>> {
    let resp = notification_service::mark_all_read(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/notifications/stream",
    responses((status = 200, description = "Server-sent notifications", content_type = "text/event-stream")),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn stream(
    State(state): State<AppState>,
    user: AuthUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    notification_service::subscribe(&state, &user).into_sse()
}
