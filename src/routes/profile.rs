use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Multipart, State},
    response::sse::{Event, Sse},
    routing::{get, post},
};
use futures::Stream;

use crate::{
    dto::profile::UpdateProfileRequest,
    error::AppResult,
    middleware::auth::AuthUser,
    models::UserProfile,
    realtime::topics,
    response::ApiResponse,
    routes::uploads::{FileUpload, single_file},
    services::profile_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_profile).patch(update_profile))
        .route("/picture", post(upload_picture))
        .route("/stream", get(profile_stream))
}

#[utoipa::path(
    get,
    path = "/api/profile",
    responses((status = 200, description = "Current user's profile", body = ApiResponse<UserProfile>)),
    security(("bearer_auth" = [])),
    tag = "Profile"
)]
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    let resp = profile_service::current_profile(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/profile",
    request_body = UpdateProfileRequest,
    responses((status = 200, description = "Updated profile", body = ApiResponse<UserProfile>)),
    security(("bearer_auth" = [])),
    tag = "Profile"
)]
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    let resp = profile_service::update_profile(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/profile/picture",
    request_body(content = FileUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Profile with the new picture", body = ApiResponse<UserProfile>),
        (status = 502, description = "Media host failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Profile"
)]
pub async fn upload_picture(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    let file = single_file(&mut multipart, "file").await?;
    let resp = profile_service::upload_picture(&state, &user, file).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/profile/stream",
    responses((status = 200, description = "Server-sent profile changes", content_type = "text/event-stream")),
    security(("bearer_auth" = [])),
    tag = "Profile"
)]
pub async fn profile_stream(
    State(state): State<AppState>,
    user: AuthUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    state.hub.subscribe(topics::profile(user.user_id)).into_sse()
}
