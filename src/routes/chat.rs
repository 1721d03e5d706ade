use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::sse::{Event, Sse},
    routing::{get, post},
};
use futures::Stream;

use crate::{
    dto::{
        chat::{ChatHistory, PostMessageRequest},
        notifications::MarkedRead,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::ChatMessage,
    response::ApiResponse,
    routes::params::Pagination,
    services::chat_service::{self, ChatThread},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{thread}/messages", get(list_messages).post(post_message))
        .route("/{thread}/read", post(mark_read))
        .route("/{thread}/stream", get(stream))
}

#[utoipa::path(
    get,
    path = "/api/chat/{thread}/messages",
    params(
        ("thread" = String, Path, description = "support:{user_id} or supplier:{supplier_id}"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Messages, oldest first", body = ApiResponse<ChatHistory>),
        (status = 403, description = "Not a participant")
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn list_messages(
    State(state): State<AppState>,
    user: AuthUser,
    Path(thread): Path<String>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ChatHistory>>> {
    let thread: ChatThread = thread.parse()?;
    let resp = chat_service::list_messages(&state, &user, thread, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/chat/{thread}/messages",
    params(("thread" = String, Path, description = "support:{user_id} or supplier:{supplier_id}")),
    request_body = PostMessageRequest,
    responses(
        (status = 200, description = "Message sent", body = ApiResponse<ChatMessage>),
        (status = 400, description = "Empty message")
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn post_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(thread): Path<String>,
    Json(payload): Json<PostMessageRequest>,
) -> AppResult<Json<ApiResponse<ChatMessage>>> {
    let thread: ChatThread = thread.parse()?;
    let resp = chat_service::post_message(&state, &user, thread, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/chat/{thread}/read",
    params(("thread" = String, Path, description = "support:{user_id} or supplier:{supplier_id}")),
    responses((status = 200, description = "Messages from the other side marked read", body = ApiResponse<MarkedRead>)),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(thread): Path<String>,
) -> AppResult<Json<ApiResponse<MarkedRead>>> {
    let thread: ChatThread = thread.parse()?;
    let resp = chat_service::mark_thread_read(&state, &user, thread).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/chat/{thread}/stream",
    params(("thread" = String, Path, description = "support:{user_id} or supplier:{supplier_id}")),
    responses((status = 200, description = "Server-sent chat messages", content_type = "text/event-stream")),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn stream(
    State(state): State<AppState>,
    user: AuthUser,
    Path(thread): Path<String>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let thread: ChatThread = thread.parse()?;
    Ok(chat_service::subscribe(&state, &user, thread)?.into_sse())
}
