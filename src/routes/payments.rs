use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Html,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    domain::handshake::RedirectParams,
    dto::payments::{NavigationRequest, PaymentOutcome, SessionStatus},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(session_status))
        .route("/{id}/page", get(payment_page))
        .route("/{id}/activity", post(record_activity))
        .route("/{id}/return", get(payment_return))
        .route("/{id}/navigation", post(navigation))
}

#[utoipa::path(
    get,
    path = "/api/payments/{id}",
    params(("id" = Uuid, Path, description = "Payment session id")),
    responses(
        (status = 200, description = "Handshake state of the session", body = ApiResponse<SessionStatus>),
        (status = 404, description = "Unknown session")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn session_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<SessionStatus>>> {
    let resp = payment_service::session_status(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/payments/{id}/page",
    params(("id" = Uuid, Path, description = "Payment session id")),
    responses(
        (status = 200, description = "Self-submitting form that opens the hosted checkout", content_type = "text/html"),
        (status = 409, description = "Session is no longer pending")
    ),
    tag = "Payments"
)]
pub async fn payment_page(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Html<String>> {
    let page = payment_service::render_page(&state, id).await?;
    Ok(Html(page))
}

#[utoipa::path(
    post,
    path = "/api/payments/{id}/activity",
    params(("id" = Uuid, Path, description = "Payment session id")),
    responses((status = 200, description = "Session kept alive", body = ApiResponse<SessionStatus>)),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn record_activity(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<SessionStatus>>> {
    let resp = payment_service::record_activity(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/payments/{id}/return",
    params(
        ("id" = Uuid, Path, description = "Payment session id"),
        ("status" = Option<String>, Query, description = "Gateway result; only `success` (any case) counts as paid, every other value declines"),
        ("tx_ref" = Option<String>, Query, description = "Transaction reference echoed by the gateway")
    ),
    responses(
        (status = 200, description = "Outcome of the payment", body = ApiResponse<PaymentOutcome>),
        (status = 400, description = "Malformed redirect"),
        (status = 409, description = "Session is no longer pending"),
        (status = 410, description = "Session expired"),
        (status = 422, description = "Transaction reference mismatch")
    ),
    tag = "Payments"
)]
pub async fn payment_return(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<RedirectParams>,
) -> AppResult<Json<ApiResponse<PaymentOutcome>>> {
    let resp = payment_service::handle_return(&state, id, params).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/payments/{id}/navigation",
    params(("id" = Uuid, Path, description = "Payment session id")),
    request_body = NavigationRequest,
    responses(
        (status = 200, description = "Outcome after inspecting the navigation", body = ApiResponse<PaymentOutcome>),
        (status = 400, description = "Invalid URL or malformed redirect")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn navigation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<NavigationRequest>,
) -> AppResult<Json<ApiResponse<PaymentOutcome>>> {
    let resp = payment_service::handle_navigation(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
