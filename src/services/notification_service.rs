use uuid::Uuid;

use crate::{
    dto::notifications::{MarkedRead, NotificationList},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Notification, NotificationKind},
    realtime::{HubEvent, Subscription, topics},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

pub async fn notify(
    state: &AppState,
    user_id: Uuid,
    kind: NotificationKind,
    title: &str,
    body: &str,
) -> AppResult<Notification> {
    let notification = sqlx::query_as::<_, Notification>(
        r#"
        INSERT INTO notifications (id, user_id, kind, title, body)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(kind.as_str())
    .bind(title)
    .bind(body)
    .fetch_one(&state.pool)
    .await?;

    let delivered = state.hub.publish(
        &topics::notifications(user_id),
        HubEvent::new("notification", &notification),
    );
    tracing::debug!(%user_id, kind = kind.as_str(), delivered, "notification stored");
    Ok(notification)
}

/// Sends a notification after the triggering write has committed. Failures are
/// logged and never surface to the caller.
pub async fn notify_quietly(
    state: &AppState,
    user_id: Uuid,
    kind: NotificationKind,
    title: &str,
    body: &str,
) {
    if let Err(err) = notify(state, user_id, kind, title, body).await {
        tracing::warn!(error = %err, %user_id, "notification failed");
    }
}

pub async fn list_notifications(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<NotificationList>> {
    let (page, limit, offset) = pagination.normalize();
    let items = sqlx::query_as::<_, Notification>(
        r#"
        SELECT * FROM notifications
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let (total, unread): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COUNT(*) FILTER (WHERE NOT read) FROM notifications WHERE user_id = $1",
    )
    .bind(user.user_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(ApiResponse::success(
        "OK",
        NotificationList { items, unread },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn mark_read(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Notification>> {
    let notification = sqlx::query_as::<_, Notification>(
        "UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2 RETURNING *",
    )
    .bind(id)
    .bind(user.user_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::NotFound)?;

    Ok(ApiResponse::ok(notification))
}

pub async fn mark_all_read(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<MarkedRead>> {
    let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND NOT read")
        .bind(user.user_id)
        .execute(&state.pool)
        .await?;

    Ok(ApiResponse::ok(MarkedRead {
        updated: result.rows_affected(),
    }))
}

pub fn subscribe(state: &AppState, user: &AuthUser) -> Subscription {
    state.hub.subscribe(topics::notifications(user.user_id))
}
