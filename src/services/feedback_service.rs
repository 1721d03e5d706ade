use uuid::Uuid;

use crate::{
    audit,
    domain::review_flow::Rating,
    dto::feedback::{CreateFeedbackRequest, FeedbackList},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Feedback, NotificationKind, Role},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::{catalog_service::find_product, notification_service::notify_quietly},
    state::AppState,
};

pub async fn create_feedback(
    state: &AppState,
    user: &AuthUser,
    payload: CreateFeedbackRequest,
) -> AppResult<ApiResponse<Feedback>> {
    let rating = Rating::new(payload.rating)?;
    let category = payload.category.trim();
    let message = payload.message.trim();
    if category.is_empty() || message.is_empty() {
        return Err(AppError::BadRequest(
            "category and message are required".into(),
        ));
    }

    let supplier_id = match payload.product_id {
        Some(product_id) => Some(find_product(state, product_id).await?.supplier_id),
        None => None,
    };

    let feedback = sqlx::query_as::<_, Feedback>(
        r#"
        INSERT INTO feedback (id, user_id, user_email, category, rating, message, image_url, product_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(&user.email)
    .bind(category)
    .bind(i16::from(rating.value()))
    .bind(message)
    .bind(payload.image_url)
    .bind(payload.product_id)
    .fetch_one(&state.pool)
    .await?;

    if let Some(supplier_id) = supplier_id {
        notify_quietly(
            state,
            supplier_id,
            NotificationKind::Feedback,
            "New product feedback",
            &format!("A customer rated your product {}/5: {}", rating.value(), feedback.message),
        )
        .await;
    }
    audit::record(
        &state.pool,
        user.user_id,
        "feedback_create",
        "feedback",
        serde_json::json!({ "feedback_id": feedback.id, "product_id": feedback.product_id }),
    )
    .await;

    Ok(ApiResponse::success("Thanks for your feedback", feedback, None))
}

/// Own feedback, or every entry for customer service.
pub async fn list_feedback(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<FeedbackList>> {
    let (page, limit, offset) = pagination.normalize();
    let scope = (user.role != Role::Admin).then_some(user.user_id);

    let items = sqlx::query_as::<_, Feedback>(
        r#"
        SELECT * FROM feedback
        WHERE $1::uuid IS NULL OR user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(scope)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM feedback WHERE $1::uuid IS NULL OR user_id = $1")
            .bind(scope)
            .fetch_one(&state.pool)
            .await?;

    Ok(ApiResponse::success(
        "OK",
        FeedbackList { items },
        Some(Meta::new(page, limit, total.0)),
    ))
}
