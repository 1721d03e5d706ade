use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, Set};
use uuid::Uuid;

use crate::{
    audit,
    domain::{
        checkout::{compose_order_draft, validate_details},
        handshake::PaymentHandshake,
    },
    dto::checkout::{CheckoutRequest, CheckoutResponse},
    entity::payment_sessions::ActiveModel as SessionActive,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    services::cart_service::load_items,
    state::AppState,
};

/// Composes an order draft from the caller's cart and opens a payment session for it.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    let CheckoutRequest {
        shipping_address,
        customer,
    } = payload;
    validate_details(&shipping_address, &customer)?;

    let items = load_items(&state.pool, user.user_id).await?;
    let now = Utc::now();
    let payment = &state.config.payment;
    let draft = compose_order_draft(items, shipping_address, customer, &payment.currency, now)?;

    let session_id = Uuid::new_v4();
    let handshake = PaymentHandshake::start(
        draft.transaction_ref.as_str(),
        payment.return_url_for(session_id),
        now,
        Duration::minutes(payment.session_ttl_minutes),
    );

    let draft_json =
        serde_json::to_value(&draft).map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    SessionActive {
        id: Set(session_id),
        user_id: Set(user.user_id),
        transaction_ref: Set(draft.transaction_ref.clone()),
        draft: Set(draft_json),
        return_url: Set(handshake.return_url().to_string()),
        state: Set(handshake.state().as_str().to_string()),
        order_id: Set(None),
        last_activity_at: Set(now.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(
        %session_id,
        transaction_ref = %draft.transaction_ref,
        total_amount = draft.total_amount,
        items = draft.cart_items.len(),
        "payment session opened"
    );
    audit::record(
        &state.pool,
        user.user_id,
        "checkout",
        "payment_sessions",
        serde_json::json!({
            "session_id": session_id,
            "transaction_ref": draft.transaction_ref,
            "total_amount": draft.total_amount,
        }),
    )
    .await;

    Ok(ApiResponse::success(
        "Checkout ready",
        CheckoutResponse {
            session_id,
            transaction_ref: draft.transaction_ref,
            total_amount: draft.total_amount,
            currency: draft.currency,
            payment_page_url: payment.page_url_for(session_id),
            expires_at: handshake.expires_at(),
        },
        Some(Meta::empty()),
    ))
}
