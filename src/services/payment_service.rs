use askama::Template;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
    sea_query::{Expr, LockType},
};
use tokio::task::JoinHandle;
use url::Url;
use uuid::Uuid;

use crate::{
    audit,
    db::OrmConn,
    domain::{
        checkout::OrderDraft,
        handshake::{HandshakeState, PaymentHandshake, RedirectOutcome, RedirectParams},
    },
    dto::payments::{NavigationRequest, PaymentOutcome, SessionStatus},
    entity::{
        orders::Entity as Orders,
        payment_sessions::{
            ActiveModel as SessionActive, Column as SessionCol, Entity as PaymentSessions,
            Model as SessionModel,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::order_service::{announce_order, order_from_entity, write_paid_order},
    state::AppState,
};

#[derive(Template)]
#[template(path = "payment_form.html")]
struct PaymentForm<'a> {
    checkout_url: &'a str,
    public_key: &'a str,
    tx_ref: &'a str,
    amount: String,
    currency: &'a str,
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    phone: Option<&'a str>,
    return_url: &'a str,
}

/// Minor units rendered as a decimal amount, e.g. `12345` -> `"123.45"`.
fn format_amount(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

enum HandshakeEvent {
    Redirect(RedirectParams),
    Navigation(Url),
}

fn ttl(state: &AppState) -> Duration {
    Duration::minutes(state.config.payment.session_ttl_minutes)
}

fn restore(session: &SessionModel, ttl: Duration) -> AppResult<PaymentHandshake> {
    Ok(PaymentHandshake::restore(
        session.transaction_ref.as_str(),
        session.return_url.as_str(),
        session.state.parse::<HandshakeState>()?,
        session.last_activity_at.with_timezone(&Utc),
        ttl,
    ))
}

fn read_draft(session: &SessionModel) -> AppResult<OrderDraft> {
    serde_json::from_value(session.draft.clone())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt order draft: {e}")))
}

async fn lock_session(
    txn: &DatabaseTransaction,
    id: Uuid,
    owner: Option<Uuid>,
) -> AppResult<SessionModel> {
    let session = PaymentSessions::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound)?;
    match owner {
        Some(owner) if owner != session.user_id => Err(AppError::NotFound),
        _ => Ok(session),
    }
}

async fn persist(
    txn: &DatabaseTransaction,
    session: &SessionModel,
    handshake: &PaymentHandshake,
    order_id: Option<Uuid>,
) -> AppResult<SessionModel> {
    let mut active: SessionActive = session.clone().into();
    active.state = Set(handshake.state().as_str().to_string());
    active.last_activity_at = Set(handshake.last_activity_at().into());
    if order_id.is_some() {
        active.order_id = Set(order_id);
    }
    Ok(active.update(txn).await?)
}

fn status_of(session: &SessionModel, handshake: &PaymentHandshake) -> SessionStatus {
    SessionStatus {
        session_id: session.id,
        transaction_ref: session.transaction_ref.clone(),
        state: handshake.state().as_str().to_string(),
        expires_at: handshake.expires_at(),
    }
}

/// Counts a page load: restarts the inactivity timer of a pending session.
async fn touch(
    state: &AppState,
    id: Uuid,
    owner: Option<Uuid>,
) -> AppResult<(SessionModel, PaymentHandshake)> {
    let txn = state.orm.begin().await?;
    let session = lock_session(&txn, id, owner).await?;
    let mut handshake = restore(&session, ttl(state))?;

    let loaded = handshake.record_page_load(Utc::now());
    let session = persist(&txn, &session, &handshake, None).await?;
    txn.commit().await?;

    if let Err(err) = loaded {
        tracing::info!(session_id = %id, state = %handshake.state(), error = %err, "page load rejected");
        return Err(err.into());
    }
    Ok((session, handshake))
}

/// Auto-submitting form that hands the payer over to the hosted checkout.
pub async fn render_page(state: &AppState, id: Uuid) -> AppResult<String> {
    let (session, handshake) = touch(state, id, None).await?;
    let draft = read_draft(&session)?;
    let payment = &state.config.payment;

    let form = PaymentForm {
        checkout_url: &payment.checkout_url,
        public_key: &payment.public_key,
        tx_ref: handshake.transaction_ref(),
        amount: format_amount(draft.total_amount),
        currency: &draft.currency,
        email: &draft.customer.email,
        first_name: &draft.customer.first_name,
        last_name: &draft.customer.last_name,
        phone: draft.customer.phone.as_deref(),
        return_url: handshake.return_url(),
    };
    form.render()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("payment form render failed: {e}")))
}

pub async fn record_activity(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<SessionStatus>> {
    let (session, handshake) = touch(state, id, Some(user.user_id)).await?;
    Ok(ApiResponse::ok(status_of(&session, &handshake)))
}

pub async fn session_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<SessionStatus>> {
    let session = PaymentSessions::find_by_id(id)
        .one(&state.orm)
        .await?
        .filter(|s| s.user_id == user.user_id)
        .ok_or(AppError::NotFound)?;
    let mut handshake = restore(&session, ttl(state))?;
    // Lazy view only; the sweeper or the next event persists the expiry.
    let _ = handshake.check_expiry(Utc::now());
    Ok(ApiResponse::ok(status_of(&session, &handshake)))
}

/// Gateway redirect back to the return URL.
pub async fn handle_return(
    state: &AppState,
    id: Uuid,
    params: RedirectParams,
) -> AppResult<ApiResponse<PaymentOutcome>> {
    apply_event(state, id, None, HandshakeEvent::Redirect(params)).await
}

/// Navigation reported by the client's web view.
pub async fn handle_navigation(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: NavigationRequest,
) -> AppResult<ApiResponse<PaymentOutcome>> {
    let url = Url::parse(payload.url.trim())
        .map_err(|e| AppError::BadRequest(format!("invalid navigation url: {e}")))?;
    apply_event(
        state,
        id,
        Some(user.user_id),
        HandshakeEvent::Navigation(url),
    )
    .await
}

async fn apply_event(
    state: &AppState,
    id: Uuid,
    owner: Option<Uuid>,
    event: HandshakeEvent,
) -> AppResult<ApiResponse<PaymentOutcome>> {
    let txn = state.orm.begin().await?;
    let session = lock_session(&txn, id, owner).await?;
    let mut handshake = restore(&session, ttl(state))?;
    let now = Utc::now();

    if let Err(err) = handshake.check_expiry(now) {
        persist(&txn, &session, &handshake, None).await?;
        txn.commit().await?;
        tracing::info!(session_id = %id, "payment session expired");
        return Err(err.into());
    }

    let params = match event {
        HandshakeEvent::Redirect(params) => params,
        HandshakeEvent::Navigation(url) => {
            if !handshake.is_return_location(&url) {
                return Ok(ApiResponse::ok(PaymentOutcome {
                    state: handshake.state().as_str().to_string(),
                    redirect_observed: false,
                    gateway_status: None,
                    order: None,
                }));
            }
            RedirectParams::from_url(&url)
        }
    };

    if handshake.state() == HandshakeState::Completed {
        return replay_completed(state, &session, &params).await;
    }

    match handshake.on_redirect(&params, now) {
        Err(err) => {
            persist(&txn, &session, &handshake, None).await?;
            txn.commit().await?;
            tracing::warn!(session_id = %id, error = %err, "redirect rejected");
            Err(err.into())
        }
        Ok(RedirectOutcome::Declined { status }) => {
            persist(&txn, &session, &handshake, None).await?;
            txn.commit().await?;
            tracing::info!(session_id = %id, gateway_status = %status, "payment declined");
            Ok(ApiResponse::success(
                "Payment was not completed",
                PaymentOutcome {
                    state: handshake.state().as_str().to_string(),
                    redirect_observed: true,
                    gateway_status: Some(status),
                    order: None,
                },
                None,
            ))
        }
        Ok(RedirectOutcome::Paid { transaction_ref }) => {
            let draft = read_draft(&session)?;
            if draft.transaction_ref != transaction_ref {
                return Err(AppError::Integrity(format!(
                    "session draft carries {} instead of {}",
                    draft.transaction_ref, transaction_ref
                )));
            }

            let written = write_paid_order(&txn, session.user_id, &draft).await?;
            handshake.complete()?;
            persist(&txn, &session, &handshake, Some(written.order.id)).await?;
            txn.commit().await?;

            tracing::info!(
                session_id = %id,
                order_id = %written.order.id,
                transaction_ref = %transaction_ref,
                created = written.created,
                "payment verified"
            );
            if written.created {
                audit::record(
                    &state.pool,
                    session.user_id,
                    "order_created",
                    "orders",
                    serde_json::json!({
                        "order_id": written.order.id,
                        "transaction_ref": transaction_ref,
                    }),
                )
                .await;
                announce_order(state, &written).await;
            }

            Ok(ApiResponse::success(
                "Payment verified",
                PaymentOutcome {
                    state: handshake.state().as_str().to_string(),
                    redirect_observed: true,
                    gateway_status: params.status,
                    order: Some(order_from_entity(written.order)?),
                },
                None,
            ))
        }
    }
}

/// A redirect seen again after the order was written returns that order.
async fn replay_completed(
    state: &AppState,
    session: &SessionModel,
    params: &RedirectParams,
) -> AppResult<ApiResponse<PaymentOutcome>> {
    let received = params.tx_ref.as_deref().map(str::trim).unwrap_or_default();
    if received != session.transaction_ref {
        return Err(AppError::Integrity(format!(
            "transaction reference mismatch: expected {}, received {}",
            session.transaction_ref, received
        )));
    }

    let order_id = session.order_id.ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("completed session has no order"))
    })?;
    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    tracing::debug!(session_id = %session.id, %order_id, "redirect replayed");
    Ok(ApiResponse::success(
        "Payment already verified",
        PaymentOutcome {
            state: HandshakeState::Completed.as_str().to_string(),
            redirect_observed: true,
            gateway_status: params.status.clone(),
            order: Some(order_from_entity(order)?),
        },
        None,
    ))
}

/// Marks every pending session idle since before `now - ttl` as expired.
pub async fn expire_stale_sessions(
    orm: &OrmConn,
    ttl: Duration,
    now: DateTime<Utc>,
) -> AppResult<u64> {
    let result = PaymentSessions::update_many()
        .col_expr(
            SessionCol::State,
            Expr::value(HandshakeState::Expired.as_str()),
        )
        .filter(SessionCol::State.eq(HandshakeState::Pending.as_str()))
        .filter(SessionCol::LastActivityAt.lte(now - ttl))
        .exec(orm)
        .await?;
    Ok(result.rows_affected)
}

pub fn spawn_session_sweeper(state: AppState, every: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match expire_stale_sessions(&state.orm, ttl(&state), Utc::now()).await {
                Ok(0) => {}
                Ok(expired) => tracing::info!(expired, "expired stale payment sessions"),
                Err(err) => tracing::warn!(error = %err, "payment session sweep failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_render_in_major_units() {
        assert_eq!(format_amount(20), "0.20");
        assert_eq!(format_amount(12345), "123.45");
        assert_eq!(format_amount(100), "1.00");
        assert_eq!(format_amount(-5), "-0.05");
    }

    #[test]
    fn payment_form_carries_every_gateway_field() {
        let html = PaymentForm {
            checkout_url: "https://pay.example.com/hosted",
            public_key: "pk_test_1",
            tx_ref: "TX-20240101-abc",
            amount: format_amount(2000),
            currency: "ETB",
            email: "abebe@example.com",
            first_name: "Abebe",
            last_name: "Kebede",
            phone: Some("0911000000"),
            return_url: "https://shop.example.com/api/payments/1/return",
        }
        .render()
        .unwrap();

        assert!(html.contains(r#"action="https://pay.example.com/hosted""#));
        assert!(html.contains(r#"name="tx_ref" value="TX-20240101-abc""#));
        assert!(html.contains(r#"name="amount" value="20.00""#));
        assert!(html.contains(r#"name="phone_number" value="0911000000""#));
        assert!(html.contains("document.forms[0].submit()"));
    }

    #[test]
    fn payment_form_escapes_payer_fields() {
        let html = PaymentForm {
            checkout_url: "https://pay.example.com/hosted",
            public_key: "pk",
            tx_ref: "TX",
            amount: "1.00".into(),
            currency: "ETB",
            email: "a@example.com",
            first_name: "\"><script>",
            last_name: "K",
            phone: None,
            return_url: "https://shop.example.com/r",
        }
        .render()
        .unwrap();

        assert!(!html.contains("\"><script>"));
        assert!(!html.contains("phone_number"));
    }
}
