mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use marketplace_api::{
    domain::handshake::RedirectParams,
    dto::{
        cart::AddToCartRequest,
        checkout::{CheckoutRequest, CheckoutResponse},
        orders::UpdateOrderStatusRequest,
        products::ModerationRequest,
        reviews::SubmitReviewRequest,
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::{CustomerDetails, OrderStatus, ProductStatus, Role},
    routes::params::{OrderListQuery, Pagination},
    services::{
        cart_service, checkout_service, notification_service, order_service, payment_service,
        review_service, supplier_service,
    },
    state::AppState,
};
use serde_json::json;
use uuid::Uuid;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path_regex},
};

use common::{create_admin, database_url, register, setup_state, submission};

async fn media_host() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/[a-z-]+/upload$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "secure_url": "https://cdn.example.com/asset.png" })),
        )
        .mount(&server)
        .await;
    server
}

// Supplier lists a product, customer pays for it, the order is delivered and every line is reviewed.
#[tokio::test]
async fn purchase_delivery_and_review_flow() -> anyhow::Result<()> {
    let Some(database_url) = database_url() else {
        return Ok(());
    };
    let media = media_host().await;
    let state = setup_state(&database_url, &media.uri()).await?;

    let customer = register(&state, Role::Customer).await?;
    let supplier = register(&state, Role::Supplier).await?;
    let courier = register(&state, Role::Delivery).await?;
    let support = create_admin(&state).await?;

    // Supplier submission lands unverified until support approves it.
    let submitted = supplier_service::submit_product(
        &state,
        &supplier,
        submission("Flow Tote", &[("Red", 1500, 5), ("Blue", 2500, 5)]),
    )
    .await?
    .data
    .expect("product detail");
    assert_eq!(submitted.product.status, ProductStatus::Unverified);
    assert_eq!(submitted.variants.len(), 2);

    let red = submitted.variants[0].id;
    let blue = submitted.variants[1].id;
    let unverified = cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest {
            product_id: submitted.product.id,
            variant_id: red,
            quantity: 1,
        },
    )
    .await;
    assert!(unverified.is_err(), "unverified products are not for sale");

    supplier_service::moderate_product(
        &state,
        &support,
        submitted.product.id,
        ModerationRequest {
            status: ProductStatus::Verified,
        },
    )
    .await?;

    for (variant_id, quantity) in [(red, 2), (blue, 1)] {
        cart_service::add_to_cart(
            &state,
            &customer,
            AddToCartRequest {
                product_id: submitted.product.id,
                variant_id,
                quantity,
            },
        )
        .await?;
    }

    let session = checkout_service::checkout(
        &state,
        &customer,
        CheckoutRequest {
            shipping_address: "Bole Road 12".into(),
            customer: CustomerDetails {
                first_name: "Abebe".into(),
                last_name: "Kebede".into(),
                email: customer.email.clone(),
                phone: None,
            },
        },
    )
    .await?
    .data
    .expect("checkout response");
    assert_eq!(session.total_amount, 2 * 1500 + 2500);

    let page = payment_service::render_page(&state, session.session_id).await?;
    assert!(page.contains(&session.transaction_ref));

    let paid = payment_service::handle_return(
        &state,
        session.session_id,
        RedirectParams {
            status: Some("success".into()),
            tx_ref: Some(session.transaction_ref.clone()),
        },
    )
    .await?
    .data
    .expect("payment outcome");
    let order = paid.order.expect("order written");
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.cart_items.len(), 2);

    // A repeated redirect returns the same order instead of writing another.
    let replay = payment_service::handle_return(
        &state,
        session.session_id,
        RedirectParams {
            status: Some("success".into()),
            tx_ref: Some(session.transaction_ref.clone()),
        },
    )
    .await?
    .data
    .expect("payment outcome");
    assert_eq!(replay.order.map(|o| o.id), Some(order.id));

    let (orders_for_ref,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM orders WHERE transaction_ref = $1")
            .bind(&session.transaction_ref)
            .fetch_one(&state.pool)
            .await?;
    assert_eq!(orders_for_ref, 1);

    let cart = cart_service::get_cart(&state, &customer).await?.data.expect("cart");
    assert!(cart.items.is_empty(), "cart is cleared once the order is written");

    let supplier_orders = order_service::list_orders(&state, &supplier, OrderListQuery::default())
        .await?
        .data
        .expect("orders");
    assert!(supplier_orders.items.iter().any(|o| o.id == order.id));

    // Reviews open only after delivery.
    let early = review_service::next_review(&state, &customer, order.id).await;
    assert!(early.is_err());

    let move_to = |status: &str| UpdateOrderStatusRequest {
        status: status.to_string(),
    };
    let skipped =
        order_service::update_order_status(&state, &courier, order.id, move_to("delivered")).await;
    assert!(skipped.is_err(), "pending orders cannot jump to delivered");

    order_service::update_order_status(&state, &supplier, order.id, move_to("accepted")).await?;
    order_service::update_order_status(&state, &supplier, order.id, move_to("shipped")).await?;
    let forbidden =
        order_service::update_order_status(&state, &customer, order.id, move_to("delivered")).await;
    assert!(matches!(forbidden, Err(AppError::Forbidden)));
    let delivered =
        order_service::update_order_status(&state, &courier, order.id, move_to("delivered"))
            .await?
            .data
            .expect("order");
    assert_eq!(delivered.status, OrderStatus::Delivered);

    let mut step = review_service::next_review(&state, &customer, order.id)
        .await?
        .data
        .expect("progress");
    assert_eq!(step.total_items, 2);
    while let Some(index) = step.next_index {
        step = review_service::submit_review(
            &state,
            &customer,
            order.id,
            SubmitReviewRequest {
                item_index: index,
                rating: 5,
                review_text: format!("line {index} arrived intact"),
            },
        )
        .await?
        .data
        .expect("progress");
    }
    assert!(step.completed);
    assert_eq!(step.reviewed, 2);

    let (reviews,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reviews WHERE order_id = $1")
        .bind(order.id)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(reviews, 2);

    let notifications =
        notification_service::list_notifications(&state, &customer, Pagination::default())
            .await?
            .data
            .expect("notifications");
    assert!(notifications.unread >= 1);

    Ok(())
}

/// A customer with one verified item in the cart and an open payment session for it.
async fn open_payment(state: &AppState, product_name: &str) -> anyhow::Result<(AuthUser, CheckoutResponse)> {
    let customer = register(state, Role::Customer).await?;
    let supplier = register(state, Role::Supplier).await?;
    let support = create_admin(state).await?;

    let product = supplier_service::submit_product(
        state,
        &supplier,
        submission(product_name, &[("Green", 900, 3)]),
    )
    .await?
    .data
    .expect("product detail");
    supplier_service::moderate_product(
        state,
        &support,
        product.product.id,
        ModerationRequest {
            status: ProductStatus::Verified,
        },
    )
    .await?;
    cart_service::add_to_cart(
        state,
        &customer,
        AddToCartRequest {
            product_id: product.product.id,
            variant_id: product.variants[0].id,
            quantity: 1,
        },
    )
    .await?;

    let session = checkout_service::checkout(
        state,
        &customer,
        CheckoutRequest {
            shipping_address: "Piassa 3".into(),
            customer: CustomerDetails {
                first_name: "Sara".into(),
                last_name: "Tesfaye".into(),
                email: customer.email.clone(),
                phone: Some("+251911111111".into()),
            },
        },
    )
    .await?
    .data
    .expect("checkout response");
    Ok((customer, session))
}

fn redirect(status: &str, tx_ref: &str) -> RedirectParams {
    RedirectParams {
        status: Some(status.into()),
        tx_ref: Some(tx_ref.into()),
    }
}

async fn orders_for(state: &AppState, tx_ref: &str) -> anyhow::Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE transaction_ref = $1")
        .bind(tx_ref)
        .fetch_one(&state.pool)
        .await?;
    Ok(count)
}

async fn session_state(state: &AppState, id: Uuid) -> anyhow::Result<String> {
    let (value,): (String,) = sqlx::query_as("SELECT state FROM payment_sessions WHERE id = $1")
        .bind(id)
        .fetch_one(&state.pool)
        .await?;
    Ok(value)
}

async fn backdate_session(state: &AppState, id: Uuid) -> anyhow::Result<()> {
    sqlx::query(
        "UPDATE payment_sessions SET last_activity_at = now() - interval '1 hour' WHERE id = $1",
    )
    .bind(id)
    .execute(&state.pool)
    .await?;
    Ok(())
}

#[tokio::test]
async fn declined_payment_writes_no_order() -> anyhow::Result<()> {
    let Some(database_url) = database_url() else {
        return Ok(());
    };
    let media = media_host().await;
    let state = setup_state(&database_url, &media.uri()).await?;
    let (customer, session) = open_payment(&state, "Declined Scarf").await?;

    let outcome = payment_service::handle_return(
        &state,
        session.session_id,
        redirect("cancelled", &session.transaction_ref),
    )
    .await?
    .data
    .expect("payment outcome");
    assert!(outcome.order.is_none());
    assert_eq!(outcome.gateway_status.as_deref(), Some("cancelled"));
    assert_eq!(orders_for(&state, &session.transaction_ref).await?, 0);
    assert_eq!(session_state(&state, session.session_id).await?, "failed");

    let cart = cart_service::get_cart(&state, &customer).await?.data.expect("cart");
    assert_eq!(cart.items.len(), 1, "cart survives a declined payment");

    Ok(())
}

#[tokio::test]
async fn foreign_reference_aborts_the_session_without_an_order() -> anyhow::Result<()> {
    let Some(database_url) = database_url() else {
        return Ok(());
    };
    let media = media_host().await;
    let state = setup_state(&database_url, &media.uri()).await?;
    let (_, session) = open_payment(&state, "Aborted Lamp").await?;

    let mismatch = payment_service::handle_return(
        &state,
        session.session_id,
        redirect("success", "SOMEONE-ELSES-REF"),
    )
    .await;
    let Err(err) = mismatch else {
        panic!("mismatched reference must be rejected");
    };
    assert!(matches!(err, AppError::Integrity(_)), "{err:?}");
    assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(session_state(&state, session.session_id).await?, "aborted");
    assert_eq!(orders_for(&state, &session.transaction_ref).await?, 0);
    assert_eq!(orders_for(&state, "SOMEONE-ELSES-REF").await?, 0);

    // The aborted session no longer accepts the genuine redirect either.
    let late = payment_service::handle_return(
        &state,
        session.session_id,
        redirect("success", &session.transaction_ref),
    )
    .await;
    assert!(matches!(late, Err(AppError::Conflict(_))));
    assert_eq!(orders_for(&state, &session.transaction_ref).await?, 0);

    Ok(())
}

#[tokio::test]
async fn redirect_after_inactivity_expires_the_session() -> anyhow::Result<()> {
    let Some(database_url) = database_url() else {
        return Ok(());
    };
    let media = media_host().await;
    let state = setup_state(&database_url, &media.uri()).await?;
    let (_, session) = open_payment(&state, "Expired Mug").await?;
    backdate_session(&state, session.session_id).await?;

    let outcome = payment_service::handle_return(
        &state,
        session.session_id,
        redirect("success", &session.transaction_ref),
    )
    .await;
    assert!(matches!(outcome, Err(AppError::SessionExpired)));
    assert_eq!(session_state(&state, session.session_id).await?, "expired");
    assert_eq!(orders_for(&state, &session.transaction_ref).await?, 0);

    let page = payment_service::render_page(&state, session.session_id).await;
    assert!(matches!(page, Err(AppError::SessionExpired)));

    Ok(())
}

#[tokio::test]
async fn sweeper_expires_only_idle_pending_sessions() -> anyhow::Result<()> {
    let Some(database_url) = database_url() else {
        return Ok(());
    };
    let media = media_host().await;
    let state = setup_state(&database_url, &media.uri()).await?;
    let (_, idle) = open_payment(&state, "Idle Pot").await?;
    let (_, active) = open_payment(&state, "Active Pan").await?;
    backdate_session(&state, idle.session_id).await?;

    let expired =
        payment_service::expire_stale_sessions(&state.orm, Duration::minutes(15), Utc::now())
            .await?;
    assert!(expired >= 1);
    assert_eq!(session_state(&state, idle.session_id).await?, "expired");
    assert_eq!(session_state(&state, active.session_id).await?, "pending");

    Ok(())
}

#[tokio::test]
async fn replayed_redirect_with_a_foreign_reference_is_rejected() -> anyhow::Result<()> {
    let Some(database_url) = database_url() else {
        return Ok(());
    };
    let media = media_host().await;
    let state = setup_state(&database_url, &media.uri()).await?;
    let (_, session) = open_payment(&state, "Replay Rug").await?;

    let paid = payment_service::handle_return(
        &state,
        session.session_id,
        redirect("success", &session.transaction_ref),
    )
    .await?
    .data
    .expect("payment outcome");
    assert!(paid.order.is_some());

    let replay = payment_service::handle_return(
        &state,
        session.session_id,
        redirect("success", "SOMEONE-ELSES-REF"),
    )
    .await;
    assert!(matches!(replay, Err(AppError::Integrity(_))));
    assert_eq!(session_state(&state, session.session_id).await?, "completed");
    assert_eq!(orders_for(&state, &session.transaction_ref).await?, 1);

    Ok(())
}
