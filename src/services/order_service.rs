use std::collections::BTreeSet;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, DbBackend,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
    TransactionTrait,
    sea_query::{Expr, LockType, Query},
};
use uuid::Uuid;

use crate::{
    audit,
    domain::checkout::OrderDraft,
    dto::orders::{OrderList, UpdateOrderStatusRequest},
    entity::{
        order_suppliers::{
            ActiveModel as OrderSupplierActive, Column as OrderSupplierCol,
            Entity as OrderSuppliers,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Column as ProdCol, Entity as Products},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{LineItem, NotificationKind, Order, OrderStatus, Role},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::notification_service::notify_quietly,
    state::AppState,
};

pub const PAYMENT_METHOD: &str = "hosted_checkout";
pub const PAYMENT_SUCCESS: &str = "success";

/// What the order writer produced for one transaction reference.
pub struct WrittenOrder {
    pub order: OrderModel,
    pub supplier_ids: Vec<Uuid>,
    /// `false` when an order with this reference already existed.
    pub created: bool,
}

/// Writes the single order for a verified payment inside the caller's
/// transaction: order row, supplier links and cart reset.
///
/// A second call for the same reference returns the existing order.
pub async fn write_paid_order(
    txn: &DatabaseTransaction,
    user_id: Uuid,
    draft: &OrderDraft,
) -> AppResult<WrittenOrder> {
    if let Some(existing) = Orders::find()
        .filter(OrderCol::TransactionRef.eq(draft.transaction_ref.as_str()))
        .one(txn)
        .await?
    {
        let supplier_ids = supplier_ids_of(txn, existing.id).await?;
        return Ok(WrittenOrder {
            order: existing,
            supplier_ids,
            created: false,
        });
    }

    let user = Users::find_by_id(user_id)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let product_ids: BTreeSet<Uuid> = draft
        .cart_items
        .iter()
        .filter_map(LineItem::product_id)
        .collect();
    let supplier_ids: Vec<Uuid> = if product_ids.is_empty() {
        Vec::new()
    } else {
        Products::find()
            .select_only()
            .column(ProdCol::SupplierId)
            .distinct()
            .filter(ProdCol::Id.is_in(product_ids))
            .into_tuple::<Uuid>()
            .all(txn)
            .await?
    };

    let to_json = |value: serde_json::Result<serde_json::Value>| {
        value.map_err(|e| AppError::Internal(anyhow::anyhow!(e)))
    };

    let now = Utc::now();
    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        user_email: Set(user.email),
        cart_items: Set(to_json(serde_json::to_value(&draft.cart_items))?),
        shipping_address: Set(draft.shipping_address.clone()),
        customer_details: Set(to_json(serde_json::to_value(&draft.customer))?),
        total_amount: Set(draft.total_amount),
        currency: Set(draft.currency.clone()),
        transaction_ref: Set(draft.transaction_ref.clone()),
        payment_method: Set(PAYMENT_METHOD.to_string()),
        payment_status: Set(PAYMENT_SUCCESS.to_string()),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(txn)
    .await?;

    if !supplier_ids.is_empty() {
        OrderSuppliers::insert_many(supplier_ids.iter().map(|supplier_id| OrderSupplierActive {
            order_id: Set(order.id),
            supplier_id: Set(*supplier_id),
        }))
        .exec(txn)
        .await?;
    }

    txn.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        "UPDATE carts SET items = '[]'::jsonb, updated_at = now() WHERE user_id = $1",
        [user_id.into()],
    ))
    .await?;

    Ok(WrittenOrder {
        order,
        supplier_ids,
        created: true,
    })
}

/// Notifications for a freshly written order; sent after commit.
pub async fn announce_order(state: &AppState, written: &WrittenOrder) {
    let order = &written.order;
    notify_quietly(
        state,
        order.user_id,
        NotificationKind::Order,
        "Order placed",
        &format!(
            "Your order {} for {} {} was received.",
            order.transaction_ref, order.total_amount, order.currency
        ),
    )
    .await;
    for supplier_id in &written.supplier_ids {
        notify_quietly(
            state,
            *supplier_id,
            NotificationKind::Order,
            "New order",
            &format!("Order {} includes your products.", order.transaction_ref),
        )
        .await;
    }
}

async fn supplier_ids_of<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> AppResult<Vec<Uuid>> {
    let ids = OrderSuppliers::find()
        .select_only()
        .column(OrderSupplierCol::SupplierId)
        .filter(OrderSupplierCol::OrderId.eq(order_id))
        .into_tuple::<Uuid>()
        .all(conn)
        .await?;
    Ok(ids)
}

fn supplier_orders(supplier_id: Uuid) -> sea_orm::sea_query::SelectStatement {
    Query::select()
        .column(OrderSupplierCol::OrderId)
        .from(OrderSuppliers)
        .and_where(Expr::col(OrderSupplierCol::SupplierId).eq(supplier_id))
        .to_owned()
}

/// Orders visible to the caller: customers see their own, suppliers the
/// orders containing their products, delivery staff the accepted and shipped
/// queue, admins everything.
pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();
    match user.role {
        Role::Customer => condition = condition.add(OrderCol::UserId.eq(user.user_id)),
        Role::Supplier => {
            condition = condition.add(OrderCol::Id.in_subquery(supplier_orders(user.user_id)))
        }
        Role::Delivery if query.status.is_none() => {
            condition = condition.add(OrderCol::Status.is_in([
                OrderStatus::Accepted.as_str(),
                OrderStatus::Shipped.as_str(),
            ]))
        }
        Role::Delivery | Role::Admin => {}
    }
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        let status: OrderStatus = status.parse()?;
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::success(
        "Ok",
        OrderList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

/// Loads an order the caller is allowed to see.
pub async fn find_visible_order<C: ConnectionTrait>(
    conn: &C,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<OrderModel> {
    let order = Orders::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_visible(conn, user, &order).await?;
    Ok(order)
}

async fn ensure_visible<C: ConnectionTrait>(
    conn: &C,
    user: &AuthUser,
    order: &OrderModel,
) -> AppResult<()> {
    let visible = match user.role {
        Role::Admin | Role::Delivery => true,
        Role::Customer => order.user_id == user.user_id,
        Role::Supplier => supplier_ids_of(conn, order.id)
            .await?
            .contains(&user.user_id),
    };
    if visible { Ok(()) } else { Err(AppError::NotFound) }
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let order = find_visible_order(&state.orm, user, id).await?;
    Ok(ApiResponse::success("OK", order_from_entity(order)?, Some(Meta::empty())))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    let target: OrderStatus = payload.status.parse()?;

    let txn = state.orm.begin().await?;
    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_visible(&txn, user, &order).await?;

    let current: OrderStatus = order.status.parse()?;
    let next = current.transition(target, user.role)?;

    let mut active: OrderActive = order.into();
    active.status = Set(next.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;
    txn.commit().await?;

    tracing::info!(order_id = %order.id, from = %current, to = %next, role = %user.role, "order status changed");
    audit::record(
        &state.pool,
        user.user_id,
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "from": current, "to": next }),
    )
    .await;
    notify_quietly(
        state,
        order.user_id,
        NotificationKind::Status,
        "Order update",
        &format!("Order {} is now {}.", order.transaction_ref, next),
    )
    .await;

    Ok(ApiResponse::success(
        "Order status updated",
        order_from_entity(order)?,
        Some(Meta::empty()),
    ))
}

pub fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    let internal = |e: serde_json::Error| AppError::Internal(anyhow::anyhow!(e));
    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        user_email: model.user_email,
        cart_items: serde_json::from_value(model.cart_items).map_err(internal)?,
        shipping_address: model.shipping_address,
        customer_details: serde_json::from_value(model.customer_details).map_err(internal)?,
        total_amount: model.total_amount,
        currency: model.currency,
        transaction_ref: model.transaction_ref,
        payment_method: model.payment_method,
        payment_status: model.payment_status,
        status: model.status.parse()?,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}
