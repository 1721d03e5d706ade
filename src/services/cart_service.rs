use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    audit,
    db::DbPool,
    domain::checkout::cart_total,
    dto::cart::AddToCartRequest,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Cart, LineItem, ProductStatus, VariantSnapshot},
    response::ApiResponse,
    services::catalog_service::{find_product, find_variant},
    state::AppState,
};

pub async fn load_items(pool: &DbPool, user_id: Uuid) -> AppResult<Vec<LineItem>> {
    let row: Option<(Json<Vec<LineItem>>,)> =
        sqlx::query_as("SELECT items FROM carts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|(items,)| items.0).unwrap_or_default())
}

fn summarize(user_id: Uuid, items: Vec<LineItem>) -> AppResult<Cart> {
    let total_amount = if items.is_empty() {
        0
    } else {
        cart_total(&items)?
    };
    Ok(Cart {
        user_id,
        items,
        total_amount,
    })
}

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Cart>> {
    let items = load_items(&state.pool, user.user_id).await?;
    Ok(ApiResponse::ok(summarize(user.user_id, items)?))
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<Cart>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let product = find_product(state, payload.product_id).await?;
    if product.status != ProductStatus::Verified {
        return Err(AppError::BadRequest("product is not available".to_string()));
    }
    let variant = find_variant(&state.pool, product.id, payload.variant_id)
        .await?
        .ok_or_else(|| AppError::BadRequest("variant not found".to_string()))?;
    if variant.stock < payload.quantity {
        return Err(AppError::BadRequest(format!(
            "only {} left in stock",
            variant.stock
        )));
    }

    let line = LineItem {
        item_id: LineItem::compose_item_id(product.id, Some(variant.id)),
        name: product.name,
        price: variant.price,
        quantity: payload.quantity,
        variant: Some(VariantSnapshot {
            variant_id: variant.id,
            attribute_values: variant.attribute_values,
            image_url: Some(variant.image_url),
        }),
    };

    let (items,): (Json<Vec<LineItem>>,) = sqlx::query_as(
        r#"
        INSERT INTO carts (user_id, items, updated_at)
        VALUES ($1, $2, now())
        ON CONFLICT (user_id)
        DO UPDATE SET items = carts.items || EXCLUDED.items, updated_at = now()
        RETURNING items
        "#,
    )
    .bind(user.user_id)
    .bind(Json(vec![line]))
    .fetch_one(&state.pool)
    .await?;

    audit::record(
        &state.pool,
        user.user_id,
        "cart_add",
        "carts",
        serde_json::json!({
            "product_id": payload.product_id,
            "variant_id": payload.variant_id,
            "quantity": payload.quantity,
        }),
    )
    .await;

    Ok(ApiResponse::success(
        "Added to cart",
        summarize(user.user_id, items.0)?,
        None,
    ))
}

pub async fn remove_line(
    state: &AppState,
    user: &AuthUser,
    index: usize,
) -> AppResult<ApiResponse<Cart>> {
    let index = i32::try_from(index)
        .map_err(|_| AppError::BadRequest("line index out of range".to_string()))?;
    let row: Option<(Json<Vec<LineItem>>,)> = sqlx::query_as(
        r#"
        UPDATE carts
        SET items = items - $2, updated_at = now()
        WHERE user_id = $1 AND jsonb_array_length(items) > $2
        RETURNING items
        "#,
    )
    .bind(user.user_id)
    .bind(index)
    .fetch_optional(&state.pool)
    .await?;

    let (items,) = row.ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success(
        "Removed from cart",
        summarize(user.user_id, items.0)?,
        None,
    ))
}

pub async fn clear_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Cart>> {
    sqlx::query("UPDATE carts SET items = '[]'::jsonb, updated_at = now() WHERE user_id = $1")
        .bind(user.user_id)
        .execute(&state.pool)
        .await?;

    Ok(ApiResponse::success(
        "Cart cleared",
        summarize(user.user_id, Vec::new())?,
        None,
    ))
}
