use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod auth;
pub mod cart;
pub mod chat;
pub mod checkout;
pub mod doc;
pub mod feedback;
pub mod health;
pub mod notifications;
pub mod orders;
pub mod params;
pub mod payments;
pub mod products;
pub mod profile;
pub mod reviews;
pub mod supplier;
pub mod uploads;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/profile", profile::router())
        .nest("/products", products::router())
        .nest("/cart", cart::router())
        .nest("/checkout", checkout::router())
        .nest("/payments", payments::router())
        .nest("/orders", orders::router().merge(reviews::router()))
        .nest("/supplier", supplier::router())
        .nest("/admin", admin::router())
        .nest("/notifications", notifications::router())
        .nest("/chat", chat::router())
        .nest("/feedback", feedback::router())
        .nest("/uploads", uploads::router())
}
