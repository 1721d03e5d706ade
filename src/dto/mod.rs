pub mod auth;
pub mod cart;
pub mod chat;
pub mod checkout;
pub mod feedback;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod products;
pub mod profile;
pub mod reviews;
