pub mod auth_service;
pub mod cart_service;
pub mod catalog_service;
pub mod chat_service;
pub mod checkout_service;
pub mod feedback_service;
pub mod notification_service;
pub mod order_service;
pub mod payment_service;
pub mod profile_service;
pub mod review_service;
pub mod supplier_service;
