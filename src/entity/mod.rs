pub mod order_suppliers;
pub mod orders;
pub mod payment_sessions;
pub mod products;
pub mod reviews;
pub mod users;

pub use order_suppliers::Entity as OrderSuppliers;
pub use orders::Entity as Orders;
pub use payment_sessions::Entity as PaymentSessions;
pub use products::Entity as Products;
pub use reviews::Entity as Reviews;
pub use users::Entity as Users;
