//! Pure workflow rules. Nothing in here touches the database or the network.

pub mod checkout;
pub mod handshake;
pub mod order_status;
pub mod review_flow;
pub mod submission;
