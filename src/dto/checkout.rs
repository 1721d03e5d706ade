use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::CustomerDetails;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub shipping_address: String,
    pub customer: CustomerDetails,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub session_id: Uuid,
    pub transaction_ref: String,
    pub total_amount: i64,
    pub currency: String,
    /// Page the client opens in its web view.
    pub payment_page_url: String,
    pub expires_at: DateTime<Utc>,
}
