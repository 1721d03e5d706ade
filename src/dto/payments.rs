use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Order;

#[derive(Debug, Deserialize, ToSchema)]
pub struct NavigationRequest {
    pub url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionStatus {
    pub session_id: Uuid,
    pub transaction_ref: String,
    pub state: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of observing a redirect or navigation.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentOutcome {
    pub state: String,
    /// `false` when a navigation did not reach the return URL.
    pub redirect_observed: bool,
    pub gateway_status: Option<String>,
    pub order: Option<Order>,
}
