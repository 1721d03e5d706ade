use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::LineItem;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitReviewRequest {
    pub item_index: usize,
    pub rating: i32,
    #[serde(default)]
    pub review_text: String,
}

/// Where a delivered order stands in its review flow.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewProgress {
    pub completed: bool,
    pub total_items: usize,
    pub reviewed: usize,
    pub next_index: Option<usize>,
    pub next_item: Option<LineItem>,
    pub product_id: Option<Uuid>,
    /// Set when the flow cannot continue past `next_index`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted: Option<String>,
}
