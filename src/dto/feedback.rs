use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Feedback;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateFeedbackRequest {
    pub category: String,
    pub rating: i32,
    pub message: String,
    pub image_url: Option<String>,
    pub product_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FeedbackList {
    pub items: Vec<Feedback>,
}
