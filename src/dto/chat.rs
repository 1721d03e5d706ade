use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::ChatMessage;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PostMessageRequest {
    #[serde(default)]
    pub body: String,
    pub attachment_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatHistory {
    pub thread: String,
    pub items: Vec<ChatMessage>,
}
