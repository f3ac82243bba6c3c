use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Chat, Message};

#[derive(Deserialize, ToSchema)]
pub struct UpdateChatRequest {
    pub title: String,
}

#[derive(Serialize)]
pub struct ChatWithMessages {
    pub chat: Chat,
    pub messages: Vec<Message>,
}

#[derive(Serialize)]
pub struct SendMessageResponse {
    pub chat_id: Uuid,
    pub user_message: Message,
    pub ai_message: Message,
    /// Best-effort side-channel failures (attachment full-text persistence)
    /// that did not abort the request.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}
