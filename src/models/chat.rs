//! Conversation models

use serde::{Deserialize, Serialize};

/// A chat thread between the signed-in user and one counterpart, as listed by `GET /chats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    /// Counterpart display name
    pub name: String,
    #[serde(default)]
    pub profile_picture: Option<String>,
    /// Counterpart contact address
    #[serde(default)]
    pub email: Option<String>,
    /// Preview of the most recent message
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub unread_messages: u32,
}

/// Body of `POST /chats`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatRequest {
    pub receiver_id: String,
}

/// Body of `POST /chats/messages/send`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub content: String,
    pub chat_id: String,
}
