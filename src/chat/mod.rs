//! Conversation state reconciliation.
//!
//! `ChatView` keeps the conversation list, the active thread and unread
//! counts consistent across user actions, server responses and push events.
//! It is a pure state machine: callers feed it inputs and execute the
//! `Effect`s it returns, then feed the results back in.

pub mod cache;
pub mod draft;
pub mod view;

use async_trait::async_trait;

use crate::api::client::{ApiError, T2rClient};
use crate::api::{list_chats_data, read_messages_data, send_message_with_client};
use crate::models::{Conversation, Message};

pub use draft::Draft;
pub use view::{ChatView, Effect};

/// The backend operations the chat view depends on.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Full conversation list with unread counts
    async fn conversations(&self) -> Result<Vec<Conversation>, ApiError>;

    /// Full thread for one conversation, oldest first
    async fn thread(&self, chat_id: &str) -> Result<Vec<Message>, ApiError>;

    /// Submit a message to a conversation
    async fn send(&self, chat_id: &str, content: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl ChatBackend for T2rClient {
    async fn conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        list_chats_data(self).await
    }

    async fn thread(&self, chat_id: &str) -> Result<Vec<Message>, ApiError> {
        read_messages_data(self, chat_id).await
    }

    async fn send(&self, chat_id: &str, content: &str) -> Result<(), ApiError> {
        send_message_with_client(self, chat_id, content).await
    }
}
