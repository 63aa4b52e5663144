//! Chat endpoints: conversation list, message threads, sending, chat creation.

use anyhow::Result;

use super::client::{ApiError, T2rClient};
use crate::models::{
    sort_chronologically, Conversation, CreateChatRequest, Message, SendMessageRequest,
};

/// Truncate a preview to `max` characters, appending "..." when cut.
pub fn preview(text: &str, max: usize) -> String {
    let text = text.trim().replace('\n', " ");
    if text.chars().count() <= max {
        return text;
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}

/// List conversations (prints to stdout).
pub async fn list_chats() -> Result<()> {
    let client = T2rClient::load()?;
    let chats = list_chats_data(&client).await?;

    println!("\nConversations:");
    println!("{:-<60}", "");

    if chats.is_empty() {
        println!("  (no conversations yet -- try 't2r-cli search')");
        return Ok(());
    }

    for chat in &chats {
        if chat.unread_messages > 0 {
            println!("{} ({} unread)", chat.name, chat.unread_messages);
        } else {
            println!("{}", chat.name);
        }
        println!("  ID: {}", chat.id);
        if let Some(ref last) = chat.last_message {
            if !last.trim().is_empty() {
                println!("  Last: {}", preview(last, 80));
            }
        }
        println!();
    }

    Ok(())
}

/// Read the full thread of a conversation (prints to stdout).
pub async fn read_messages(chat_id: &str) -> Result<()> {
    let client = T2rClient::load()?;
    let msgs = read_messages_data(&client, chat_id).await?;

    if msgs.is_empty() {
        println!("(no messages)");
        return Ok(());
    }

    for msg in &msgs {
        let who = if msg.is_sender { "me" } else { "them" };
        let seen = if msg.read { "read" } else { "unread" };
        println!(
            "[{}] {} ({}): {}",
            msg.created_at.format("%d/%m/%Y %H:%M"),
            who,
            seen,
            msg.content
        );
    }

    Ok(())
}

/// Send a message (prints confirmation).
pub async fn send_message(chat_id: &str, message: &str) -> Result<()> {
    let client = T2rClient::load()?;
    send_message_with_client(&client, chat_id, message).await?;
    println!("Message sent.");
    Ok(())
}

/// Start a conversation with an interlocutor (prints the new chat id when returned).
pub async fn create_chat(interlocutor_id: &str) -> Result<()> {
    let client = T2rClient::load()?;
    match create_chat_with_client(&client, interlocutor_id).await? {
        Some(id) => println!("Chat created. ID: {}", id),
        None => println!("Chat created."),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Data-returning API functions
// ---------------------------------------------------------------------------

/// `GET /chats`
pub async fn list_chats_data(client: &T2rClient) -> Result<Vec<Conversation>, ApiError> {
    client.get_json("/chats").await
}

/// `GET /chats/messages/{id}`, sorted oldest first.
pub async fn read_messages_data(
    client: &T2rClient,
    chat_id: &str,
) -> Result<Vec<Message>, ApiError> {
    if chat_id.trim().is_empty() {
        return Err(ApiError::InvalidArgument("conversation id must not be empty"));
    }
    let path = format!("/chats/messages/{}", encode_segment(chat_id));
    let mut messages: Vec<Message> = client.get_json(&path).await?;
    sort_chronologically(&mut messages);
    Ok(messages)
}

/// `POST /chats/messages/send`
pub async fn send_message_with_client(
    client: &T2rClient,
    chat_id: &str,
    content: &str,
) -> Result<(), ApiError> {
    if chat_id.trim().is_empty() {
        return Err(ApiError::InvalidArgument("conversation id must not be empty"));
    }
    if content.trim().is_empty() {
        return Err(ApiError::InvalidArgument("message must not be empty"));
    }
    let body = SendMessageRequest {
        content: content.to_string(),
        chat_id: chat_id.to_string(),
    };
    client.post("/chats/messages/send", &body).await?;
    Ok(())
}

/// `POST /chats`. Returns the new chat id when the server echoes one.
pub async fn create_chat_with_client(
    client: &T2rClient,
    interlocutor_id: &str,
) -> Result<Option<String>, ApiError> {
    if interlocutor_id.trim().is_empty() {
        return Err(ApiError::InvalidArgument("interlocutor id must not be empty"));
    }
    let body = CreateChatRequest {
        receiver_id: interlocutor_id.to_string(),
    };
    let text = client.post("/chats", &body).await?;
    Ok(created_chat_id(&text))
}

/// Pull an `id` out of a create-chat response body, if there is one.
fn created_chat_id(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    match v.get("id")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Percent-encode an id for use as a single path segment.
fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
