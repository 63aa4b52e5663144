//! Async backend: runs API calls off the UI loop.
//!
//! Uses an mpsc channel pair. The TUI sends `BackendCommand` values, and a
//! background tokio task executes each one in its own task and sends the
//! `BackendResponse` back, tagged so the view can drop superseded results.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::api::client::ApiError;
use crate::cache::Generation;
use crate::chat::ChatBackend;
use crate::models::{Conversation, Message, Profile};
use crate::profile::ProfileBackend;

/// Commands sent from the TUI event loop to the async backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    LoadConversations { generation: Generation },
    LoadThread { chat_id: String, generation: u64 },
    SendMessage { chat_id: String, content: String },
    LoadProfile,
}

/// Responses from the async backend to the TUI.
#[derive(Debug)]
pub enum BackendResponse {
    Conversations {
        generation: Generation,
        result: Result<Vec<Conversation>, ApiError>,
    },
    Thread {
        chat_id: String,
        generation: u64,
        result: Result<Vec<Message>, ApiError>,
    },
    MessageSent {
        chat_id: String,
        content: String,
        result: Result<(), ApiError>,
    },
    Profile(Result<Profile, ApiError>),
}

/// Handle for interacting with the backend from the TUI side.
pub struct Backend {
    cmd_tx: mpsc::UnboundedSender<BackendCommand>,
    resp_rx: mpsc::UnboundedReceiver<BackendResponse>,
}

impl Backend {
    /// Start the backend. Spawns a tokio task that processes commands.
    pub fn start(chat: Arc<dyn ChatBackend>, profile: Arc<dyn ProfileBackend>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();

        tokio::spawn(backend_loop(chat, profile, cmd_rx, resp_tx));

        Self { cmd_tx, resp_rx }
    }

    /// Send a command to the backend (non-blocking).
    pub fn send(&self, cmd: BackendCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            tracing::error!("Backend channel closed -- command dropped");
        }
    }

    /// Next response. `None` once the backend task is gone.
    pub async fn recv(&mut self) -> Option<BackendResponse> {
        self.resp_rx.recv().await
    }
}

async fn backend_loop(
    chat: Arc<dyn ChatBackend>,
    profile: Arc<dyn ProfileBackend>,
    mut cmd_rx: mpsc::UnboundedReceiver<BackendCommand>,
    resp_tx: mpsc::UnboundedSender<BackendResponse>,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        let chat = Arc::clone(&chat);
        let profile = Arc::clone(&profile);
        let resp_tx = resp_tx.clone();

        // In-flight requests are never aborted; stale answers are dropped by the view.
        tokio::spawn(async move {
            let resp = match cmd {
                BackendCommand::LoadConversations { generation } => {
                    BackendResponse::Conversations {
                        generation,
                        result: chat.conversations().await,
                    }
                }
                BackendCommand::LoadThread {
                    chat_id,
                    generation,
                } => {
                    let result = chat.thread(&chat_id).await;
                    BackendResponse::Thread {
                        chat_id,
                        generation,
                        result,
                    }
                }
                BackendCommand::SendMessage { chat_id, content } => {
                    let result = chat.send(&chat_id, &content).await;
                    BackendResponse::MessageSent {
                        chat_id,
                        content,
                        result,
                    }
                }
                BackendCommand::LoadProfile => BackendResponse::Profile(profile.fetch_profile().await),
            };
            let _ = resp_tx.send(resp);
        });
    }
}
