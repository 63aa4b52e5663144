//! Chat view coordinator.

use crate::api::client::ApiError;
use crate::cache::Generation;
use crate::config::DEFAULT_NOTIFICATION_VOLUME;
use crate::models::{sort_chronologically, Conversation, Message};
use crate::push::PushEvent;

use super::cache::ConversationCache;
use super::draft::Draft;

/// Work the driver must perform on behalf of the view.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchConversations { generation: Generation },
    FetchThread { chat_id: String, generation: u64 },
    SendMessage { chat_id: String, content: String },
    Notify { volume: f32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub text: String,
    pub is_error: bool,
}

impl StatusLine {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// Selection, conversation list, active thread and compose state of the chat screen.
///
/// Every input returns the effects it needs; nothing here performs I/O.
#[derive(Debug)]
pub struct ChatView {
    conversations: ConversationCache,
    /// Conversation requested at startup; dropped on the first explicit selection.
    route_chat_id: Option<String>,
    selected: Option<String>,
    thread: Vec<Message>,
    thread_loading: bool,
    thread_generation: u64,
    scroll_epoch: u64,
    status: Option<StatusLine>,
    draft: Draft,
    /// Unsent text and the conversation it was meant for.
    failed_draft: Option<(String, String)>,
    volume: f32,
}

impl ChatView {
    pub fn new(route_chat_id: Option<String>) -> Self {
        Self {
            conversations: ConversationCache::new(),
            route_chat_id: route_chat_id.filter(|id| !id.trim().is_empty()),
            selected: None,
            thread: Vec::new(),
            thread_loading: false,
            thread_generation: 0,
            scroll_epoch: 0,
            status: None,
            draft: Draft::default(),
            failed_draft: None,
            volume: DEFAULT_NOTIFICATION_VOLUME,
        }
    }

    pub fn with_notification_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }

    /// Initial load of the conversation list.
    pub fn start(&mut self) -> Vec<Effect> {
        match self.conversations.list() {
            (Some(generation), _) => vec![Effect::FetchConversations { generation }],
            (None, _) => Vec::new(),
        }
    }

    /// A conversation list fetch finished.
    pub fn conversations_loaded(
        &mut self,
        generation: Generation,
        result: Result<Vec<Conversation>, ApiError>,
    ) -> Vec<Effect> {
        match result {
            Ok(list) => {
                if !self.conversations.apply(generation, list) {
                    tracing::debug!("Dropping superseded conversation list #{}", generation.value());
                    return Vec::new();
                }
                if let Some(id) = self.selected.clone() {
                    self.conversations.mark_read(&id);
                }
                self.reconcile_selection()
            }
            Err(e) => {
                if self.conversations.fail(generation) {
                    tracing::warn!("Failed to load conversations: {}", e);
                    self.status = Some(StatusLine::error(format!(
                        "Could not load conversations: {}",
                        e
                    )));
                }
                Vec::new()
            }
        }
    }

    /// Explicit user selection.
    pub fn select(&mut self, chat_id: &str) -> Vec<Effect> {
        if !self.conversations.contains(chat_id) {
            tracing::debug!("Ignoring selection of unknown conversation {}", chat_id);
            return Vec::new();
        }
        self.route_chat_id = None;
        self.open(chat_id.to_string())
    }

    fn reconcile_selection(&mut self) -> Vec<Effect> {
        if let Some(id) = &self.selected {
            if self.conversations.contains(id) {
                return Vec::new();
            }
        }

        let next = self
            .route_chat_id
            .as_deref()
            .filter(|id| self.conversations.contains(id))
            .or_else(|| self.conversations.entries().first().map(|c| c.id.as_str()))
            .map(String::from);

        match next {
            Some(id) => self.open(id),
            None => {
                self.selected = None;
                self.thread.clear();
                self.thread_loading = false;
                Vec::new()
            }
        }
    }

    fn open(&mut self, chat_id: String) -> Vec<Effect> {
        if self.selected.as_deref() != Some(chat_id.as_str()) {
            self.thread.clear();
        }
        self.conversations.mark_read(&chat_id);
        self.selected = Some(chat_id.clone());

        let generation = self.conversations.invalidate();
        vec![
            Effect::FetchConversations { generation },
            self.reload_thread(chat_id),
        ]
    }

    fn reload_thread(&mut self, chat_id: String) -> Effect {
        self.thread_generation += 1;
        self.thread_loading = true;
        Effect::FetchThread {
            chat_id,
            generation: self.thread_generation,
        }
    }

    /// A thread fetch finished. Returns false when the response was superseded.
    pub fn thread_loaded(
        &mut self,
        chat_id: &str,
        generation: u64,
        result: Result<Vec<Message>, ApiError>,
    ) -> bool {
        if self.selected.as_deref() != Some(chat_id) || generation != self.thread_generation {
            tracing::debug!("Dropping superseded thread {} #{}", chat_id, generation);
            return false;
        }
        self.thread_loading = false;

        match result {
            Ok(mut messages) => {
                sort_chronologically(&mut messages);
                self.thread = messages;
                self.scroll_epoch += 1;
            }
            Err(e) => {
                tracing::warn!("Failed to load messages for {}: {}", chat_id, e);
                self.status = Some(StatusLine::error(format!("Could not load messages: {}", e)));
            }
        }
        true
    }

    /// A new message landed in some conversation.
    pub fn push_received(&mut self, event: &PushEvent) -> Vec<Effect> {
        let generation = self.conversations.invalidate();
        let mut effects = vec![Effect::FetchConversations { generation }];

        if self.selected.as_deref() == Some(event.chat_id.as_str()) {
            self.conversations.mark_read(&event.chat_id);
            effects.push(self.reload_thread(event.chat_id.clone()));
        } else {
            if !self.conversations.contains(&event.chat_id) {
                tracing::debug!("Push for conversation {} not in the list yet", event.chat_id);
            }
            effects.push(Effect::Notify {
                volume: self.volume,
            });
        }
        effects
    }

    /// Refetch the list and the open thread, e.g. after missed push events.
    pub fn refresh(&mut self) -> Vec<Effect> {
        let generation = self.conversations.invalidate();
        let mut effects = vec![Effect::FetchConversations { generation }];
        if let Some(id) = self.selected.clone() {
            effects.push(self.reload_thread(id));
        }
        effects
    }

    /// Submit the draft to the selected conversation.
    pub fn send(&mut self) -> Vec<Effect> {
        let Some(chat_id) = self.selected.clone() else {
            return Vec::new();
        };
        match self.draft.take() {
            Some(content) => {
                self.status = Some(StatusLine::info("Sending..."));
                vec![Effect::SendMessage { chat_id, content }]
            }
            None => Vec::new(),
        }
    }

    /// A send finished, successfully or not.
    pub fn send_completed(
        &mut self,
        chat_id: &str,
        content: String,
        result: Result<(), ApiError>,
    ) -> Vec<Effect> {
        match result {
            Ok(()) => {
                self.status = None;
            }
            Err(e) => {
                tracing::warn!("Failed to send message to {}: {}", chat_id, e);
                self.failed_draft = Some((chat_id.to_string(), content));
                self.status = Some(StatusLine::error(format!(
                    "Message not sent: {}. Ctrl+R restores it.",
                    e
                )));
            }
        }

        let generation = self.conversations.invalidate();
        let mut effects = vec![Effect::FetchConversations { generation }];
        if self.selected.as_deref() == Some(chat_id) {
            effects.push(self.reload_thread(chat_id.to_string()));
        }
        effects
    }

    /// Put the last unsent message back into an empty compose box, but only
    /// while the conversation it was meant for is open.
    pub fn restore_failed_draft(&mut self) -> bool {
        if !self.draft.is_blank() || !self.has_failed_draft() {
            return false;
        }
        match self.failed_draft.take() {
            Some((_, text)) => {
                self.draft.set(text);
                self.status = None;
                true
            }
            None => false,
        }
    }

    pub fn conversations(&self) -> &[Conversation] {
        self.conversations.entries()
    }

    /// True only while the first list fetch is still in flight.
    pub fn is_list_loading(&self) -> bool {
        !self.conversations.is_loaded() && self.conversations.is_fetching()
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected_conversation(&self) -> Option<&Conversation> {
        self.selected.as_deref().and_then(|id| self.conversations.get(id))
    }

    pub fn messages(&self) -> &[Message] {
        &self.thread
    }

    pub fn is_thread_loading(&self) -> bool {
        self.thread_loading
    }

    pub fn status(&self) -> Option<&StatusLine> {
        self.status.as_ref()
    }

    /// Bumped on every applied thread update.
    pub fn scroll_epoch(&self) -> u64 {
        self.scroll_epoch
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut Draft {
        &mut self.draft
    }

    /// Whether an unsent message for the open conversation can be restored.
    pub fn has_failed_draft(&self) -> bool {
        match (&self.failed_draft, &self.selected) {
            (Some((chat_id, _)), Some(selected)) => chat_id == selected,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn conv(id: &str, unread: u32) -> Conversation {
        Conversation {
            id: id.to_string(),
            name: format!("Person {}", id),
            profile_picture: None,
            email: None,
            last_message: Some("oi".to_string()),
            unread_messages: unread,
        }
    }

    fn msg(id: &str, minute: u32) -> Message {
        Message {
            id: id.to_string(),
            content: format!("message {}", id),
            read: true,
            reply_to: None,
            is_sender: false,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
        }
    }

    fn server_error() -> ApiError {
        ApiError::Status {
            status: 500,
            url: "http://localhost:8080/chats".to_string(),
            body: String::new(),
        }
    }

    fn list_generation(effects: &[Effect]) -> Generation {
        effects
            .iter()
            .rev()
            .find_map(|e| match e {
                Effect::FetchConversations { generation } => Some(*generation),
                _ => None,
            })
            .expect("list fetch effect")
    }

    fn thread_fetch(effects: &[Effect]) -> Option<(String, u64)> {
        effects.iter().find_map(|e| match e {
            Effect::FetchThread {
                chat_id,
                generation,
            } => Some((chat_id.clone(), *generation)),
            _ => None,
        })
    }

    fn notified(effects: &[Effect]) -> bool {
        effects.iter().any(|e| matches!(e, Effect::Notify { .. }))
    }

    fn unread(view: &ChatView, id: &str) -> Option<u32> {
        view.conversations()
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.unread_messages)
    }

    /// View with the list loaded and the first thread applied.
    fn loaded(route: Option<&str>, list: Vec<Conversation>) -> (ChatView, Vec<Effect>) {
        let mut view = ChatView::new(route.map(String::from));
        let start = view.start();
        let effects = view.conversations_loaded(list_generation(&start), Ok(list));
        (view, effects)
    }

    #[test]
    fn test_start_fetches_list_once() {
        let mut view = ChatView::new(None);
        assert_eq!(view.start().len(), 1);
        assert!(view.start().is_empty());
        assert!(view.is_list_loading());
    }

    #[test]
    fn test_initial_selection_prefers_route() {
        let (view, effects) = loaded(Some("2"), vec![conv("1", 0), conv("2", 4)]);
        assert_eq!(view.selected_id(), Some("2"));
        assert_eq!(unread(&view, "2"), Some(0));
        assert_eq!(thread_fetch(&effects).map(|(id, _)| id).as_deref(), Some("2"));
    }

    #[test]
    fn test_missing_route_falls_back_to_first() {
        let (view, _) = loaded(Some("99"), vec![conv("1", 1), conv("2", 0)]);
        assert_eq!(view.selected_id(), Some("1"));
    }

    #[test]
    fn test_empty_list_selects_nothing() {
        let (view, effects) = loaded(None, vec![]);
        assert!(view.selected_id().is_none());
        assert!(effects.is_empty());
        assert!(!view.is_thread_loading());
    }

    #[test]
    fn test_selection_replaced_when_it_disappears() {
        let (mut view, effects) = loaded(None, vec![conv("1", 0), conv("2", 0)]);
        assert_eq!(view.selected_id(), Some("1"));
        let g = list_generation(&effects);
        let effects = view.conversations_loaded(g, Ok(vec![conv("2", 3)]));
        assert_eq!(view.selected_id(), Some("2"));
        assert_eq!(unread(&view, "2"), Some(0));
        assert!(thread_fetch(&effects).is_some());
    }

    #[test]
    fn test_selected_unread_is_zero_regardless_of_server_timing() {
        let (mut view, effects) = loaded(None, vec![conv("1", 0), conv("2", 5)]);
        let before_select = list_generation(&effects);

        let effects = view.select("2");
        assert_eq!(unread(&view, "2"), Some(0));

        // A response issued before the selection lands late: superseded.
        assert!(view
            .conversations_loaded(before_select, Ok(vec![conv("1", 0), conv("2", 5)]))
            .is_empty());
        assert_eq!(unread(&view, "2"), Some(0));

        // The refetch still reports the old count: the active conversation stays read.
        view.conversations_loaded(list_generation(&effects), Ok(vec![conv("1", 0), conv("2", 5)]));
        assert_eq!(unread(&view, "2"), Some(0));
    }

    #[test]
    fn test_select_unknown_is_ignored() {
        let (mut view, _) = loaded(None, vec![conv("1", 0)]);
        assert!(view.select("nope").is_empty());
        assert_eq!(view.selected_id(), Some("1"));
    }

    #[test]
    fn test_push_for_inactive_conversation_notifies_and_keeps_thread() {
        let (mut view, effects) = loaded(None, vec![conv("A", 0), conv("B", 0)]);
        let (chat, generation) = thread_fetch(&effects).unwrap();
        view.thread_loaded(&chat, generation, Ok(vec![msg("a1", 1)]));
        let epoch = view.scroll_epoch();

        let effects = view.push_received(&PushEvent {
            chat_id: "B".to_string(),
        });
        assert!(notified(&effects));
        assert!(effects.contains(&Effect::Notify {
            volume: DEFAULT_NOTIFICATION_VOLUME
        }));
        assert!(thread_fetch(&effects).is_none());
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::FetchConversations { .. })));
        assert_eq!(view.messages().len(), 1);
        assert_eq!(view.messages()[0].id, "a1");
        assert_eq!(view.scroll_epoch(), epoch);
    }

    #[test]
    fn test_push_for_active_conversation_reloads_silently() {
        let (mut view, _) = loaded(None, vec![conv("A", 0), conv("B", 0)]);
        let effects = view.push_received(&PushEvent {
            chat_id: "A".to_string(),
        });
        assert!(!notified(&effects));
        assert_eq!(thread_fetch(&effects).map(|(id, _)| id).as_deref(), Some("A"));
        assert_eq!(unread(&view, "A"), Some(0));
    }

    #[test]
    fn test_push_for_unknown_conversation_invalidates_and_notifies() {
        let (mut view, _) = loaded(None, vec![conv("A", 0)]);
        let effects = view.push_received(&PushEvent {
            chat_id: "new".to_string(),
        });
        assert!(notified(&effects));
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::FetchConversations { .. })));
    }

    #[test]
    fn test_unread_count_comes_from_server_after_push() {
        let (mut view, _) = loaded(None, vec![conv("0", 0), conv("1", 3)]);
        assert_eq!(view.selected_id(), Some("0"));
        let effects = view.push_received(&PushEvent {
            chat_id: "1".to_string(),
        });
        // No local increment: the count stays what the server last said.
        assert_eq!(unread(&view, "1"), Some(3));
        view.conversations_loaded(list_generation(&effects), Ok(vec![conv("0", 0), conv("1", 4)]));
        assert_eq!(unread(&view, "1"), Some(4));
    }

    #[test]
    fn test_fast_switch_shows_latest_selection() {
        let (mut view, _) = loaded(None, vec![conv("A", 0), conv("B", 0), conv("C", 0)]);
        let a = thread_fetch(&view.select("A")).unwrap();
        let b = thread_fetch(&view.select("B")).unwrap();

        assert!(view.thread_loaded(&b.0, b.1, Ok(vec![msg("b1", 2)])));
        assert!(!view.thread_loaded(&a.0, a.1, Ok(vec![msg("a1", 1)])));
        assert_eq!(view.selected_id(), Some("B"));
        assert_eq!(view.messages()[0].id, "b1");
    }

    #[test]
    fn test_older_thread_generation_for_same_chat_dropped() {
        let (mut view, effects) = loaded(None, vec![conv("A", 0)]);
        let first = thread_fetch(&effects).unwrap();
        let second = thread_fetch(&view.push_received(&PushEvent {
            chat_id: "A".to_string(),
        }))
        .unwrap();
        assert!(view.thread_loaded(&second.0, second.1, Ok(vec![msg("new", 2), msg("old", 1)])));
        assert!(!view.thread_loaded(&first.0, first.1, Ok(vec![msg("old", 1)])));
        let ids: Vec<&str> = view.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["old", "new"]);
    }

    #[test]
    fn test_switching_clears_thread_until_loaded() {
        let (mut view, effects) = loaded(None, vec![conv("A", 0), conv("B", 0)]);
        let (chat, generation) = thread_fetch(&effects).unwrap();
        view.thread_loaded(&chat, generation, Ok(vec![msg("a1", 1)]));
        view.select("B");
        assert!(view.messages().is_empty());
        assert!(view.is_thread_loading());
    }

    #[test]
    fn test_thread_error_keeps_display() {
        let (mut view, effects) = loaded(None, vec![conv("A", 0)]);
        let (chat, generation) = thread_fetch(&effects).unwrap();
        view.thread_loaded(&chat, generation, Ok(vec![msg("a1", 1)]));
        let (chat, generation) = thread_fetch(&view.push_received(&PushEvent {
            chat_id: "A".to_string(),
        }))
        .unwrap();
        assert!(view.thread_loaded(&chat, generation, Err(server_error())));
        assert_eq!(view.messages().len(), 1);
        assert!(view.status().map(|s| s.is_error).unwrap_or(false));
    }

    #[test]
    fn test_send_clears_input_synchronously() {
        let (mut view, _) = loaded(None, vec![conv("A", 0)]);
        view.draft_mut().set("  olá\n  tudo bem?");
        let effects = view.send();
        assert_eq!(view.draft().text(), "");
        assert_eq!(
            effects,
            vec![Effect::SendMessage {
                chat_id: "A".to_string(),
                content: "  olá\n  tudo bem?".to_string(),
            }]
        );
    }

    #[test]
    fn test_send_ignored_when_blank_or_unselected() {
        let mut view = ChatView::new(None);
        view.draft_mut().set("hello");
        assert!(view.send().is_empty());
        assert_eq!(view.draft().text(), "hello");

        let (mut view, _) = loaded(None, vec![conv("A", 0)]);
        view.draft_mut().set("   ");
        assert!(view.send().is_empty());
    }

    #[test]
    fn test_send_completion_reloads_thread_and_list() {
        let (mut view, _) = loaded(None, vec![conv("A", 0)]);
        let effects = view.send_completed("A", "oi".to_string(), Ok(()));
        assert!(thread_fetch(&effects).is_some());
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::FetchConversations { .. })));
        assert!(view.status().is_none());
    }

    #[test]
    fn test_failed_send_keeps_recoverable_draft() {
        let (mut view, _) = loaded(None, vec![conv("A", 0)]);
        view.draft_mut().set("não enviou");
        view.send();
        let effects = view.send_completed("A", "não enviou".to_string(), Err(server_error()));
        assert!(thread_fetch(&effects).is_some());
        assert!(view.has_failed_draft());
        assert!(view.status().map(|s| s.is_error).unwrap_or(false));

        assert!(view.restore_failed_draft());
        assert_eq!(view.draft().text(), "não enviou");
        assert!(!view.has_failed_draft());
        assert!(!view.restore_failed_draft());
    }

    #[test]
    fn test_restore_does_not_clobber_new_input() {
        let (mut view, _) = loaded(None, vec![conv("A", 0)]);
        view.send_completed("A", "lost".to_string(), Err(server_error()));
        view.draft_mut().set("typing");
        assert!(!view.restore_failed_draft());
        assert_eq!(view.draft().text(), "typing");
        assert!(view.has_failed_draft());
    }

    #[test]
    fn test_failed_draft_stays_with_its_conversation() {
        let (mut view, _) = loaded(None, vec![conv("A", 0), conv("B", 0)]);
        view.draft_mut().set("meant for A");
        view.send();
        view.send_completed("A", "meant for A".to_string(), Err(server_error()));

        view.select("B");
        assert!(!view.has_failed_draft());
        assert!(!view.restore_failed_draft());
        assert!(view.draft().is_blank());
        assert!(view.send().is_empty());

        view.select("A");
        assert!(view.has_failed_draft());
        assert!(view.restore_failed_draft());
        assert_eq!(
            view.send(),
            vec![Effect::SendMessage {
                chat_id: "A".to_string(),
                content: "meant for A".to_string(),
            }]
        );
    }

    #[test]
    fn test_send_completed_after_switch_only_invalidates_list() {
        let (mut view, _) = loaded(None, vec![conv("A", 0), conv("B", 0)]);
        view.select("B");
        let effects = view.send_completed("A", "oi".to_string(), Ok(()));
        assert!(thread_fetch(&effects).is_none());
        assert_eq!(effects.len(), 1);
    }

    #[test]
    fn test_applied_thread_bumps_scroll_epoch() {
        let (mut view, effects) = loaded(None, vec![conv("A", 0)]);
        let (chat, generation) = thread_fetch(&effects).unwrap();
        let before = view.scroll_epoch();
        view.thread_loaded(&chat, generation, Ok(vec![msg("a1", 1)]));
        assert_eq!(view.scroll_epoch(), before + 1);
    }

    #[test]
    fn test_refresh_keeps_selection() {
        let (mut view, _) = loaded(None, vec![conv("A", 0)]);
        let effects = view.refresh();
        assert_eq!(effects.len(), 2);
        assert_eq!(thread_fetch(&effects).map(|(id, _)| id).as_deref(), Some("A"));
        assert_eq!(view.selected_id(), Some("A"));
    }

    #[test]
    fn test_list_failure_surfaces_status() {
        let mut view = ChatView::new(None);
        let g = list_generation(&view.start());
        assert!(view.is_list_loading());
        assert!(view.conversations_loaded(g, Err(server_error())).is_empty());
        assert!(view.status().map(|s| s.is_error).unwrap_or(false));
        assert!(!view.is_list_loading());
    }
}
