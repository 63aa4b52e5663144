//! TUI application state and main event loop

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{
    DisableBracketedPaste, EnableBracketedPaste, Event, EventStream, KeyCode, KeyEvent,
    KeyEventKind, KeyModifiers,
};
use futures::{FutureExt, StreamExt};
use ratatui::DefaultTerminal;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};

use super::backend::{Backend, BackendCommand, BackendResponse};
use super::log_capture::LogBuffer;
use super::messages::MessagesState;
use super::sidebar::SidebarState;
use super::ui;
use crate::api::client::T2rClient;
use crate::chat::{ChatView, Effect};
use crate::config::Config;
use crate::notify::{self, Notifier};
use crate::push::{ConnectionState, PushConfig, PushListener};

/// How often captured log lines are checked for warnings.
const LOG_POLL_MS: u64 = 250;

/// Lines moved by PageUp/PageDown in the messages pane.
const PAGE_LINES: usize = 10;

/// Active pane in the TUI
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    #[default]
    Sidebar,
    Messages,
    Compose,
}

impl Pane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pane::Sidebar => "sidebar",
            Pane::Messages => "messages",
            Pane::Compose => "compose",
        }
    }

    fn next(self) -> Self {
        match self {
            Pane::Sidebar => Pane::Messages,
            Pane::Messages => Pane::Compose,
            Pane::Compose => Pane::Sidebar,
        }
    }

    fn prev(self) -> Self {
        match self {
            Pane::Sidebar => Pane::Compose,
            Pane::Messages => Pane::Sidebar,
            Pane::Compose => Pane::Messages,
        }
    }
}

/// Application state
pub struct App {
    pub view: ChatView,
    pub pane: Pane,
    pub sidebar: SidebarState,
    pub messages: MessagesState,
    pub push_state: ConnectionState,
    /// Signed-in user's display name, once the profile has loaded.
    pub user_name: Option<String>,
    /// Latest warning from the log, shown when the view has no status.
    pub last_warning: Option<String>,
    pub should_exit: bool,
}

impl App {
    pub fn new(view: ChatView) -> Self {
        Self {
            view,
            pane: Pane::default(),
            sidebar: SidebarState::default(),
            messages: MessagesState::default(),
            push_state: ConnectionState::Disconnected,
            user_name: None,
            last_warning: None,
            should_exit: false,
        }
    }

    /// Handle a key press and return the effects it caused.
    pub fn handle_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Char('c') if ctrl => {
                self.should_exit = true;
                return Vec::new();
            }
            KeyCode::Char('r') if ctrl => {
                if self.view.restore_failed_draft() {
                    self.pane = Pane::Compose;
                }
                return Vec::new();
            }
            KeyCode::Tab => {
                self.pane = self.pane.next();
                return Vec::new();
            }
            KeyCode::BackTab => {
                self.pane = self.pane.prev();
                return Vec::new();
            }
            _ => {}
        }

        match self.pane {
            Pane::Sidebar => self.handle_sidebar_key(key),
            Pane::Messages => self.handle_messages_key(key),
            Pane::Compose => self.handle_compose_key(key, ctrl),
        }
    }

    fn handle_sidebar_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        let list = self.view.conversations();
        let open = self.view.selected_id();
        match key.code {
            KeyCode::Char('q') => self.should_exit = true,
            KeyCode::Up | KeyCode::Char('k') => self.sidebar.move_up(list, open),
            KeyCode::Down | KeyCode::Char('j') => self.sidebar.move_down(list, open),
            KeyCode::Char('r') => return self.view.refresh(),
            KeyCode::Enter => {
                let Some(id) = self.sidebar.cursor_conversation(list, open).map(|c| c.id.clone())
                else {
                    return Vec::new();
                };
                self.pane = Pane::Compose;
                return self.view.select(&id);
            }
            _ => {}
        }
        Vec::new()
    }

    fn handle_messages_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        match key.code {
            KeyCode::Char('q') => self.should_exit = true,
            KeyCode::Up | KeyCode::Char('k') => self.messages.scroll_up(1),
            KeyCode::Down | KeyCode::Char('j') => self.messages.scroll_down(1),
            KeyCode::PageUp => self.messages.scroll_up(PAGE_LINES),
            KeyCode::PageDown => self.messages.scroll_down(PAGE_LINES),
            KeyCode::End | KeyCode::Char('G') => self.messages.jump_to_latest(),
            KeyCode::Char('r') => return self.view.refresh(),
            KeyCode::Esc => self.pane = Pane::Sidebar,
            _ => {}
        }
        Vec::new()
    }

    fn handle_compose_key(&mut self, key: KeyEvent, ctrl: bool) -> Vec<Effect> {
        if self.view.selected_id().is_none() {
            if key.code == KeyCode::Esc {
                self.pane = Pane::Sidebar;
            }
            return Vec::new();
        }

        let draft = self.view.draft_mut();
        match key.code {
            KeyCode::Enter => return self.view.send(),
            KeyCode::Char('u') if ctrl => draft.clear(),
            KeyCode::Char(c) if !ctrl => draft.insert_char(c),
            KeyCode::Backspace => draft.backspace(),
            KeyCode::Delete => draft.delete(),
            KeyCode::Left => draft.move_left(),
            KeyCode::Right => draft.move_right(),
            KeyCode::Home => draft.move_home(),
            KeyCode::End => draft.move_end(),
            KeyCode::Esc => self.pane = Pane::Sidebar,
            _ => {}
        }
        Vec::new()
    }

    /// Pasted text goes into the draft when the compose box is focused.
    pub fn handle_paste(&mut self, text: &str) {
        if self.pane == Pane::Compose && self.view.selected_id().is_some() {
            self.view.draft_mut().insert_str(text);
        }
    }

    /// Feed a backend response into the view.
    pub fn handle_response(&mut self, resp: BackendResponse) -> Vec<Effect> {
        match resp {
            BackendResponse::Conversations { generation, result } => {
                self.view.conversations_loaded(generation, result)
            }
            BackendResponse::Thread {
                chat_id,
                generation,
                result,
            } => {
                self.view.thread_loaded(&chat_id, generation, result);
                Vec::new()
            }
            BackendResponse::MessageSent {
                chat_id,
                content,
                result,
            } => self.view.send_completed(&chat_id, content, result),
            BackendResponse::Profile(Ok(profile)) => {
                self.user_name = Some(profile.name);
                Vec::new()
            }
            BackendResponse::Profile(Err(e)) => {
                tracing::warn!("Failed to load profile: {}", e);
                Vec::new()
            }
        }
    }
}

/// Carry out view effects: requests go to the backend, cues to the notifier.
fn dispatch(effects: Vec<Effect>, backend: &Backend, notifier: &dyn Notifier) {
    for effect in effects {
        match effect {
            Effect::FetchConversations { generation } => {
                backend.send(BackendCommand::LoadConversations { generation })
            }
            Effect::FetchThread {
                chat_id,
                generation,
            } => backend.send(BackendCommand::LoadThread {
                chat_id,
                generation,
            }),
            Effect::SendMessage { chat_id, content } => {
                backend.send(BackendCommand::SendMessage { chat_id, content })
            }
            Effect::Notify { volume } => notifier.notify(volume),
        }
    }
}

/// Run the chat TUI, optionally opening `route_chat_id` first.
///
/// The terminal is restored and the push channel closed even if the loop panics.
pub async fn run(route_chat_id: Option<String>, logs: LogBuffer) -> Result<()> {
    let config = Config::load()?;
    let client = Arc::new(T2rClient::from_config(&config)?);
    let backend = Backend::start(client.clone(), client);
    let push = PushListener::spawn(PushConfig::from_config(&config));
    let notifier = notify::default_notifier();
    let view = ChatView::new(route_chat_id).with_notification_volume(config.notification_volume());

    let mut terminal = ratatui::init();
    if let Err(e) = crossterm::execute!(std::io::stdout(), EnableBracketedPaste) {
        tracing::debug!("Bracketed paste unavailable: {}", e);
    }
    let result = AssertUnwindSafe(run_app(
        &mut terminal,
        App::new(view),
        backend,
        &push,
        notifier.as_ref(),
        &logs,
    ))
    .catch_unwind()
    .await;
    let _ = crossterm::execute!(std::io::stdout(), DisableBracketedPaste);
    ratatui::restore();
    push.shutdown().await;

    for warning in logs.drain_warnings() {
        eprintln!("warning: {}", warning);
    }

    match result {
        Ok(r) => r,
        Err(e) => std::panic::resume_unwind(e),
    }
}

async fn run_app(
    terminal: &mut DefaultTerminal,
    mut app: App,
    mut backend: Backend,
    push: &PushListener,
    notifier: &dyn Notifier,
    logs: &LogBuffer,
) -> Result<()> {
    let mut input = EventStream::new();
    let mut push_events = BroadcastStream::new(push.subscribe());
    let mut push_state = WatchStream::new(push.connection_state());
    let mut push_open = true;
    let mut state_open = true;
    let mut log_poll = tokio::time::interval(Duration::from_millis(LOG_POLL_MS));

    backend.send(BackendCommand::LoadProfile);
    dispatch(app.view.start(), &backend, notifier);

    while !app.should_exit {
        app.messages.follow(app.view.scroll_epoch());
        terminal.draw(|frame| ui::render(frame, &app))?;

        tokio::select! {
            event = input.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    let effects = app.handle_key(key);
                    dispatch(effects, &backend, notifier);
                }
                Some(Ok(Event::Paste(text))) => app.handle_paste(&text),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
            resp = backend.recv() => match resp {
                Some(resp) => {
                    let effects = app.handle_response(resp);
                    dispatch(effects, &backend, notifier);
                }
                None => anyhow::bail!("Backend task stopped"),
            },
            event = push_events.next(), if push_open => match event {
                Some(Ok(event)) => {
                    tracing::debug!("New message in conversation {}", event.chat_id);
                    dispatch(app.view.push_received(&event), &backend, notifier);
                }
                Some(Err(BroadcastStreamRecvError::Lagged(n))) => {
                    tracing::warn!("Missed {} push events, refreshing", n);
                    dispatch(app.view.refresh(), &backend, notifier);
                }
                None => push_open = false,
            },
            state = push_state.next(), if state_open => match state {
                Some(state) => app.push_state = state,
                None => state_open = false,
            },
            _ = log_poll.tick() => {
                if let Some(warning) = logs.drain_warnings().pop() {
                    app.last_warning = Some(warning);
                }
            }
        }
    }

    Ok(())
}
