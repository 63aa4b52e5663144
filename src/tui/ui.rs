//! UI rendering for the TUI

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use super::app::{App, Pane};
use super::compose::{self, ComposeView};
use super::messages::{self, ThreadView};
use super::sidebar::{self, SidebarView};
use crate::push::ConnectionState;

const SIDEBAR_WIDTH: u16 = 30;
const TITLE: &str = " Talk to Refugee";

/// Symbol and color for the push channel state.
fn connection_indicator(state: ConnectionState) -> (&'static str, Color) {
    match state {
        ConnectionState::Connected => ("*", Color::Green),
        ConnectionState::Connecting => ("~", Color::Yellow),
        ConnectionState::Disconnected => ("o", Color::Red),
    }
}

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let [header_area, main_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    render_header(header_area, frame.buffer_mut(), app);

    let [sidebar_area, content_area] =
        Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Fill(1)])
            .areas(main_area);

    let view = &app.view;
    sidebar::render(
        sidebar_area,
        frame.buffer_mut(),
        &app.sidebar,
        &SidebarView {
            conversations: view.conversations(),
            open_id: view.selected_id(),
            loading: view.is_list_loading(),
            focused: app.pane == Pane::Sidebar,
        },
    );

    let [messages_area, compose_area] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(compose::COMPOSE_HEIGHT),
    ])
    .areas(content_area);

    let recipient = view.selected_conversation().map(|c| c.name.as_str());
    messages::render(
        messages_area,
        frame.buffer_mut(),
        &app.messages,
        &ThreadView {
            title: recipient,
            messages: view.messages(),
            loading: view.is_thread_loading(),
            focused: app.pane == Pane::Messages,
        },
    );

    compose::render(
        compose_area,
        frame,
        &ComposeView {
            draft: view.draft(),
            recipient,
            has_failed_draft: view.has_failed_draft(),
            focused: app.pane == Pane::Compose,
        },
    );

    render_status(status_area, frame.buffer_mut(), app);
}

fn render_header(area: Rect, buf: &mut Buffer, app: &App) {
    let (symbol, color) = connection_indicator(app.push_state);
    let state = format!(" {} {} ", symbol, app.push_state);
    let user = format!(" {} ", app.user_name.as_deref().unwrap_or("..."));

    let used = TITLE.width() + state.width() + user.width();
    let padding = (area.width as usize).saturating_sub(used);

    let line = Line::from(vec![
        Span::styled(
            TITLE,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" ".repeat(padding)),
        Span::styled(state, Style::default().fg(color)),
        Span::styled(user, Style::default().fg(Color::Cyan)),
    ]);

    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

fn key_hints(pane: Pane) -> &'static str {
    match pane {
        Pane::Sidebar => "j/k: move | Enter: open | r: refresh | Tab: next pane | q: quit",
        Pane::Messages => "j/k: scroll | PgUp/PgDn | End: latest | Esc: back | q: quit",
        Pane::Compose => "Enter: send | C-u: clear | Esc: back | C-c: quit",
    }
}

fn render_status(area: Rect, buf: &mut Buffer, app: &App) {
    let span = if let Some(status) = app.view.status() {
        let color = if status.is_error {
            Color::Red
        } else {
            Color::Green
        };
        Span::styled(format!(" {} ", status.text), Style::default().fg(color))
    } else if let Some(warning) = &app.last_warning {
        Span::styled(format!(" ! {} ", warning), Style::default().fg(Color::Yellow))
    } else {
        Span::styled(
            format!(" [{}] {}", app.pane.as_str(), key_hints(app.pane)),
            Style::default().fg(Color::Gray),
        )
    };

    Paragraph::new(Line::from(span))
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}
