//! Sidebar widget: conversation list with unread badges and previews.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};
use unicode_width::UnicodeWidthStr;

use crate::api::preview;
use crate::models::Conversation;

/// Rows per conversation: name line + preview line.
const ROWS_PER_ITEM: usize = 2;

/// Navigation cursor. Tracked by conversation id so it survives list refreshes.
#[derive(Debug, Default)]
pub struct SidebarState {
    cursor_id: Option<String>,
}

impl SidebarState {
    /// Index of the cursor row: the tracked id, else the open conversation, else the top.
    pub fn cursor_index(&self, list: &[Conversation], open_id: Option<&str>) -> Option<usize> {
        if list.is_empty() {
            return None;
        }
        let find = |id: &str| list.iter().position(|c| c.id == id);
        self.cursor_id
            .as_deref()
            .and_then(find)
            .or_else(|| open_id.and_then(find))
            .or(Some(0))
    }

    pub fn cursor_conversation<'a>(
        &self,
        list: &'a [Conversation],
        open_id: Option<&str>,
    ) -> Option<&'a Conversation> {
        self.cursor_index(list, open_id).and_then(|i| list.get(i))
    }

    pub fn move_up(&mut self, list: &[Conversation], open_id: Option<&str>) {
        if let Some(i) = self.cursor_index(list, open_id) {
            self.cursor_id = Some(list[i.saturating_sub(1)].id.clone());
        }
    }

    pub fn move_down(&mut self, list: &[Conversation], open_id: Option<&str>) {
        if let Some(i) = self.cursor_index(list, open_id) {
            let next = (i + 1).min(list.len() - 1);
            self.cursor_id = Some(list[next].id.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

pub struct SidebarView<'a> {
    pub conversations: &'a [Conversation],
    pub open_id: Option<&'a str>,
    pub loading: bool,
    pub focused: bool,
}

/// Render the sidebar into the given area.
pub fn render(area: Rect, buf: &mut Buffer, state: &SidebarState, view: &SidebarView) {
    let border_style = if view.focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let border_type = if view.focused {
        BorderType::Double
    } else {
        BorderType::Plain
    };

    let block = Block::default()
        .title(" Conversations ")
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style);

    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    if view.conversations.is_empty() {
        let text = if view.loading {
            " Loading..."
        } else {
            " No conversations yet"
        };
        let line = Line::from(Span::styled(text, Style::default().fg(Color::DarkGray)));
        Paragraph::new(line).render(Rect::new(inner.x, inner.y, inner.width, 1), buf);
        return;
    }

    let cursor = state.cursor_index(view.conversations, view.open_id);
    let visible_items = (inner.height as usize / ROWS_PER_ITEM).max(1);
    let offset = compute_scroll_offset(
        cursor.unwrap_or(0),
        visible_items,
        view.conversations.len(),
    );

    for (slot, idx) in (offset..view.conversations.len())
        .take(visible_items)
        .enumerate()
    {
        let conv = &view.conversations[idx];
        let y = inner.y + (slot * ROWS_PER_ITEM) as u16;
        if y >= inner.y + inner.height {
            break;
        }
        let row = RowCtx {
            area: Rect::new(inner.x, y, inner.width, 1),
            under_cursor: cursor == Some(idx) && view.focused,
            open: view.open_id == Some(conv.id.as_str()),
        };
        render_item(buf, &row, conv, inner.y + inner.height);
    }
}

/// Keep the cursor item visible.
fn compute_scroll_offset(selected: usize, height: usize, total: usize) -> usize {
    if total <= height || selected < height {
        return 0;
    }
    let max_offset = total.saturating_sub(height);
    selected.saturating_sub(height - 1).min(max_offset)
}

struct RowCtx {
    area: Rect,
    under_cursor: bool,
    open: bool,
}

fn name_style(row: &RowCtx, has_unread: bool) -> Style {
    let base = if row.under_cursor {
        Style::default().fg(Color::White).bg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Gray)
    };
    if row.open || has_unread {
        base.fg(Color::White).add_modifier(Modifier::BOLD)
    } else {
        base
    }
}

fn render_item(buf: &mut Buffer, row: &RowCtx, conv: &Conversation, bottom: u16) {
    let marker = if row.open { "\u{25BA}" } else { " " };
    let label = format!("{} {}", marker, conv.name);
    let badge = if conv.unread_messages > 0 {
        format!("({})", conv.unread_messages)
    } else {
        String::new()
    };

    let style = name_style(row, conv.unread_messages > 0);
    let badge_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD)
        .patch(if row.under_cursor {
            Style::default().bg(Color::DarkGray)
        } else {
            Style::default()
        });
    render_row(buf, row.area, &label, &badge, style, badge_style);

    let preview_y = row.area.y + 1;
    if preview_y < bottom {
        let text = conv
            .last_message
            .as_deref()
            .map(|m| preview(m, row.area.width.saturating_sub(3) as usize))
            .unwrap_or_default();
        let line = Line::from(Span::styled(
            format!("   {}", text),
            Style::default().fg(Color::DarkGray),
        ));
        Paragraph::new(line).render(Rect::new(row.area.x, preview_y, row.area.width, 1), buf);
    }
}

/// Render a row with left-aligned text and an optional right-aligned badge.
fn render_row(
    buf: &mut Buffer,
    area: Rect,
    left: &str,
    badge: &str,
    text_style: Style,
    badge_style: Style,
) {
    let width = area.width as usize;
    if width == 0 {
        return;
    }

    let badge_w = badge.width();
    let max_left = if badge_w > 0 {
        width.saturating_sub(badge_w + 1)
    } else {
        width
    };
    let left = truncate_to_width(left, max_left);
    let pad = width.saturating_sub(left.width() + badge_w);

    let line = Line::from(vec![
        Span::styled(left, text_style),
        Span::styled(" ".repeat(pad), text_style),
        Span::styled(badge.to_string(), badge_style),
    ]);
    Paragraph::new(line).render(area, buf);
}

fn truncate_to_width(s: &str, max: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > max {
            break;
        }
        used += w;
        out.push(c);
    }
    out
}
