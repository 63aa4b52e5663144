//! Messages pane: the open thread as chat bubbles.
//!
//! Sent messages are right-aligned, received ones left-aligned. The pane
//! is anchored to the newest message; scrolling moves away from the
//! bottom and any applied thread update snaps back.

use chrono::Local;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::models::Message;

/// Bubbles take at most this share of the pane width, in percent.
const BUBBLE_WIDTH_PCT: usize = 70;

#[derive(Debug, Default)]
pub struct MessagesState {
    /// Lines scrolled up from the bottom (0 = newest message visible).
    scroll_from_bottom: usize,
    /// Last thread epoch the pane snapped to.
    followed_epoch: u64,
}

impl MessagesState {
    /// Snap to the newest message when the thread changed since the last call.
    pub fn follow(&mut self, epoch: u64) {
        if epoch != self.followed_epoch {
            self.followed_epoch = epoch;
            self.scroll_from_bottom = 0;
        }
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_from_bottom = self.scroll_from_bottom.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_from_bottom = self.scroll_from_bottom.saturating_sub(lines);
    }

    pub fn jump_to_latest(&mut self) {
        self.scroll_from_bottom = 0;
    }
}

pub struct ThreadView<'a> {
    pub title: Option<&'a str>,
    pub messages: &'a [Message],
    pub loading: bool,
    pub focused: bool,
}

/// Render the messages pane into the given area.
pub fn render(area: Rect, buf: &mut Buffer, state: &MessagesState, view: &ThreadView) {
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
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style);

    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let header = view.title.unwrap_or("Select a conversation");
    let line = Line::from(Span::styled(
        format!(" {} ", header),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    ));
    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(Rect::new(inner.x, inner.y, inner.width, 1), buf);

    let body = Rect::new(
        inner.x,
        inner.y + 1,
        inner.width,
        inner.height.saturating_sub(1),
    );
    if body.height == 0 {
        return;
    }

    if view.messages.is_empty() {
        let text = match (view.title, view.loading) {
            (None, _) => "",
            (Some(_), true) => " Loading messages...",
            (Some(_), false) => " No messages yet. Say hello!",
        };
        let line = Line::from(Span::styled(text, Style::default().fg(Color::DarkGray)));
        Paragraph::new(line).render(Rect::new(body.x, body.y, body.width, 1), buf);
        return;
    }

    let lines = build_lines(view.messages, body.width as usize);
    let visible = body.height as usize;
    let start = visible_start(lines.len(), visible, state.scroll_from_bottom);

    for (row, line) in lines.iter().skip(start).take(visible).enumerate() {
        let line_area = Rect::new(body.x, body.y + row as u16, body.width, 1);
        Paragraph::new(line.clone()).render(line_area, buf);
    }

    if start > 0 {
        let cell = &mut buf[(body.x + body.width.saturating_sub(1), body.y)];
        cell.set_char('^');
        cell.set_style(Style::default().fg(Color::DarkGray));
    }
    if start + visible < lines.len() {
        let bottom_y = body.y + body.height.saturating_sub(1);
        let cell = &mut buf[(body.x + body.width.saturating_sub(1), bottom_y)];
        cell.set_char('v');
        cell.set_style(Style::default().fg(Color::DarkGray));
    }
}

/// First line to draw, anchored to the bottom and clamped to the top.
fn visible_start(total: usize, visible: usize, from_bottom: usize) -> usize {
    let max_start = total.saturating_sub(visible);
    max_start.saturating_sub(from_bottom)
}

/// Lay the thread out as styled lines, one bubble per message.
fn build_lines(messages: &[Message], width: usize) -> Vec<Line<'static>> {
    let bubble_width = (width * BUBBLE_WIDTH_PCT / 100).max(12).min(width);
    let text_width = bubble_width.saturating_sub(2);
    let mut lines = Vec::new();

    for msg in messages {
        let (bubble_style, meta_style) = if msg.is_sender {
            (
                Style::default().fg(Color::Black).bg(Color::Cyan),
                Style::default().fg(Color::DarkGray),
            )
        } else {
            (
                Style::default().fg(Color::White).bg(Color::DarkGray),
                Style::default().fg(Color::DarkGray),
            )
        };

        let wrapped = wrap_text(&msg.content, text_width);
        let inner_width = wrapped.iter().map(|l| l.width()).max().unwrap_or(0);
        for text in &wrapped {
            let cell = format!(" {}{} ", text, " ".repeat(inner_width - text.width()));
            lines.push(align(cell, bubble_style, msg.is_sender, width));
        }

        let stamp = msg
            .created_at
            .with_timezone(&Local)
            .format("%d/%m %H:%M")
            .to_string();
        let meta = if msg.is_sender {
            let marker = if msg.read { "\u{2713}\u{2713}" } else { "\u{2713}" };
            format!("{} {}", stamp, marker)
        } else {
            stamp
        };
        lines.push(align(meta, meta_style, msg.is_sender, width));
        lines.push(Line::from(""));
    }

    lines
}

fn align(text: String, style: Style, right: bool, width: usize) -> Line<'static> {
    if right {
        let pad = width.saturating_sub(text.width() + 1);
        Line::from(vec![
            Span::raw(" ".repeat(pad)),
            Span::styled(text, style),
        ])
    } else {
        Line::from(vec![Span::raw(" "), Span::styled(text, style)])
    }
}

/// Word-wrap by display width. Words longer than the width are split.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return vec![];
    }
    let mut result = Vec::new();
    for line in text.lines() {
        let mut current = String::new();
        for word in line.split_whitespace() {
            let sep = usize::from(!current.is_empty());
            if current.width() + sep + word.width() <= max_width {
                if sep == 1 {
                    current.push(' ');
                }
                current.push_str(word);
                continue;
            }
            if !current.is_empty() {
                result.push(std::mem::take(&mut current));
            }
            for c in word.chars() {
                if !current.is_empty() && current.width() + c.width().unwrap_or(0) > max_width {
                    result.push(std::mem::take(&mut current));
                }
                current.push(c);
            }
        }
        result.push(current);
    }
    if result.is_empty() {
        result.push(String::new());
    }
    result
}
