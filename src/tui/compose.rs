//! Compose box: single-line input bound to the view's draft.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
    Frame,
};
use unicode_width::UnicodeWidthChar;

use crate::chat::Draft;

/// Height of the compose box: border + input + border.
pub const COMPOSE_HEIGHT: u16 = 3;

pub struct ComposeView<'a> {
    pub draft: &'a Draft,
    /// Name of the open conversation, if any.
    pub recipient: Option<&'a str>,
    pub has_failed_draft: bool,
    pub focused: bool,
}

/// Render the compose box and place the terminal cursor when focused.
pub fn render(area: Rect, frame: &mut Frame, view: &ComposeView) {
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

    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style);
    if view.has_failed_draft {
        block = block.title_bottom(Line::from(Span::styled(
            " Ctrl+R: restore unsent message ",
            Style::default().fg(Color::Red),
        )));
    }

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let input_area = Rect::new(inner.x, inner.y, inner.width, 1);
    let display = compose_display_text(
        view.draft.text(),
        view.draft.cursor(),
        input_area.width as usize,
    );
    render_input(input_area, frame.buffer_mut(), view, &display);

    if view.focused && view.recipient.is_some() {
        frame.set_cursor_position((
            input_area.x + 1 + display.cursor_offset as u16,
            input_area.y,
        ));
    }
}

fn render_input(area: Rect, buf: &mut Buffer, view: &ComposeView, display: &DisplayText) {
    let w = area.width as usize;

    let line = match view.recipient {
        None => Line::from(Span::styled(
            " Select a conversation to start typing",
            Style::default().fg(Color::DarkGray),
        )),
        Some(name) if view.draft.text().is_empty() => {
            let placeholder = format!(" Type a message to {}...", name);
            let truncated: String = placeholder.chars().take(w).collect();
            Line::from(Span::styled(truncated, Style::default().fg(Color::DarkGray)))
        }
        Some(_) => Line::from(Span::styled(
            format!(" {}", display.visible),
            Style::default().fg(Color::White),
        )),
    };
    Paragraph::new(line).render(area, buf);
}

/// What to draw on the input line and where the cursor lands.
#[derive(Debug, PartialEq)]
struct DisplayText {
    visible: String,
    /// Cursor column within `visible`.
    cursor_offset: usize,
}

/// Flatten the draft onto one line and scroll horizontally so the cursor
/// stays visible. Newlines show as " | ". Offsets are display columns.
fn compose_display_text(input: &str, cursor: usize, width: usize) -> DisplayText {
    // One column of left margin comes from the " " prefix.
    let avail = width.saturating_sub(1);
    if avail == 0 {
        return DisplayText {
            visible: String::new(),
            cursor_offset: 0,
        };
    }

    let mut cells: Vec<char> = Vec::new();
    let mut cursor_cell = None;
    for (i, ch) in input.chars().enumerate() {
        if i == cursor {
            cursor_cell = Some(cells.len());
        }
        if ch == '\n' {
            cells.extend([' ', '|', ' ']);
        } else {
            cells.push(ch);
        }
    }
    let cursor_cell = cursor_cell.unwrap_or(cells.len());

    let col = |c: &char| c.width().unwrap_or(0);
    let cursor_col: usize = cells[..cursor_cell].iter().map(col).sum();

    // Drop leading cells until the cursor column fits.
    let mut start = 0;
    let mut skipped = 0;
    while cursor_col - skipped >= avail && start < cursor_cell {
        skipped += col(&cells[start]);
        start += 1;
    }

    let mut visible = String::new();
    let mut used = 0;
    for c in &cells[start..] {
        let w = col(c);
        if used + w > avail {
            break;
        }
        used += w;
        visible.push(*c);
    }

    DisplayText {
        visible,
        cursor_offset: cursor_col - skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_short_text() {
        let d = compose_display_text("olá", 3, 20);
        assert_eq!(d.visible, "olá");
        assert_eq!(d.cursor_offset, 3);
    }

    #[test]
    fn test_display_newline_expansion() {
        let d = compose_display_text("a\nb", 2, 20);
        assert_eq!(d.visible, "a | b");
        assert_eq!(d.cursor_offset, 4);
    }

    #[test]
    fn test_display_scrolls_to_cursor() {
        let d = compose_display_text("abcdefghij", 10, 6);
        assert_eq!(d.visible, "ghij");
        assert_eq!(d.cursor_offset, 4);

        let d = compose_display_text("abcdefghij", 0, 6);
        assert_eq!(d.visible, "abcde");
        assert_eq!(d.cursor_offset, 0);
    }

    #[test]
    fn test_display_wide_chars_count_columns() {
        let d = compose_display_text("日本語", 3, 20);
        assert_eq!(d.cursor_offset, 6);

        let d = compose_display_text("日本語", 3, 5);
        assert_eq!(d.visible, "語");
        assert_eq!(d.cursor_offset, 2);
    }

    #[test]
    fn test_display_zero_width() {
        let d = compose_display_text("abc", 1, 1);
        assert_eq!(d.visible, "");
        assert_eq!(d.cursor_offset, 0);
    }
}
