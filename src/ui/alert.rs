use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap};

use crate::app::{Alert, AlertAction};

/// A dismissible centered popup for blocking alerts.
pub struct AlertPopup<'a> {
    alert: &'a Alert,
}

impl<'a> AlertPopup<'a> {
    pub fn new(alert: &'a Alert) -> Self {
        Self { alert }
    }

    fn hint(&self) -> &'static str {
        match self.alert.action {
            Some(AlertAction::OpenSettings) => " o: Open Settings   Enter/Esc: OK ",
            None => " Press Esc or Enter to dismiss ",
        }
    }
}

impl Widget for AlertPopup<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let max_width = 60u16.min(area.width.saturating_sub(4));
        // Inner width available for text (subtract 2 for border)
        let inner_width = max_width.saturating_sub(2) as usize;

        // Estimate wrapped line count
        let text_lines: usize = self
            .alert
            .message
            .lines()
            .map(|line| {
                if line.is_empty() || inner_width == 0 {
                    1
                } else {
                    line.chars().count().div_ceil(inner_width)
                }
            })
            .sum();

        // +2 for border top/bottom, +2 for hint line + blank line above hint
        let content_height = (text_lines as u16) + 4;
        let max_height = (area.height * 3 / 5).max(8);
        let height = content_height
            .min(max_height)
            .min(area.height.saturating_sub(2));

        let x = area.x + (area.width.saturating_sub(max_width)) / 2;
        let y = area.y + (area.height.saturating_sub(height)) / 2;
        let panel = Rect::new(x, y, max_width, height);

        Clear.render(panel, buf);

        let color = match self.alert.action {
            Some(_) => Color::Yellow,
            None => Color::Red,
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", self.alert.title))
            .title_style(Style::default().fg(color).add_modifier(Modifier::BOLD))
            .border_style(Style::default().fg(color));

        let inner = block.inner(panel);
        block.render(panel, buf);

        // Reserve the last line of inner area for the hint
        if inner.height < 2 {
            return;
        }
        let text_area = Rect::new(inner.x, inner.y, inner.width, inner.height - 1);
        let hint_area = Rect::new(inner.x, inner.y + inner.height - 1, inner.width, 1);

        let paragraph = Paragraph::new(self.alert.message.as_str()).wrap(Wrap { trim: true });
        paragraph.render(text_area, buf);

        let hint = Line::from(Span::styled(
            self.hint(),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        ));
        Paragraph::new(hint).render(hint_area, buf);
    }
}
