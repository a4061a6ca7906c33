use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};

use crate::app::{App, SettingsItem};

/// Settings list grouped into sections, with the selection highlighted.
pub struct SettingsView<'a> {
    app: &'a App,
}

impl<'a> SettingsView<'a> {
    pub fn new(app: &'a App) -> Self {
        Self { app }
    }
}

impl Widget for SettingsView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Settings ")
            .title_style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .border_style(Style::default().fg(Color::DarkGray));

        let inner = block.inner(area);
        block.render(area, buf);

        let section_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);

        let mut lines = Vec::new();
        let mut section = "";
        for (i, item) in SettingsItem::ALL.iter().enumerate() {
            if item.section() != section {
                if !section.is_empty() {
                    lines.push(Line::from(""));
                }
                section = item.section();
                lines.push(Line::from(Span::styled(section, section_style)));
            }

            let selected = i == self.app.settings_index;
            let marker = if selected { "\u{25B8} " } else { "  " };
            let mut style = if *item == SettingsItem::SignOut {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            if selected {
                style = style.add_modifier(Modifier::BOLD | Modifier::REVERSED);
            }

            let mut spans = vec![Span::raw(marker), Span::styled(item.label(), style)];
            if *item == SettingsItem::Profile
                && let Some(user) = &self.app.user
            {
                spans.push(Span::styled(
                    format!("  {}", user.label()),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            lines.push(Line::from(spans));
        }

        Paragraph::new(lines).render(
            Rect::new(
                inner.x + 1,
                inner.y,
                inner.width.saturating_sub(1),
                inner.height,
            ),
            buf,
        );
    }
}
