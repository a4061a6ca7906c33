use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Widget;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::{App, AppMode};
use crate::nav::Route;
use crate::ui::display_name;

/// Bottom status bar showing mode, current screen, and status messages.
pub struct StatusBar<'a> {
    pub app: &'a App,
}

impl<'a> StatusBar<'a> {
    pub fn new(app: &'a App) -> Self {
        Self { app }
    }
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }

        // Background
        let bg_style = Style::default().bg(Color::DarkGray).fg(Color::White);
        for x in area.x..area.x + area.width {
            buf[(x, area.y)].set_style(bg_style);
        }

        let mut spans = Vec::new();

        // Mode indicator
        let (mode_str, mode_bg) = match self.app.mode {
            AppMode::Normal => (" NORMAL ", Color::Blue),
            AppMode::Command => (" COMMAND ", Color::Magenta),
        };
        let mode_style = Style::default()
            .bg(mode_bg)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD);
        spans.push(Span::styled(mode_str, mode_style));
        spans.push(Span::raw(" "));

        // Current screen
        let screen = match self.app.route() {
            Some(Route::PokemonDetails(params)) => display_name(&params.name),
            Some(Route::Home) => format!("Catalog ({})", self.app.catalog.feed.len()),
            Some(route) => route.name().to_string(),
            None => "pokedextui".to_string(),
        };
        spans.push(Span::styled(screen, bg_style));

        // Loading indicator
        let detail_loading = match self.app.route() {
            Some(Route::PokemonDetails(params)) => self.app.details.is_fetching(&params.url),
            _ => false,
        };
        if self.app.catalog.feed.is_loading() || detail_loading {
            spans.push(Span::styled(
                " [loading...]",
                Style::default().bg(Color::DarkGray).fg(Color::Yellow),
            ));
        }

        // Status message (right-aligned)
        if let Some(ref msg) = self.app.status_message {
            let left_width: usize = spans.iter().map(|s| s.width()).sum();
            let available = (area.width as usize).saturating_sub(left_width + 1);
            let shown: String = if msg.width() > available {
                msg.chars()
                    .scan(0, |used, c| {
                        *used += c.width().unwrap_or(0);
                        (*used <= available).then_some(c)
                    })
                    .collect()
            } else {
                msg.clone()
            };
            let padding = (area.width as usize).saturating_sub(left_width + shown.width());
            if padding > 0 {
                spans.push(Span::styled(" ".repeat(padding), bg_style));
            }
            spans.push(Span::styled(
                shown,
                Style::default().bg(Color::DarkGray).fg(Color::Red),
            ));
        }

        let line = Line::from(spans);
        buf.set_line(area.x, area.y, &line, area.width);
    }
}
