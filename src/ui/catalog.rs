use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Widget};

use crate::app::App;
use crate::ui::card::{CARD_HEIGHT, PokemonCard};

/// The paginated catalog: a header naming the signed-in user, then a
/// scrollable list of cards with selection highlight.
pub struct CatalogView<'a> {
    pub app: &'a App,
}

impl<'a> CatalogView<'a> {
    pub fn new(app: &'a App) -> Self {
        Self { app }
    }

    fn header(&self) -> Line<'a> {
        let who = self
            .app
            .user
            .as_ref()
            .map(|u| u.label().to_string())
            .unwrap_or_default();
        Line::from(vec![
            Span::styled("Signed in as ", Style::default().fg(Color::DarkGray)),
            Span::styled(who, Style::default().add_modifier(Modifier::BOLD)),
            Span::styled("  (L to sign out)", Style::default().fg(Color::DarkGray)),
        ])
    }

    /// Line below the last card: paging progress or the page error.
    fn footer(&self) -> Option<Line<'a>> {
        let catalog = &self.app.catalog;
        if let Some(ref error) = catalog.error {
            return Some(Line::from(Span::styled(
                format!("Failed to load Pokemon: {error} (r to retry)"),
                Style::default().fg(Color::Red),
            )));
        }
        if catalog.feed.is_loading() {
            return Some(Line::from(Span::styled(
                "Loading more...",
                Style::default().fg(Color::Yellow),
            )));
        }
        if !catalog.feed.has_more() && !catalog.feed.is_empty() {
            return Some(Line::from(Span::styled(
                "You've seen them all",
                Style::default().fg(Color::DarkGray),
            )));
        }
        None
    }
}

impl Widget for CatalogView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Pokedex ")
            .title_style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .border_style(Style::default().fg(Color::DarkGray));

        let inner = block.inner(area);
        block.render(area, buf);
        if inner.height < 3 {
            return;
        }

        buf.set_line(inner.x + 1, inner.y, &self.header(), inner.width.saturating_sub(1));

        let feed = &self.app.catalog.feed;
        let footer = self.footer();
        let footer_rows = u16::from(footer.is_some());
        let list_top = inner.y + 2;
        let list_bottom = inner.y + inner.height - footer_rows;

        if let Some(line) = footer {
            buf.set_line(inner.x + 1, list_bottom, &line, inner.width.saturating_sub(1));
        }

        if feed.is_empty() {
            if footer_rows == 0 || feed.is_loading_first_page() {
                let msg = if feed.is_loading_first_page() {
                    "Loading..."
                } else {
                    "No Pokemon to display"
                };
                buf.set_string(inner.x + 1, list_top, msg, Style::default().fg(Color::DarkGray));
            }
            return;
        }

        let content_width = inner.width.saturating_sub(1); // 1 char left margin
        let available_height = list_bottom.saturating_sub(list_top);

        // Cards are fixed height; +1 for the separator.
        let heights = vec![CARD_HEIGHT + 1; feed.len()];
        let selected_index = self.app.catalog.selected_index;
        let scroll_start = compute_scroll_start(&heights, selected_index, available_height);

        let mut y = list_top;
        for (idx, reference) in feed.items().enumerate().skip(scroll_start) {
            if y >= list_bottom {
                break;
            }
            let remaining = list_bottom - y;
            let render_h = heights[idx].min(remaining);
            let card_area = Rect::new(inner.x + 1, y, content_width, render_h.min(CARD_HEIGHT));

            PokemonCard::new(reference, self.app.detail_state(&reference.url))
                .selected(idx == selected_index)
                .render(card_area, buf);

            y += render_h;

            // Draw separator line
            if y < list_bottom && idx + 1 < feed.len() {
                let sep = "\u{2500}".repeat(content_width as usize);
                buf.set_string(
                    inner.x + 1,
                    y.saturating_sub(1),
                    &sep,
                    Style::default().fg(Color::DarkGray),
                );
            }
        }
    }
}

/// Find the smallest scroll start index so that the selected item fits
/// within the available height.
fn compute_scroll_start(heights: &[u16], selected: usize, available: u16) -> usize {
    if heights.is_empty() {
        return 0;
    }

    let selected = selected.min(heights.len() - 1);
    if available == 0 {
        return selected;
    }

    // Build a viewport that always includes the selected card and packs as
    // many previous items as can fit above it.
    let mut start = selected;
    let mut used = heights[selected];

    while start > 0 {
        let next = used.saturating_add(heights[start - 1]);
        if next > available {
            break;
        }
        start -= 1;
        used = next;
    }

    start
}
