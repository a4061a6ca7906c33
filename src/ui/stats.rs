use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Widget};

use crate::api::types::{
    MAX_BASE_STAT, PokemonDetails, format_height, format_stat_name, format_weight,
};
use crate::ui::display_name;

const NAME_WIDTH: usize = 16;

/// Bottom sheet with base stats drawn as bars.
pub struct StatsSheet<'a> {
    details: &'a PokemonDetails,
}

impl<'a> StatsSheet<'a> {
    pub fn new(details: &'a PokemonDetails) -> Self {
        Self { details }
    }
}

impl Widget for StatsSheet<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // stats + blank + measures + types + hint, plus border
        let wanted = self.details.stats.len() as u16 + 6;
        let height = wanted.min(area.height);
        let panel = Rect::new(area.x, area.y + area.height - height, area.width, height);

        Clear.render(panel, buf);

        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} Stats ", display_name(&self.details.name)))
            .title_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
            .border_style(Style::default().fg(Color::Yellow));

        let inner = block.inner(panel);
        block.render(panel, buf);

        // name + space + 3-digit value + space
        let bar_room = (inner.width as usize).saturating_sub(NAME_WIDTH + 7);
        let dim = Style::default().fg(Color::DarkGray);

        let mut lines: Vec<Line<'_>> = self
            .details
            .stats
            .iter()
            .map(|slot| {
                let filled = bar_width(slot.base_stat, bar_room);
                Line::from(vec![
                    Span::styled(
                        format!(
                            " {:<width$}",
                            display_name(&format_stat_name(&slot.stat.name)),
                            width = NAME_WIDTH
                        ),
                        dim,
                    ),
                    Span::styled(
                        format!("{:>3} ", slot.base_stat),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        "\u{2588}".repeat(filled),
                        Style::default().fg(stat_color(slot.base_stat)),
                    ),
                    Span::styled("\u{2591}".repeat(bar_room - filled), dim),
                ])
            })
            .collect();

        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled(" Height ", dim),
            Span::raw(format_height(self.details.height)),
            Span::styled("   Weight ", dim),
            Span::raw(format_weight(self.details.weight)),
        ]));
        lines.push(Line::from(vec![
            Span::styled(" Types ", dim),
            Span::raw(
                self.details
                    .type_names()
                    .into_iter()
                    .map(display_name)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        ]));
        lines.push(Line::from(Span::styled(" Press s or Esc to close", dim)));

        Paragraph::new(lines).render(inner, buf);
    }
}

/// Filled cells for a stat, scaled against the highest base stat.
fn bar_width(base_stat: u32, room: usize) -> usize {
    let ratio = f64::from(base_stat.min(MAX_BASE_STAT)) / f64::from(MAX_BASE_STAT);
    ((ratio * room as f64).round() as usize).min(room)
}

fn stat_color(base_stat: u32) -> Color {
    match base_stat {
        0..50 => Color::Red,
        50..80 => Color::Yellow,
        80..110 => Color::Green,
        _ => Color::Cyan,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bars_scale_against_max_stat() {
        assert_eq!(bar_width(0, 40), 0);
        assert_eq!(bar_width(255, 40), 40);
        assert_eq!(bar_width(51, 50), 10);
        assert_eq!(bar_width(999, 40), 40);
        assert_eq!(bar_width(100, 0), 0);
    }
}
