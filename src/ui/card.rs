use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Widget;

use crate::api::types::{ListReference, PokemonDetails, format_height, format_weight};
use crate::query::QueryState;
use crate::ui::{display_name, type_color};

/// Rows every card occupies, whatever its state, so the list never shifts
/// while details load.
pub const CARD_HEIGHT: u16 = 4;

/// Renders a single catalog entry as a fixed-height card.
///
/// Layout:
///   #025 Pikachu
///    electric
///   Height 0.4 m  Weight 6 kg
///   https://.../official-artwork/25.png
pub struct PokemonCard<'a> {
    pub reference: &'a ListReference,
    pub state: QueryState<'a, PokemonDetails>,
    pub selected: bool,
}

impl<'a> PokemonCard<'a> {
    pub fn new(reference: &'a ListReference, state: QueryState<'a, PokemonDetails>) -> Self {
        Self {
            reference,
            state,
            selected: false,
        }
    }

    pub fn selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    fn lines(&self) -> Vec<Line<'a>> {
        let name_style = if self.selected {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        };
        let dim = Style::default().fg(Color::DarkGray);

        match self.state {
            QueryState::Loaded(details) => {
                let header = Line::from(vec![
                    Span::styled(format!("#{:03} ", details.id), dim),
                    Span::styled(display_name(&details.name), name_style),
                ]);

                let mut tags = Vec::new();
                for name in details.type_names() {
                    tags.push(Span::styled(
                        format!(" {name} "),
                        Style::default().fg(Color::Black).bg(type_color(name)),
                    ));
                    tags.push(Span::raw(" "));
                }

                let measures = Line::from(vec![
                    Span::styled("Height ", dim),
                    Span::raw(format_height(details.height)),
                    Span::styled("  Weight ", dim),
                    Span::raw(format_weight(details.weight)),
                ]);

                let image = match details.primary_image() {
                    Some(url) => Line::from(Span::styled(
                        url.to_string(),
                        Style::default().fg(Color::Blue),
                    )),
                    None => Line::from(Span::styled("No image", dim)),
                };

                vec![header, Line::from(tags), measures, image]
            }
            QueryState::Failed(_) => vec![
                Line::from(Span::styled(display_name(&self.reference.name), name_style)),
                Line::from(Span::styled(
                    "Failed to load Pokemon details",
                    Style::default().fg(Color::Red),
                )),
                Line::from(Span::styled("Press r to retry", dim)),
                Line::from(""),
            ],
            QueryState::Loading | QueryState::Idle => {
                let bar = Span::styled("\u{2591}".repeat(16), dim);
                vec![
                    Line::from(Span::styled(display_name(&self.reference.name), name_style)),
                    Line::from(bar.clone()),
                    Line::from(bar.clone()),
                    Line::from(bar),
                ]
            }
        }
    }
}

impl Widget for PokemonCard<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }

        let bottom = area.y + area.height;
        for (row, line) in (area.y..bottom).zip(self.lines()) {
            buf.set_line(area.x, row, &line, area.width);
        }
    }
}
