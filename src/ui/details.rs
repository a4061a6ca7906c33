use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget, Wrap};

use crate::api::types::{PokemonDetails, Species, describe, format_height, format_weight};
use crate::app::App;
use crate::nav::DetailParams;
use crate::query::QueryState;
use crate::ui::{display_name, type_color};

/// Moves listed before the remainder is summarised.
const MOVE_PREVIEW: usize = 20;

/// Full record for one Pokemon, with its species description.
pub struct DetailsView<'a> {
    app: &'a App,
    params: &'a DetailParams,
}

impl<'a> DetailsView<'a> {
    pub fn new(app: &'a App, params: &'a DetailParams) -> Self {
        Self { app, params }
    }
}

impl Widget for DetailsView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", display_name(&self.params.name)))
            .title_style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .border_style(Style::default().fg(Color::DarkGray));

        let inner = block.inner(area);
        block.render(area, buf);
        let body = Rect::new(
            inner.x + 1,
            inner.y,
            inner.width.saturating_sub(2),
            inner.height,
        );

        let lines = match self.app.detail_state(&self.params.url) {
            QueryState::Loaded(details) => {
                let species = details
                    .species
                    .as_ref()
                    .map(|s| self.app.species_state(&s.url));
                detail_lines(details, species)
            }
            QueryState::Failed(_) => vec![
                Line::from(Span::styled(
                    "Failed to load Pokemon details",
                    Style::default().fg(Color::Red),
                )),
                Line::from(""),
                Line::from(Span::styled(
                    "Press Esc to go back, r to retry",
                    Style::default().fg(Color::DarkGray),
                )),
            ],
            QueryState::Loading | QueryState::Idle => vec![Line::from(Span::styled(
                "Loading...",
                Style::default().fg(Color::DarkGray),
            ))],
        };

        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .render(body, buf);
    }
}

fn section(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        title.to_string(),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    ))
}

fn field(label: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label:<12}"), Style::default().fg(Color::DarkGray)),
        Span::raw(value),
    ])
}

/// Body lines for a loaded record. `species` is `None` when the record
/// links no species.
fn detail_lines(
    details: &PokemonDetails,
    species: Option<QueryState<'_, Species>>,
) -> Vec<Line<'static>> {
    let dim = Style::default().fg(Color::DarkGray);
    let mut lines = Vec::new();

    lines.push(Line::from(vec![
        Span::styled(format!("#{:03} ", details.id), dim),
        Span::styled(
            display_name(&details.name),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ]));
    match details.primary_image() {
        Some(url) => lines.push(Line::from(Span::styled(
            url.to_string(),
            Style::default().fg(Color::Blue),
        ))),
        None => lines.push(Line::from(Span::styled("No image", dim))),
    }

    let mut tags = Vec::new();
    for name in details.type_names() {
        tags.push(Span::styled(
            format!(" {} ", display_name(name)),
            Style::default().fg(Color::Black).bg(type_color(name)),
        ));
        tags.push(Span::raw(" "));
    }
    lines.push(Line::from(tags));
    lines.push(Line::from(""));

    // Description
    let (description, loaded_species) = match species {
        Some(QueryState::Loaded(s)) => (describe(Some(s)), Some(s)),
        Some(QueryState::Loading) => ("Loading description...".to_string(), None),
        _ => (describe(None), None),
    };
    lines.push(Line::from(description));
    lines.push(Line::from(""));

    // About
    lines.push(section("About"));
    lines.push(field("Height", format_height(details.height)));
    lines.push(field("Weight", format_weight(details.weight)));
    if let Some(habitat) = loaded_species.and_then(|s| s.habitat.as_ref()) {
        lines.push(field("Habitat", display_name(&habitat.name)));
    }
    let generation = loaded_species
        .and_then(|s| s.generation.as_ref())
        .map(|g| format_generation(&g.name))
        .unwrap_or_else(|| "Unknown".to_string());
    lines.push(field("Generation", generation));
    lines.push(Line::from(""));

    // Abilities
    lines.push(section("Abilities"));
    for slot in &details.abilities {
        let mut spans = vec![Span::raw(format!("  {}", display_name(&slot.ability.name)))];
        if slot.is_hidden {
            spans.push(Span::styled(" (Hidden)", dim));
        }
        lines.push(Line::from(spans));
    }
    lines.push(Line::from(""));

    // Sprites
    let variants = details.sprite_variants();
    if !variants.is_empty() {
        lines.push(section("Sprites"));
        for (label, url) in variants {
            lines.push(field(&format!("  {label}"), url.to_string()));
        }
        lines.push(Line::from(""));
    }

    // Moves
    lines.push(section("Moves"));
    let names: Vec<String> = details
        .moves
        .iter()
        .take(MOVE_PREVIEW)
        .map(|m| display_name(&m.move_.name))
        .collect();
    lines.push(Line::from(format!("  {}", names.join(", "))));
    if details.moves.len() > MOVE_PREVIEW {
        lines.push(Line::from(Span::styled(
            format!("  +{} more moves", details.moves.len() - MOVE_PREVIEW),
            dim,
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Press s for stats, Esc to go back", dim)));

    lines
}

/// `generation-iv` -> `Generation IV`.
fn format_generation(name: &str) -> String {
    match name.split_once('-') {
        Some((prefix, numeral)) => format!("{} {}", display_name(prefix), numeral.to_uppercase()),
        None => display_name(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{AbilitySlot, MoveSlot, NamedResource, Sprites};

    fn named(name: &str) -> NamedResource {
        NamedResource {
            name: name.into(),
            url: String::new(),
        }
    }

    fn details(moves: usize) -> PokemonDetails {
        PokemonDetails {
            id: 1,
            name: "bulbasaur".into(),
            sprites: Sprites::default(),
            types: vec![],
            height: 7,
            weight: 69,
            abilities: vec![
                AbilitySlot {
                    ability: named("overgrow"),
                    is_hidden: false,
                },
                AbilitySlot {
                    ability: named("chlorophyll"),
                    is_hidden: true,
                },
            ],
            stats: vec![],
            moves: (0..moves)
                .map(|i| MoveSlot {
                    move_: named(&format!("move-{i}")),
                })
                .collect(),
            species: None,
        }
    }

    fn text(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| &*s.content).collect())
            .collect()
    }

    #[test]
    fn summarises_moves_past_the_preview() {
        let rendered = text(&detail_lines(&details(23), None));
        assert!(rendered.iter().any(|l| l == "  +3 more moves"));

        let rendered = text(&detail_lines(&details(20), None));
        assert!(!rendered.iter().any(|l| l.contains("more moves")));
    }

    #[test]
    fn missing_species_shows_placeholders() {
        let rendered = text(&detail_lines(&details(0), None));
        assert!(rendered.contains(&"No description available".to_string()));
        assert!(rendered.iter().any(|l| l.starts_with("Generation") && l.ends_with("Unknown")));
        assert!(!rendered.iter().any(|l| l.starts_with("Habitat")));
        assert!(rendered.contains(&"  Chlorophyll (Hidden)".to_string()));
        assert!(rendered.iter().any(|l| l.ends_with("0.7 m")));
        assert!(rendered.iter().any(|l| l.ends_with("6.9 kg")));
    }

    #[test]
    fn loaded_species_fills_about_section() {
        let species = Species {
            flavor_text_entries: vec![],
            color: None,
            habitat: Some(named("grassland")),
            generation: Some(named("generation-i")),
        };
        let rendered = text(&detail_lines(
            &details(0),
            Some(QueryState::Loaded(&species)),
        ));
        assert!(rendered.contains(&"No English description available".to_string()));
        assert!(rendered.iter().any(|l| l.ends_with("Grassland")));
        assert!(rendered.iter().any(|l| l.ends_with("Generation I")));
    }

    #[test]
    fn formats_generation_numerals() {
        assert_eq!(format_generation("generation-iv"), "Generation IV");
        assert_eq!(format_generation("kanto"), "Kanto");
    }
}
