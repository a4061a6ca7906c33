use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Widget};

use crate::nav::Tab;

const SECTIONS: &[(&str, &[(&str, &str)])] = &[
    (
        "Catalog",
        &[
            ("j/k", "Move down / up"),
            ("g/G", "First / last loaded"),
            ("Enter", "Open details"),
            ("n", "Load next page"),
            ("r", "Retry failed item"),
            ("L", "Sign out"),
        ],
    ),
    (
        "Details",
        &[("s", "Toggle stats"), ("r", "Retry"), ("Esc/q", "Go back")],
    ),
    (
        "Sign in",
        &[
            ("Tab", "Next field"),
            ("Enter", "Submit"),
            ("Ctrl-G", "Google Sign-In"),
            ("Ctrl-N", "Switch to sign up / back"),
        ],
    ),
    (
        "Commands",
        &[
            (":", "Command mode"),
            (":open <x>", "Open by name, id or URL"),
            ("?", "This help screen"),
            ("Ctrl-C", "Quit"),
        ],
    ),
];

/// Keybinding overlay.
#[derive(Default)]
pub struct HelpView;

impl HelpView {
    pub fn new() -> Self {
        Self
    }
}

impl Widget for HelpView {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let key_style = Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD);
        let section_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);

        let mut lines = vec![Line::from(Span::styled("Tabs", section_style))];
        for (i, tab) in Tab::ALL.iter().enumerate() {
            lines.push(binding_line(&(i + 1).to_string(), tab.label(), key_style));
        }
        lines.push(binding_line("Tab", "Next tab", key_style));

        for (title, bindings) in SECTIONS {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(*title, section_style)));
            for (key, desc) in *bindings {
                lines.push(binding_line(key, desc, key_style));
            }
        }

        // Centre the panel, shrinking to fit small terminals.
        let width = 56u16.min(area.width.saturating_sub(4));
        let height = (lines.len() as u16 + 2).min(area.height.saturating_sub(2));
        let panel = Rect::new(
            area.x + area.width.saturating_sub(width) / 2,
            area.y + area.height.saturating_sub(height) / 2,
            width,
            height,
        );

        Clear.render(panel, buf);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Help ")
            .title_style(section_style)
            .border_style(Style::default().fg(Color::Cyan));
        let inner = block.inner(panel);
        block.render(panel, buf);

        Paragraph::new(lines).render(inner, buf);
    }
}

fn binding_line(key: &str, desc: &str, key_style: Style) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {key:<12}"), key_style),
        Span::raw(desc.to_string()),
    ])
}
