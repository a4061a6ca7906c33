use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph, Widget};

pub struct TeamView;

impl Widget for TeamView {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" My Team ")
            .title_style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .border_style(Style::default().fg(Color::DarkGray));

        let inner = block.inner(area);
        block.render(area, buf);

        let top = inner.y + inner.height.saturating_sub(2) / 2;
        let text_area = Rect::new(inner.x, top, inner.width, inner.height.min(2));
        Paragraph::new(vec![
            Line::from("My Team").style(Style::default().add_modifier(Modifier::BOLD)),
            Line::from("Your captured Pokemon will appear here")
                .style(Style::default().fg(Color::DarkGray)),
        ])
        .alignment(Alignment::Center)
        .render(text_area, buf);
    }
}
