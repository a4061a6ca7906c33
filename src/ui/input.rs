use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::Widget;
use unicode_width::UnicodeWidthChar;

/// A simple single-line text input renderer.
///
/// Renders the prompt + text content, with a cursor indicator at the end
/// while focused. Masked inputs show one bullet per character.
pub struct TextInput<'a> {
    pub prompt: &'a str,
    pub text: &'a str,
    pub style: Style,
    pub masked: bool,
    pub focused: bool,
}

impl<'a> TextInput<'a> {
    pub fn new(prompt: &'a str, text: &'a str) -> Self {
        Self {
            prompt,
            text,
            style: Style::default().fg(Color::White),
            masked: false,
            focused: true,
        }
    }

    pub fn masked(mut self, masked: bool) -> Self {
        self.masked = masked;
        self
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }
}

impl Widget for TextInput<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }

        let body = if self.masked {
            "\u{2022}".repeat(self.text.chars().count())
        } else {
            self.text.to_string()
        };
        let cursor = if self.focused { "\u{2588}" } else { "" };
        let display = format!("{}{body}{cursor}", self.prompt);

        // If the display is wider than the area, show the rightmost portion.
        let visible = tail_to_width(&display, area.width as usize);
        buf.set_string(area.x, area.y, visible, self.style);
    }
}

/// Longest suffix of `text` that fits in `width` terminal columns.
fn tail_to_width(text: &str, width: usize) -> &str {
    let mut used = 0;
    let mut start = text.len();
    for (idx, ch) in text.char_indices().rev() {
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        start = idx;
    }
    &text[start..]
}
