use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Widget};

use crate::app::{AuthForm, FormField};
use crate::ui::input::TextInput;

/// Login or signup panel, centered on screen.
pub struct AuthFormView<'a> {
    form: &'a AuthForm,
    signup: bool,
}

impl<'a> AuthFormView<'a> {
    pub fn new(form: &'a AuthForm, signup: bool) -> Self {
        Self { form, signup }
    }

    fn fields(&self) -> Vec<(FormField, &'static str, &'a str)> {
        let mut fields = vec![
            (FormField::Email, "Email: ", self.form.email.as_str()),
            (FormField::Password, "Password: ", self.form.password.as_str()),
        ];
        if self.signup {
            fields.push((
                FormField::ConfirmPassword,
                "Confirm Password: ",
                self.form.confirm_password.as_str(),
            ));
        }
        fields
    }
}

impl Widget for AuthFormView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let fields = self.fields();

        // title + subtitle + blank + 2 rows per field + blank + hints, plus border
        let height = (fields.len() as u16 * 2 + 6).min(area.height);
        let width = 56u16.min(area.width.saturating_sub(4));
        let x = area.x + (area.width.saturating_sub(width)) / 2;
        let y = area.y + (area.height.saturating_sub(height)) / 2;
        let panel = Rect::new(x, y, width, height);

        Clear.render(panel, buf);

        let (title, subtitle) = if self.signup {
            (" Create Account ", "Sign up to start catching")
        } else {
            (" Welcome Back ", "Sign in to continue")
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .title_alignment(Alignment::Center)
            .title_style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .border_style(Style::default().fg(Color::Cyan));

        let inner = block.inner(panel);
        block.render(panel, buf);
        if inner.height == 0 {
            return;
        }

        buf.set_string(
            inner.x + 1,
            inner.y,
            subtitle,
            Style::default().fg(Color::DarkGray),
        );

        let mut row = inner.y + 2;
        let bottom = inner.y + inner.height;
        for (field, prompt, value) in fields {
            if row >= bottom {
                return;
            }
            let focused = field == self.form.focus && !self.form.submitting;
            let style = if focused {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::White)
            };
            TextInput::new(prompt, value)
                .masked(field != FormField::Email)
                .focused(focused)
                .style(style)
                .render(
                    Rect::new(inner.x + 1, row, inner.width.saturating_sub(2), 1),
                    buf,
                );
            row += 2;
        }

        if row >= bottom {
            return;
        }
        let hint = if self.form.submitting {
            Line::from(Span::styled(
                if self.signup {
                    "Creating account..."
                } else {
                    "Signing in..."
                },
                Style::default().fg(Color::Yellow),
            ))
        } else if self.signup {
            hint_line(&[("Enter", "sign up"), ("Ctrl-N", "back to login"), ("Esc", "back")])
        } else {
            hint_line(&[
                ("Enter", "sign in"),
                ("Ctrl-G", "Google"),
                ("Ctrl-N", "sign up"),
                ("Esc", "quit"),
            ])
        };
        Paragraph::new(hint).render(
            Rect::new(inner.x + 1, row, inner.width.saturating_sub(2), 1),
            buf,
        );
    }
}

fn hint_line(pairs: &[(&'static str, &'static str)]) -> Line<'static> {
    let mut spans = Vec::new();
    for (i, (key, desc)) in pairs.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw("  "));
        }
        spans.push(Span::styled(
            *key,
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(
            format!(" {desc}"),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}
