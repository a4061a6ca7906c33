pub mod alert;
pub mod auth_form;
pub mod card;
pub mod catalog;
pub mod command_bar;
pub mod details;
pub mod help;
pub mod input;
pub mod settings;
pub mod stats;
pub mod status_bar;
pub mod tab_bar;
pub mod team;

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout};
use ratatui::style::Color;

use crate::app::{App, AppMode};
use crate::nav::{AuthPhase, Route};

use alert::AlertPopup;
use auth_form::AuthFormView;
use catalog::CatalogView;
use command_bar::CommandBar;
use details::DetailsView;
use help::HelpView;
use settings::SettingsView;
use stats::StatsSheet;
use status_bar::StatusBar;
use tab_bar::TabBar;
use team::TeamView;

pub fn draw(frame: &mut Frame, app: &App) {
    let area = frame.area();

    match app.phase() {
        // Nothing to show until the first auth event arrives.
        AuthPhase::Initializing => {}
        AuthPhase::Unauthenticated => {
            let signup = matches!(app.route(), Some(Route::Signup));
            frame.render_widget(AuthFormView::new(&app.auth_form, signup), area);
        }
        AuthPhase::Authenticated => draw_tabs(frame, app),
    }

    // Alerts render on top of everything.
    if let Some(ref alert) = app.alert {
        frame.render_widget(AlertPopup::new(alert), frame.area());
    }
}

fn draw_tabs(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Layout: tab bar + main content + status bar + optional command bar
    let bottom_height = if app.mode != AppMode::Normal { 2 } else { 1 };

    let [tab_area, main_area, bottom_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(1),
        Constraint::Length(bottom_height),
    ])
    .areas(area);

    frame.render_widget(TabBar::new(app.active_tab()), tab_area);

    if app.mode != AppMode::Normal {
        let [status_area, cmd_area] =
            Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).areas(bottom_area);
        frame.render_widget(StatusBar::new(app), status_area);
        frame.render_widget(CommandBar::new(app), cmd_area);
    } else {
        frame.render_widget(StatusBar::new(app), bottom_area);
    }

    match app.route() {
        Some(Route::Home) => frame.render_widget(CatalogView::new(app), main_area),
        Some(Route::Team) => frame.render_widget(TeamView, main_area),
        Some(Route::Settings) => frame.render_widget(SettingsView::new(app), main_area),
        Some(Route::PokemonDetails(params)) => {
            frame.render_widget(DetailsView::new(app, &params), main_area);
            if app.stats_open
                && let Some(details) = app.details.get(&params.url, std::time::Instant::now())
            {
                frame.render_widget(StatsSheet::new(details), main_area);
            }
        }
        _ => {}
    }

    if app.show_help {
        frame.render_widget(HelpView::new(), main_area);
    }
}

/// `mr-mime` -> `Mr Mime`.
pub fn display_name(name: &str) -> String {
    name.split(['-', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Tag colour for a type name.
pub fn type_color(type_name: &str) -> Color {
    match type_name {
        "fire" => Color::Rgb(240, 128, 48),
        "water" => Color::Rgb(104, 144, 240),
        "grass" => Color::Rgb(120, 200, 80),
        "electric" => Color::Rgb(248, 208, 48),
        "ice" => Color::Rgb(152, 216, 216),
        "fighting" => Color::Rgb(192, 48, 40),
        "poison" => Color::Rgb(160, 64, 160),
        "ground" => Color::Rgb(224, 192, 104),
        "flying" => Color::Rgb(168, 144, 240),
        "psychic" => Color::Rgb(248, 88, 136),
        "bug" => Color::Rgb(168, 184, 32),
        "rock" => Color::Rgb(184, 160, 56),
        "ghost" => Color::Rgb(112, 88, 152),
        "dragon" => Color::Rgb(112, 56, 248),
        "dark" => Color::Rgb(112, 88, 72),
        "steel" => Color::Rgb(184, 184, 208),
        "fairy" => Color::Rgb(238, 153, 172),
        _ => Color::Gray,
    }
}
