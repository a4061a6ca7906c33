pub mod api;
pub mod app;
pub mod auth;
pub mod catalog;
pub mod cli;
pub mod command;
pub mod config;
pub mod event;
pub mod nav;
pub mod notify;
pub mod query;
pub mod store;
pub mod ui;

use std::fs::{self, OpenOptions};
use std::sync::{Arc, Mutex};

use app::{App, AppContext};
use clap::Parser;
use cli::{Cli, CliCommand};
use config::load_config;
use nav::Navigator;
use notify::{MessageKind, RemoteMessage};
use store::{FileStore, default_state_path};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        // No subcommand or explicit `tui` → launch the interactive TUI.
        None | Some(CliCommand::Tui) => run_tui(None).await,
        // `open` → the TUI with a cold-start notification.
        Some(CliCommand::Open { target }) => {
            run_tui(Some(target.into_message(MessageKind::Opened))).await
        }
        // All other subcommands → non-interactive output.
        Some(cmd) => cli::run_command(cmd).await,
    }
}

/// Log to a file when RUST_LOG is set; the terminal belongs to the TUI.
fn init_tracing() {
    if std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    let Some(dir) = dirs::home_dir().map(|home| home.join(".config/pokedextui")) else {
        return;
    };
    let file = fs::create_dir_all(&dir).and_then(|()| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("pokedextui.log"))
    });
    match file {
        Ok(file) => tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init(),
        Err(e) => eprintln!("Warning: cannot open log file: {e}"),
    }
}

/// Launch the interactive TUI.
async fn run_tui(initial_notification: Option<RemoteMessage>) -> color_eyre::Result<()> {
    let config = load_config();
    let api = Arc::new(cli::build_api_client(&config));
    let auth = cli::build_auth_service(&config);

    let ctx = AppContext {
        api,
        auth,
        navigator: Navigator::new(),
        store: Arc::new(FileStore::new(default_state_path())),
        cancel: CancellationToken::new(),
        config,
    };

    let terminal = ratatui::init();
    let result = App::new(ctx)
        .with_initial_notification(initial_notification)
        .run(terminal)
        .await;
    ratatui::restore();
    result
}
