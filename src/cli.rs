use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{self, eyre};

use crate::api::PokeApiClient;
use crate::auth::credentials::load_credentials;
use crate::auth::session::default_session_path;
use crate::auth::{AuthService, AuthSettings};
use crate::command::{PokemonRef, parse_pokemon_ref};
use crate::config::{AppConfig, load_config};
use crate::notify::{MessageKind, RemoteMessage, send_notification};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "pokedextui", about = "TUI and CLI for browsing the Pokedex")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

/// Where a notification should take the user.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Screen name (Home, Team, Settings, PokemonDetails, ...)
    #[arg(long)]
    pub screen: String,
    /// Detail URL, for PokemonDetails
    #[arg(long)]
    pub url: Option<String>,
    /// Display name, for PokemonDetails
    #[arg(long)]
    pub name: Option<String>,
}

impl Target {
    pub fn into_message(self, kind: MessageKind) -> RemoteMessage {
        RemoteMessage::to_screen(kind, &self.screen, self.url, self.name)
    }
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Launch the interactive TUI (default)
    Tui,
    /// Launch the TUI as if opened from a notification
    Open {
        #[command(flatten)]
        target: Target,
    },
    /// Send a notification to a running instance
    Notify {
        #[command(flatten)]
        target: Target,
        /// opened, foreground or background
        #[arg(long, default_value_t = MessageKind::Opened)]
        kind: MessageKind,
    },
    /// Sign in with Google in the browser and save the session
    Auth,
    /// Forget the saved session
    Logout,
    /// List one catalog page (JSONL)
    List {
        #[arg(long, default_value_t = 0)]
        offset: u32,
        /// Page size; defaults to the configured page size
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Show one Pokemon by name, id or detail URL (JSONL)
    Show {
        reference: String,
    },
}

// ---------------------------------------------------------------------------
// Client construction (shared with main.rs TUI path)
// ---------------------------------------------------------------------------

pub fn build_api_client(config: &AppConfig) -> PokeApiClient {
    PokeApiClient::new(&config.api_base_url)
}

/// Auth service backed by the saved session. Missing credentials only
/// surface when a sign-in is attempted.
pub fn build_auth_service(config: &AppConfig) -> AuthService {
    let credentials = load_credentials();
    if credentials.firebase_api_key.is_none() {
        tracing::warn!("FIREBASE_API_KEY is not set; email sign-in will fail");
    }
    let auth = AuthService::new(AuthSettings {
        identity_base_url: config.identity_base_url.clone(),
        credentials,
        oauth_callback_port: config.oauth_callback_port,
        session_path: Some(default_session_path()),
    });
    auth.restore();
    auth
}

/// Detail URL for a name, id or URL given on the command line.
fn resolve_detail_url(client: &PokeApiClient, reference: &str) -> eyre::Result<String> {
    match parse_pokemon_ref(reference) {
        Some(PokemonRef::Name(name)) => Ok(client.pokemon_url(&name)),
        Some(PokemonRef::Url(url)) => Ok(url),
        None => Err(eyre!("not a Pokemon name, id or URL: {reference}")),
    }
}

// ---------------------------------------------------------------------------
// Command execution
// ---------------------------------------------------------------------------

pub async fn run_command(cmd: CliCommand) -> eyre::Result<()> {
    let config = load_config();

    match cmd {
        CliCommand::Tui | CliCommand::Open { .. } => {
            unreachable!("tui and open are handled in main")
        }

        CliCommand::Notify { target, kind } => {
            let screen = target.screen.clone();
            let message = target.into_message(kind);
            send_notification(config.notification_port, &message)
                .await
                .map_err(|e| eyre!("no running instance to notify: {e}"))?;
            println!("Sent {kind} notification for {screen}");
        }

        CliCommand::Auth => {
            let auth = build_auth_service(&config);
            if let Some(user) = auth.current_user() {
                eprintln!("Already signed in as {}; signing in again.", user.label());
            }
            let user = auth
                .sign_in_with_google()
                .await
                .map_err(|e| eyre!("Google Sign-In failed: {e}"))?;
            println!(
                "Signed in as {}. Session saved to {}",
                user.label(),
                default_session_path().display()
            );
        }

        CliCommand::Logout => {
            let auth = build_auth_service(&config);
            auth.sign_out().map_err(|e| eyre!("Sign out failed: {e}"))?;
            println!("Signed out.");
        }

        CliCommand::List { offset, limit } => {
            let client = build_api_client(&config);
            let limit = limit.unwrap_or_else(|| config.page_limit());
            let page = client
                .list_pokemon(limit, offset)
                .await
                .map_err(|e| eyre!("{e}"))?;
            for reference in &page.results {
                let line = serde_json::to_string(reference)?;
                println!("{line}");
            }
        }

        CliCommand::Show { reference } => {
            let client = build_api_client(&config);
            let url = resolve_detail_url(&client, &reference)?;
            let details = client.get_details(&url).await.map_err(|e| eyre!("{e}"))?;

            let species = match &details.species {
                Some(resource) => match client.get_species(&resource.url).await {
                    Ok(species) => Some(species),
                    Err(e) => {
                        tracing::warn!(error = %e, "species fetch failed");
                        None
                    }
                },
                None => None,
            };

            let line = serde_json::to_string(&serde_json::json!({
                "pokemon": details,
                "description": crate::api::types::describe(species.as_ref()),
                "species": species,
            }))?;
            println!("{line}");
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
