use url::Url;

use crate::nav::Tab;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Tab(Tab),
    /// Open the detail screen for a name, id or detail URL.
    Open(String),
    Logout,
    Help,
    Quit,
}

pub fn parse_command(input: &str) -> Option<Command> {
    let input = input.strip_prefix(':').unwrap_or(input).trim();

    if input.is_empty() {
        return None;
    }

    let (cmd, args) = match input.split_once(char::is_whitespace) {
        Some((cmd, args)) => (cmd, args.trim()),
        None => (input, ""),
    };

    match cmd {
        "open" | "o" if !args.is_empty() => Some(Command::Open(args.to_owned())),
        "catalog" | "catch" | "c" => Some(Command::Tab(Tab::Catalog)),
        "team" | "t" => Some(Command::Tab(Tab::Team)),
        "settings" | "s" => Some(Command::Tab(Tab::Settings)),
        "logout" | "signout" => Some(Command::Logout),
        "help" | "h" => Some(Command::Help),
        "quit" | "q" => Some(Command::Quit),
        _ => None,
    }
}

/// Which record a user-supplied reference points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PokemonRef {
    /// A name or numeric id, lowercased.
    Name(String),
    /// A detail URL, as carried by list references.
    Url(String),
}

/// Interpret `bulbasaur`, `25` or `https://pokeapi.co/api/v2/pokemon/25/`.
pub fn parse_pokemon_ref(input: &str) -> Option<PokemonRef> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        let url = Url::parse(trimmed).ok()?;
        let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
        let pos = segments.iter().position(|&s| s == "pokemon")?;
        segments.get(pos + 1)?;
        return Some(PokemonRef::Url(url.to_string()));
    }

    let valid = trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    valid.then(|| PokemonRef::Name(trimmed.to_ascii_lowercase()))
}

/// Title for a URL reference: the last path segment.
pub fn name_from_url(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url)
        .to_string()
}
