use std::path::PathBuf;

/// Google OAuth 2.0 client used for federated sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: Option<String>,
}

/// All detected credentials bundled together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialSet {
    /// Web API key of the Firebase project.
    pub firebase_api_key: Option<String>,
    pub google: Option<GoogleCredentials>,
}

/// Return candidate .env paths in priority order.
fn env_file_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/pokedextui/.env"));
    }
    paths.push(PathBuf::from(".env"));
    paths
}

/// Load credentials from environment variables, trying .env files first.
///
/// Priority: ~/.config/pokedextui/.env > cwd .env. Variables already set in
/// the environment take precedence. Missing credentials are not an error
/// here; the auth calls that need them fail instead.
pub fn load_credentials() -> CredentialSet {
    // dotenvy never overwrites, so earlier files win.
    for path in env_file_paths() {
        if path.exists()
            && let Err(e) = dotenvy::from_path(&path)
        {
            tracing::warn!(path = %path.display(), error = %e, "failed to load .env file");
        }
    }

    credentials_from(|name| std::env::var(name).ok())
}

fn credentials_from(lookup: impl Fn(&str) -> Option<String>) -> CredentialSet {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    let google = get("GOOGLE_CLIENT_ID").map(|client_id| GoogleCredentials {
        client_id,
        client_secret: get("GOOGLE_CLIENT_SECRET"),
    });

    CredentialSet {
        firebase_api_key: get("FIREBASE_API_KEY"),
        google,
    }
}
