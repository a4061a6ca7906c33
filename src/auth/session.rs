//! The signed-in session, persisted between launches.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::auth::AuthUser;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn default_session_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config/pokedextui/session.json")
}

pub fn save_session(path: &Path, user: &AuthUser) -> Result<(), SessionError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(user)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load_session(path: &Path) -> Result<Option<AuthUser>, SessionError> {
    if !path.exists() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(path)?;
    let user: AuthUser = serde_json::from_str(&json)?;
    Ok(Some(user))
}

/// Remove the persisted session. Succeeds when there is none.
pub fn clear_session(path: &Path) -> Result<(), SessionError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ash() -> AuthUser {
        AuthUser {
            local_id: "uid-1".into(),
            email: Some("ash@pallet.town".into()),
            display_name: Some("Ash".into()),
            photo_url: None,
            id_token: "id".into(),
            refresh_token: "refresh".into(),
            expires_at: None,
        }
    }

    #[test]
    fn save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/session.json");

        assert!(load_session(&path).unwrap().is_none());
        save_session(&path, &ash()).unwrap();
        assert_eq!(load_session(&path).unwrap(), Some(ash()));

        clear_session(&path).unwrap();
        assert!(load_session(&path).unwrap().is_none());
        clear_session(&path).unwrap();
    }

    #[test]
    fn corrupt_session_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_session(&path), Err(SessionError::Json(_))));
    }
}
