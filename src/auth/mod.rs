//! Authentication against the Firebase Identity Toolkit REST API.
//!
//! Supports email/password sign-in and sign-up, and Google federated
//! sign-in (OAuth 2.0 PKCE, then `accounts:signInWithIdp`). The signed-in
//! user is published on a watch channel; every change is an auth change
//! event for the rest of the app.

pub mod credentials;
pub mod google;
pub mod session;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use credentials::{CredentialSet, GoogleCredentials};

pub const DEFAULT_IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("credential error: {0}")]
    Credential(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Error reported by the identity backend, e.g. `EMAIL_NOT_FOUND`.
    #[error("{message}")]
    Firebase { code: u16, message: String },
    #[error("{0}")]
    OAuth2(#[from] google::GoogleAuthError),
    #[error("session error: {0}")]
    Session(#[from] session::SessionError),
    #[error("FIREBASE_API_KEY is not set")]
    NoApiKey,
    #[error("GOOGLE_CLIENT_ID is not set")]
    NoGoogleClient,
    #[error("Passwords do not match")]
    PasswordMismatch,
}

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub local_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthUser {
    /// Name shown in headers: display name, then email, then the uid.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.email.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or(&self.local_id)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IdpRequest {
    post_body: String,
    request_uri: &'static str,
    return_idp_credential: bool,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityResponse {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
    id_token: String,
    refresh_token: String,
    /// Seconds, as a string.
    expires_in: Option<String>,
}

/// Form-encoded credential for `signInWithIdp`.
fn idp_post_body(access_token: &str) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("access_token", access_token)
        .append_pair("providerId", "google.com")
        .finish()
}

impl From<IdentityResponse> for AuthUser {
    fn from(r: IdentityResponse) -> Self {
        let expires_at = r
            .expires_in
            .and_then(|s| s.parse::<i64>().ok())
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs));
        Self {
            local_id: r.local_id,
            email: r.email,
            display_name: r.display_name,
            photo_url: r.photo_url,
            id_token: r.id_token,
            refresh_token: r.refresh_token,
            expires_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: u16,
    message: String,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub identity_base_url: String,
    pub credentials: CredentialSet,
    pub oauth_callback_port: u16,
    /// Where the session is persisted. `None` keeps it in memory only.
    pub session_path: Option<PathBuf>,
}

#[derive(Debug)]
struct Inner {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    google: Option<GoogleCredentials>,
    callback_port: u16,
    session_path: Option<PathBuf>,
    user: watch::Sender<Option<AuthUser>>,
}

/// Shared auth handle. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AuthService {
    inner: Arc<Inner>,
}

impl AuthService {
    pub fn new(settings: AuthSettings) -> Self {
        let (user, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                http_client: reqwest::Client::new(),
                base_url: settings.identity_base_url.trim_end_matches('/').to_string(),
                api_key: settings.credentials.firebase_api_key,
                google: settings.credentials.google,
                callback_port: settings.oauth_callback_port,
                session_path: settings.session_path,
                user,
            }),
        }
    }

    /// Load the persisted session, if any, as the current user. An unreadable
    /// session is logged and treated as signed out.
    pub fn restore(&self) {
        let Some(path) = &self.inner.session_path else {
            return;
        };
        match session::load_session(path) {
            Ok(Some(user)) => {
                tracing::info!(uid = %user.local_id, "restored session");
                self.inner.user.send_replace(Some(user));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "failed to restore session"),
        }
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.inner.user.borrow().clone()
    }

    /// Receiver of auth change events. The current value counts as the
    /// first event.
    pub fn subscribe(&self) -> watch::Receiver<Option<AuthUser>> {
        self.inner.user.subscribe()
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthUser, AuthError> {
        let body = PasswordRequest {
            email: email.trim(),
            password,
            return_secure_token: true,
        };
        let response = self.post("accounts:signInWithPassword", &body).await?;
        Ok(self.establish(response))
    }

    /// Create an account. The confirmation is checked before any request.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<AuthUser, AuthError> {
        if password != confirm_password {
            return Err(AuthError::PasswordMismatch);
        }
        let body = PasswordRequest {
            email: email.trim(),
            password,
            return_secure_token: true,
        };
        let response = self.post("accounts:signUp", &body).await?;
        Ok(self.establish(response))
    }

    /// Run the browser consent flow, then sign in with the Google token.
    pub async fn sign_in_with_google(&self) -> Result<AuthUser, AuthError> {
        let google = self.inner.google.as_ref().ok_or(AuthError::NoGoogleClient)?;
        let access_token = google::start_google_flow(google, self.inner.callback_port).await?;
        self.sign_in_with_google_token(&access_token).await
    }

    pub async fn sign_in_with_google_token(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let body = IdpRequest {
            post_body: idp_post_body(access_token),
            request_uri: "http://localhost",
            return_idp_credential: true,
            return_secure_token: true,
        };
        let response = self.post("accounts:signInWithIdp", &body).await?;
        Ok(self.establish(response))
    }

    /// Forget the session. The user stays signed in if the persisted copy
    /// cannot be removed.
    pub fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(path) = &self.inner.session_path {
            session::clear_session(path)?;
        }
        tracing::info!("signed out");
        self.inner.user.send_replace(None);
        Ok(())
    }

    async fn post<B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<IdentityResponse, AuthError> {
        let api_key = self.inner.api_key.as_deref().ok_or(AuthError::NoApiKey)?;
        let url = format!("{}/{endpoint}", self.inner.base_url);
        tracing::debug!(%endpoint, "identity request");

        let resp = self
            .inner
            .http_client
            .post(&url)
            .query(&[("key", api_key)])
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ErrorEnvelope>(&text) {
                Ok(envelope) => AuthError::Firebase {
                    code: envelope.error.code,
                    message: envelope.error.message,
                },
                Err(_) => AuthError::Firebase {
                    code: status.as_u16(),
                    message: if text.is_empty() {
                        status.to_string()
                    } else {
                        text
                    },
                },
            });
        }

        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| AuthError::Credential(e.to_string()))
    }

    /// Publish the new user and persist the session best-effort.
    fn establish(&self, response: IdentityResponse) -> AuthUser {
        let user = AuthUser::from(response);
        if let Some(path) = &self.inner.session_path
            && let Err(e) = session::save_session(path, &user)
        {
            tracing::warn!(error = %e, "failed to persist session");
        }
        tracing::info!(uid = %user.local_id, "signed in");
        self.inner.user.send_replace(Some(user.clone()));
        user
    }
}

#[cfg(test)]
mod tests {
    use httpmock::MockServer;
    use serde_json::json;

    use super::*;

    fn service(base_url: &str, session_path: Option<PathBuf>) -> AuthService {
        AuthService::new(AuthSettings {
            identity_base_url: base_url.to_string(),
            credentials: CredentialSet {
                firebase_api_key: Some("test-key".into()),
                google: None,
            },
            oauth_callback_port: 0,
            session_path,
        })
    }

    fn identity_body() -> serde_json::Value {
        json!({
            "kind": "identitytoolkit#VerifyPasswordResponse",
            "localId": "uid-1",
            "email": "ash@pallet.town",
            "displayName": "",
            "idToken": "id-token",
            "refreshToken": "refresh-token",
            "expiresIn": "3600",
            "registered": true
        })
    }

    #[tokio::test]
    async fn password_sign_in_publishes_and_persists_user() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/accounts:signInWithPassword")
                    .query_param("key", "test-key")
                    .json_body(json!({
                        "email": "ash@pallet.town",
                        "password": "pikachu",
                        "returnSecureToken": true
                    }));
                then.status(200).json_body(identity_body());
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let auth = service(&server.base_url(), Some(path.clone()));
        let mut rx = auth.subscribe();

        let user = auth
            .sign_in_with_password(" ash@pallet.town ", "pikachu")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(user.local_id, "uid-1");
        assert_eq!(user.label(), "ash@pallet.town");
        assert!(user.expires_at.is_some());
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_ref(), Some(&user));
        assert_eq!(session::load_session(&path).unwrap(), Some(user));
    }

    #[tokio::test]
    async fn backend_error_message_is_surfaced() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("POST").path("/accounts:signInWithPassword");
                then.status(400).json_body(json!({
                    "error": {
                        "code": 400,
                        "message": "INVALID_LOGIN_CREDENTIALS",
                        "errors": []
                    }
                }));
            })
            .await;

        let auth = service(&server.base_url(), None);
        let err = auth.sign_in_with_password("a@b.c", "x").await.unwrap_err();
        assert!(matches!(err, AuthError::Firebase { code: 400, .. }));
        assert_eq!(err.to_string(), "INVALID_LOGIN_CREDENTIALS");
        assert!(auth.current_user().is_none());
    }

    #[tokio::test]
    async fn sign_up_checks_confirmation_before_any_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("POST").path("/accounts:signUp");
                then.status(200).json_body(identity_body());
            })
            .await;

        let auth = service(&server.base_url(), None);
        let err = auth.sign_up("a@b.c", "one", "two").await.unwrap_err();
        assert!(matches!(err, AuthError::PasswordMismatch));
        assert_eq!(err.to_string(), "Passwords do not match");
        mock.assert_hits_async(0).await;

        auth.sign_up("a@b.c", "same", "same").await.unwrap();
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn google_token_is_exchanged_via_idp_endpoint() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/accounts:signInWithIdp")
                    .body_contains("access_token=ya29.token&providerId=google.com");
                then.status(200).json_body(json!({
                    "localId": "uid-2",
                    "email": "misty@cerulean.gym",
                    "displayName": "Misty",
                    "photoUrl": "https://example.com/misty.png",
                    "idToken": "id",
                    "refreshToken": "refresh",
                    "expiresIn": "3600"
                }));
            })
            .await;

        let auth = service(&server.base_url(), None);
        let user = auth.sign_in_with_google_token("ya29.token").await.unwrap();
        mock.assert_async().await;
        assert_eq!(user.label(), "Misty");
    }

    #[test]
    fn idp_body_encodes_the_token() {
        assert_eq!(
            idp_post_body("a+b/c=&d"),
            "access_token=a%2Bb%2Fc%3D%26d&providerId=google.com"
        );
    }

    #[tokio::test]
    async fn missing_credentials_fail_fast() {
        let auth = AuthService::new(AuthSettings {
            identity_base_url: "http://127.0.0.1:9".into(),
            credentials: CredentialSet::default(),
            oauth_callback_port: 0,
            session_path: None,
        });
        assert!(matches!(
            auth.sign_in_with_password("a@b.c", "x").await,
            Err(AuthError::NoApiKey)
        ));
        assert!(matches!(
            auth.sign_in_with_google().await,
            Err(AuthError::NoGoogleClient)
        ));
    }

    #[test]
    fn restore_and_sign_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let user = AuthUser {
            local_id: "uid-1".into(),
            email: None,
            display_name: None,
            photo_url: None,
            id_token: "id".into(),
            refresh_token: "refresh".into(),
            expires_at: None,
        };
        session::save_session(&path, &user).unwrap();

        let auth = service("http://127.0.0.1:9", Some(path.clone()));
        assert!(auth.current_user().is_none());
        auth.restore();
        assert_eq!(auth.current_user(), Some(user));

        auth.sign_out().unwrap();
        assert!(auth.current_user().is_none());
        assert!(!path.exists());
    }
}
