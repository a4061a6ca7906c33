//! Google sign-in: OAuth 2.0 Authorization Code flow with PKCE over a
//! loopback redirect. The resulting access token is exchanged for a
//! Firebase session by [`crate::auth::AuthService`].

use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge, RedirectUrl,
    Scope, TokenResponse, TokenUrl,
};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::auth::credentials::GoogleCredentials;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

const DEFAULT_SCOPES: &[&str] = &["openid", "email", "profile"];

#[derive(Debug, Error)]
pub enum GoogleAuthError {
    #[error("oauth2 request error: {0}")]
    Request(String),
    #[error("invalid oauth2 endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("CSRF state mismatch")]
    CsrfMismatch,
    #[error("sign-in was cancelled: {0}")]
    Denied(String),
    #[error("callback missing authorization code")]
    MissingCode,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Query parameters of the redirect request.
#[derive(Debug, Default, PartialEq, Eq)]
struct Callback {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Parse the request line of the browser's redirect, e.g.
/// `GET /?code=4%2F0A&state=xyz HTTP/1.1`.
fn parse_callback(request: &str) -> Callback {
    let request_line = request.lines().next().unwrap_or("");
    let path = request_line.split_whitespace().nth(1).unwrap_or("/");

    let mut callback = Callback::default();
    let Ok(url) = url::Url::parse(&format!("http://127.0.0.1{path}")) else {
        return callback;
    };
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => callback.code = Some(value.into_owned()),
            "state" => callback.state = Some(value.into_owned()),
            "error" => callback.error = Some(value.into_owned()),
            _ => {}
        }
    }
    callback
}

/// Run the full Google authorization flow and return an access token.
///
/// 1. Bind a local TCP listener on `callback_port` (0 picks a free port).
/// 2. Open the user's browser to the Google consent page.
/// 3. Wait for the redirect callback.
/// 4. Exchange the authorization code for tokens.
pub async fn start_google_flow(
    creds: &GoogleCredentials,
    callback_port: u16,
) -> Result<String, GoogleAuthError> {
    let listener = TcpListener::bind(("127.0.0.1", callback_port)).await?;
    let local_addr = listener.local_addr()?;
    let redirect_url = format!("http://127.0.0.1:{}", local_addr.port());

    let mut client = BasicClient::new(ClientId::new(creds.client_id.clone()))
        .set_auth_uri(AuthUrl::new(AUTH_URL.to_string())?)
        .set_token_uri(TokenUrl::new(TOKEN_URL.to_string())?)
        .set_redirect_uri(RedirectUrl::new(redirect_url)?);

    if let Some(ref secret) = creds.client_secret {
        client = client.set_client_secret(ClientSecret::new(secret.clone()));
    }

    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let mut auth_request = client.authorize_url(CsrfToken::new_random);
    for scope in DEFAULT_SCOPES {
        auth_request = auth_request.add_scope(Scope::new(scope.to_string()));
    }
    let (auth_url, csrf_state) = auth_request.set_pkce_challenge(pkce_challenge).url();

    tracing::info!(port = local_addr.port(), "opening browser for google sign-in");
    let auth_url_str = auth_url.to_string();
    if let Err(e) = open::that(&auth_url_str) {
        tracing::warn!("failed to open browser: {e}");
        eprintln!("Open this URL in your browser:\n{auth_url_str}");
    }

    let (mut stream, _addr) = listener.accept().await?;
    let mut buf = vec![0u8; 4096];
    let n = stream.read(&mut buf).await?;
    let callback = parse_callback(&String::from_utf8_lossy(&buf[..n]));

    let response = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n\
        <html><body><h2>Signed in to pokedextui</h2>\
        <p>You can close this tab.</p></body></html>";
    stream.write_all(response.as_bytes()).await?;

    if let Some(error) = callback.error {
        return Err(GoogleAuthError::Denied(error));
    }
    let state = callback.state.ok_or(GoogleAuthError::CsrfMismatch)?;
    if state != *csrf_state.secret() {
        return Err(GoogleAuthError::CsrfMismatch);
    }
    let code = callback.code.ok_or(GoogleAuthError::MissingCode)?;

    let http_client = reqwest::Client::new();
    let token_result = client
        .exchange_code(AuthorizationCode::new(code))
        .set_pkce_verifier(pkce_verifier)
        .request_async(&http_client)
        .await
        .map_err(|e| GoogleAuthError::Request(e.to_string()))?;

    Ok(token_result.access_token().secret().clone())
}
