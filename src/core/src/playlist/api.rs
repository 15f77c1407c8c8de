use std::time::{Duration, Instant};

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

/// Tokens are refreshed this long before the server says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// How the client credentials travel in the token request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuth {
    /// HTTP basic auth header (Spotify).
    Basic,
    /// `client_id` / `client_secret` form fields (Google).
    Form,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug)]
struct TokenState {
    refresh_token: String,
    access_token: Option<String>,
    expires_at: Option<Instant>,
}

/// Access-token cache over an OAuth2 refresh-token grant.
pub struct OAuthToken {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    client_auth: ClientAuth,
    state: Mutex<TokenState>,
}

impl OAuthToken {
    pub fn new(
        http: reqwest::Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
        client_auth: ClientAuth,
    ) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            client_auth,
            state: Mutex::new(TokenState {
                refresh_token: refresh_token.into(),
                access_token: None,
                expires_at: None,
            }),
        }
    }

    /// A valid access token, refreshing it when missing or about to expire.
    pub async fn access_token(&self) -> Result<String, String> {
        let mut state = self.state.lock().await;
        if let (Some(token), Some(expires_at)) = (&state.access_token, state.expires_at) {
            if Instant::now() + EXPIRY_MARGIN < expires_at {
                return Ok(token.clone());
            }
        }

        let mut form = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", state.refresh_token.clone()),
        ];
        let mut request = self.http.post(&self.token_url);
        match self.client_auth {
            ClientAuth::Basic => {
                request = request.basic_auth(&self.client_id, Some(&self.client_secret));
            }
            ClientAuth::Form => {
                form.push(("client_id", self.client_id.clone()));
                form.push(("client_secret", self.client_secret.clone()));
            }
        }

        let response = request
            .form(&form)
            .send()
            .await
            .map_err(|err| format!("token refresh request: {err}"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("token refresh rejected ({status}): {body}"));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| format!("token refresh response: {err}"))?;

        // Some servers rotate the refresh token on every grant.
        if let Some(rotated) = token.refresh_token {
            state.refresh_token = rotated;
        }
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        state.expires_at = Some(Instant::now() + lifetime);
        state.access_token = Some(token.access_token.clone());
        tracing::debug!(
            token_url = %self.token_url,
            expires_in = lifetime.as_secs(),
            "oauth token refreshed"
        );
        Ok(token.access_token)
    }

    /// Forget the cached access token so the next call refreshes it.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        state.access_token = None;
        state.expires_at = None;
    }
}

/// JSON API client that attaches a bearer token to every request.
pub struct AuthorizedClient {
    http: reqwest::Client,
    token: OAuthToken,
}

impl AuthorizedClient {
    pub fn new(
        token_url: &str,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
        client_auth: ClientAuth,
    ) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| format!("build http client: {err}"))?;
        let token = OAuthToken::new(
            http.clone(),
            token_url,
            client_id,
            client_secret,
            refresh_token,
            client_auth,
        );
        Ok(Self { http, token })
    }

    pub async fn get(&self, url: &str) -> Result<Value, String> {
        self.send(Method::GET, url, None).await
    }

    /// Send a request and decode the JSON body. An empty body decodes as
    /// `Value::Null`.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value, String> {
        let access_token = self.token.access_token().await?;
        let mut request = self.http.request(method.clone(), url).bearer_auth(access_token);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|err| format!("{method} {url}: {err}"))?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.token.invalidate().await;
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| format!("{method} {url}: read body: {err}"))?;
        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes);
            return Err(format!("{method} {url}: {status}: {}", text.trim()));
        }
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|err| format!("{method} {url}: decode json: {err}"))
    }
}
