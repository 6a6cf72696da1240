//! Gmail OAuth2 authentication
//!
//! Installed-app authorization code flow: the consent page redirects to a
//! one-shot loopback listener that captures the code, which is then
//! exchanged at the token endpoint. Grants are cached on disk (with the
//! scopes they cover) and the current access token in memory.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::config::GmailCredentials;

const AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Loopback ports tried in order for the redirect listener
const CALLBACK_PORTS: RangeInclusive<u16> = 8080..=8090;

/// Source of API credentials.
///
/// Implementations acquire lazily, cache internally and refresh as needed;
/// repeated calls are cheap.
pub trait CredentialProvider: Send + Sync {
    fn acquire(&self) -> Result<Credential>;
}

/// Bearer token for the Gmail API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    /// Unix timestamp (seconds) after which the token is invalid
    pub expires_at: Option<i64>,
}

impl Credential {
    /// Seconds of validity a token must have left to be reused
    const EXPIRY_MARGIN_SECS: i64 = 300;

    fn is_fresh(&self) -> bool {
        self.expires_at
            .is_some_and(|at| at > chrono::Utc::now().timestamp() + Self::EXPIRY_MARGIN_SECS)
    }
}

/// On-disk token cache
#[derive(Debug, Serialize, Deserialize)]
struct CachedGrant {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    /// Empty in caches written before scopes were recorded
    #[serde(default)]
    scopes: Vec<String>,
}

impl CachedGrant {
    fn credential(&self) -> Credential {
        Credential {
            access_token: self.access_token.clone(),
            expires_at: self.expires_at,
        }
    }
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    refresh_token: Option<String>,
    /// Lifetime in seconds
    expires_in: Option<u64>,
}

/// OAuth2 credential provider backed by a JSON token cache
pub struct GmailAuth {
    client: GmailCredentials,
    token_path: PathBuf,
    scopes: Vec<String>,
    current: Mutex<Option<Credential>>,
}

impl GmailAuth {
    /// Read-only access is all a size scan needs
    pub const GMAIL_READONLY_SCOPE: &'static str =
        "https://www.googleapis.com/auth/gmail.readonly";

    pub fn new(client: GmailCredentials, token_path: impl Into<PathBuf>) -> Self {
        Self {
            client,
            token_path: token_path.into(),
            scopes: vec![Self::GMAIL_READONLY_SCOPE.to_string()],
            current: Mutex::new(None),
        }
    }

    /// Request a different scope set
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Valid credential from the token cache, a refresh, or a new authorization
    fn obtain(&self) -> Result<Credential> {
        if let Some(cached) = self.read_cache()? {
            let credential = cached.credential();
            if credential.is_fresh() {
                debug!("Using cached token from {}", self.token_path.display());
                return Ok(credential);
            }

            if let Some(refresh_token) = cached.refresh_token {
                match self.refresh(&refresh_token) {
                    Ok(grant) => {
                        info!("Refreshed Gmail access token");
                        return self.write_cache(grant);
                    }
                    Err(e) => warn!("Token refresh failed, re-authorizing: {:#}", e),
                }
            }
        }

        let grant = self.authorize()?;
        self.write_cache(grant)
    }

    fn consent_url(&self, redirect_uri: &str) -> Result<url::Url> {
        let scope = self.scopes.join(" ");
        let url = url::Url::parse_with_params(
            AUTHORIZE_ENDPOINT,
            [
                ("client_id", self.client.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )?;
        Ok(url)
    }

    /// Interactive authorization through the browser
    fn authorize(&self) -> Result<TokenGrant> {
        let (listener, port) = bind_callback_listener()?;
        let redirect_uri = format!("http://localhost:{}", port);
        let consent_url = self.consent_url(&redirect_uri)?;

        eprintln!("\nGmail authorization required.");
        eprintln!("Opening the consent page; if no browser appears, visit:\n{}", consent_url);
        if let Err(e) = open::that(consent_url.as_str()) {
            warn!("Failed to open browser: {}", e);
        }

        let code = accept_callback(listener)?;
        let grant = self.request_token(
            &[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
            ],
            "exchange authorization code",
        )?;

        info!("Gmail authorization complete");
        Ok(grant)
    }

    fn refresh(&self, refresh_token: &str) -> Result<TokenGrant> {
        let mut grant = self.request_token(
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ],
            "refresh access token",
        )?;

        // Refresh responses usually omit the refresh token
        grant
            .refresh_token
            .get_or_insert_with(|| refresh_token.to_string());
        Ok(grant)
    }

    /// POST to the token endpoint with the client credentials added
    fn request_token(&self, params: &[(&str, &str)], what: &str) -> Result<TokenGrant> {
        let mut form = vec![
            ("client_id", self.client.client_id.as_str()),
            ("client_secret", self.client.client_secret.as_str()),
        ];
        form.extend_from_slice(params);

        let mut response = ureq::post(TOKEN_ENDPOINT)
            .send_form(form)
            .with_context(|| format!("Failed to {}", what))?;

        response
            .body_mut()
            .read_json()
            .with_context(|| format!("Failed to parse token response ({})", what))
    }

    /// Read the token cache. A cache granted for other scopes is an error
    /// rather than silently reused or replaced.
    fn read_cache(&self) -> Result<Option<CachedGrant>> {
        let content = match fs::read_to_string(&self.token_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read token cache {}", self.token_path.display())
                });
            }
        };
        let cached: CachedGrant = serde_json::from_str(&content).with_context(|| {
            format!("Failed to parse token cache {}", self.token_path.display())
        })?;

        if !cached.scopes.is_empty() {
            let granted: BTreeSet<&str> = cached.scopes.iter().map(String::as_str).collect();
            let wanted: BTreeSet<&str> = self.scopes.iter().map(String::as_str).collect();
            if granted != wanted {
                anyhow::bail!(
                    "Token cache {} was granted scopes {:?} but {:?} are required; delete it to re-authorize",
                    self.token_path.display(),
                    cached.scopes,
                    self.scopes
                );
            }
        }

        Ok(Some(cached))
    }

    fn write_cache(&self, grant: TokenGrant) -> Result<Credential> {
        if let Some(parent) = self.token_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let cached = CachedGrant {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_at: grant
                .expires_in
                .map(|secs| chrono::Utc::now().timestamp() + secs as i64),
            scopes: self.scopes.clone(),
        };

        fs::write(&self.token_path, serde_json::to_string_pretty(&cached)?)
            .with_context(|| format!("Failed to write token cache {}", self.token_path.display()))?;

        Ok(cached.credential())
    }
}

impl CredentialProvider for GmailAuth {
    fn acquire(&self) -> Result<Credential> {
        // Held for the whole acquisition: at most one authorization at a time
        let mut current = self
            .current
            .lock()
            .map_err(|_| anyhow::anyhow!("Credential cache lock poisoned"))?;

        if let Some(credential) = current.as_ref()
            && credential.is_fresh()
        {
            return Ok(credential.clone());
        }

        let credential = self.obtain()?;
        *current = Some(credential.clone());
        Ok(credential)
    }
}

fn bind_callback_listener() -> Result<(TcpListener, u16)> {
    CALLBACK_PORTS
        .clone()
        .find_map(|port| {
            TcpListener::bind(("127.0.0.1", port))
                .ok()
                .map(|listener| (listener, port))
        })
        .with_context(|| {
            format!(
                "No free loopback port in {}-{} for the OAuth redirect",
                CALLBACK_PORTS.start(),
                CALLBACK_PORTS.end()
            )
        })
}

/// Serve the single redirect request and return the authorization code
fn accept_callback(listener: TcpListener) -> Result<String> {
    let (mut stream, _) = listener
        .accept()
        .context("Failed to accept the OAuth redirect")?;

    let mut request_line = String::new();
    BufReader::new(&stream)
        .read_line(&mut request_line)
        .context("Failed to read the OAuth redirect")?;

    let code = parse_callback(&request_line);
    let (status, message) = match &code {
        Ok(_) => ("200 OK", "Authorization complete. You can close this window."),
        Err(_) => ("400 Bad Request", "Authorization failed. Please try again."),
    };
    let page = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/plain; charset=utf-8\r\nConnection: close\r\n\r\n{message}\n"
    );
    if let Err(e) = stream.write_all(page.as_bytes()) {
        debug!("Failed to answer the OAuth redirect: {}", e);
    }

    code
}

/// Pull the code (or the error) out of `GET /?code=...&scope=... HTTP/1.1`
fn parse_callback(request_line: &str) -> Result<String> {
    let target = request_line
        .split_whitespace()
        .nth(1)
        .context("Malformed OAuth redirect request")?;
    let callback = url::Url::parse("http://localhost")?.join(target)?;

    let mut code = None;
    for (key, value) in callback.query_pairs() {
        match key.as_ref() {
            "error" => anyhow::bail!("Authorization was denied: {}", value),
            "code" => code = Some(value.into_owned()),
            _ => {}
        }
    }
    code.context("OAuth redirect carried no authorization code")
}
