use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use colored::Colorize;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};
use url::Url;

use crate::providers::CliType;

const REDIRECT_URI: &str = "http://localhost:8888/callback";
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);
/// Tokens within this window of expiry are treated as expired.
const EXPIRY_SKEW_MS: i64 = 5 * 60 * 1000;

const SUCCESS_HTML: &str =
    "<h1>✓ Authentication Successful</h1><p>You can close this window and return to the terminal.</p>";
const FAILURE_HTML: &str = "<h1>Authentication Failed</h1><p>You can close this window.</p>";

// ── Token model ───────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    pub token_type: String,
    pub provider: String,
}

impl OAuthToken {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp_millis())
    }

    fn is_expired_at(&self, now_ms: i64) -> bool {
        match self.expires_at {
            None => false,
            Some(expires_at) => expires_at - now_ms < EXPIRY_SKEW_MS,
        }
    }
}

/// Map a token onto the env vars the target CLI reads.
pub fn token_env(token: &OAuthToken, cli_type: CliType) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    match cli_type {
        CliType::Claude => {
            env.insert(
                "ANTHROPIC_AUTH_TOKEN".to_string(),
                format!("bearer_{}", token.access_token),
            );
            env.insert("ANTHROPIC_BEARER_TOKEN".to_string(), token.access_token.clone());
        }
        CliType::Codex => {
            env.insert(
                "OPENAI_API_KEY".to_string(),
                format!("sk-oauth-{}", token.access_token),
            );
            env.insert("OPENAI_BEARER_TOKEN".to_string(), token.access_token.clone());
        }
    }
    env
}

// ── PKCE ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

pub fn generate_pkce_pair() -> PkcePair {
    let mut random = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut random);

    let verifier = URL_SAFE_NO_PAD.encode(random);
    let challenge = code_challenge_s256(&verifier);

    PkcePair { verifier, challenge }
}

pub fn code_challenge_s256(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

fn generate_state() -> String {
    let mut random = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut random);
    random.iter().map(|b| format!("{b:02x}")).collect()
}

// ── Endpoints per CLI ─────────────────────────────────────────────────────────

struct Endpoints {
    provider: &'static str,
    authorize_url: &'static str,
    token_url: &'static str,
    scope: &'static str,
    client_id_env: &'static str,
    client_secret_env: &'static str,
}

fn endpoints(cli_type: CliType) -> Endpoints {
    match cli_type {
        CliType::Claude => Endpoints {
            provider: "anthropic",
            authorize_url: "https://api.anthropic.com/oauth/authorize",
            token_url: "https://api.anthropic.com/oauth/token",
            scope: "claude:api:chat claude:api:usage",
            client_id_env: "ANTHROPIC_CLIENT_ID",
            client_secret_env: "ANTHROPIC_CLIENT_SECRET",
        },
        CliType::Codex => Endpoints {
            provider: "openai",
            authorize_url: "https://platform.openai.com/oauth/authorize",
            token_url: "https://api.openai.com/oauth/token",
            scope: "read:models",
            client_id_env: "OPENAI_CLIENT_ID",
            client_secret_env: "OPENAI_CLIENT_SECRET",
        },
    }
}

fn build_authorize_url(
    ep: &Endpoints,
    client_id: &str,
    pkce: &PkcePair,
    state: &str,
) -> Result<Url> {
    let mut url = Url::parse(ep.authorize_url).context("Invalid authorize endpoint")?;
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", REDIRECT_URI)
        .append_pair("response_type", "code")
        .append_pair("scope", ep.scope)
        .append_pair("code_challenge", &pkce.challenge)
        .append_pair("code_challenge_method", "S256")
        .append_pair("state", state);
    Ok(url)
}

// ── Browser flow ──────────────────────────────────────────────────────────────

/// Run the full PKCE flow for a CLI type and return the resulting token.
pub fn get_token(cli_type: CliType) -> Result<OAuthToken> {
    println!("\n  {} Starting OAuth authentication...\n", "🔐".cyan());

    let ep = endpoints(cli_type);
    let client_id =
        std::env::var(ep.client_id_env).unwrap_or_else(|_| "sweech-cli".to_string());

    let pkce = generate_pkce_pair();
    let state = generate_state();
    let auth_url = build_authorize_url(&ep, &client_id, &pkce, &state)?;

    println!("  {}", "Please complete authentication in your browser".yellow());
    println!("\n  If the browser doesn't open, visit:\n  {}\n", auth_url.as_str().dimmed());

    // Best effort; the URL was printed above
    let _ = open_browser(auth_url.as_str());

    let code = capture_callback(&state)?;
    let response = exchange_code(&ep, &client_id, &code, &pkce.verifier)?;

    token_from_response(&response, ep.provider)
}

fn open_browser(url: &str) -> Result<()> {
    for cmd in ["open", "xdg-open"] {
        if Command::new(cmd).arg(url).output().map(|o| o.status.success()).unwrap_or(false) {
            return Ok(());
        }
    }
    bail!("Could not open browser")
}

// ── Callback listener ─────────────────────────────────────────────────────────

/// One-shot localhost listener: accepts a single request, validates the state
/// parameter, answers with a small HTML page, and returns the auth code.
fn capture_callback(expected_state: &str) -> Result<String> {
    let listener =
        TcpListener::bind("127.0.0.1:8888").context("Cannot bind OAuth callback port 8888")?;

    let mut socket = accept_with_timeout(&listener, CALLBACK_TIMEOUT)?;
    socket.set_read_timeout(Some(CALLBACK_TIMEOUT))?;

    let mut buffer = vec![0u8; 8192];
    let size = socket.read(&mut buffer).context("OAuth callback read failed")?;
    if size == 0 {
        bail!("OAuth callback request is empty");
    }

    let request = String::from_utf8_lossy(&buffer[..size]).to_string();
    let result = parse_callback_request(&request, expected_state);

    let (status, body) = match &result {
        Ok(_) => ("HTTP/1.1 200 OK", SUCCESS_HTML),
        Err(_) => ("HTTP/1.1 400 Bad Request", FAILURE_HTML),
    };
    let response = format!(
        "{status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = socket.write_all(response.as_bytes());

    result
}

/// Poll a nonblocking accept so an abandoned browser flow cannot hang the
/// command forever.
fn accept_with_timeout(listener: &TcpListener, timeout: Duration) -> Result<TcpStream> {
    listener.set_nonblocking(true)?;
    let deadline = Instant::now() + timeout;

    loop {
        match listener.accept() {
            Ok((socket, _)) => {
                socket.set_nonblocking(false)?;
                return Ok(socket);
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    bail!("Timed out waiting for the OAuth callback");
                }
                thread::sleep(Duration::from_millis(100));
            }
            Err(e) => return Err(e).context("OAuth callback accept failed"),
        }
    }
}

fn parse_callback_request(request: &str, expected_state: &str) -> Result<String> {
    let first_line = request.lines().next().context("Malformed callback request")?;
    let target = first_line
        .split_whitespace()
        .nth(1)
        .context("Malformed callback request line")?;
    parse_callback_target(target, expected_state)
}

pub fn parse_callback_target(target: &str, expected_state: &str) -> Result<String> {
    let url = Url::parse(&format!("http://localhost{target}"))
        .context("Invalid callback target")?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.to_string()),
            "state" => state = Some(value.to_string()),
            "error" => error = Some(value.to_string()),
            _ => {}
        }
    }

    if let Some(error) = error {
        bail!("OAuth error: {error}");
    }
    if state.as_deref() != Some(expected_state) {
        bail!("Invalid state parameter");
    }
    code.context("No authorization code received")
}

// ── Token endpoint ────────────────────────────────────────────────────────────

fn exchange_code(
    ep: &Endpoints,
    client_id: &str,
    code: &str,
    verifier: &str,
) -> Result<Value> {
    let client_secret = std::env::var(ep.client_secret_env)
        .with_context(|| format!("{} environment variable not set", ep.client_secret_env))?;

    post_token_form(
        ep.token_url,
        &[
            ("grant_type", "authorization_code"),
            ("client_id", client_id),
            ("client_secret", &client_secret),
            ("code", code),
            ("redirect_uri", REDIRECT_URI),
            ("code_verifier", verifier),
        ],
    )
}

/// Refresh an expired token using its refresh token.
pub fn refresh_token(token: &OAuthToken) -> Result<OAuthToken> {
    let refresh = token
        .refresh_token
        .as_deref()
        .context("No refresh token available")?;

    let cli_type = match token.provider.as_str() {
        "anthropic" => CliType::Claude,
        "openai" => CliType::Codex,
        other => bail!("Unknown OAuth provider '{other}'"),
    };
    let ep = endpoints(cli_type);

    let client_id =
        std::env::var(ep.client_id_env).unwrap_or_else(|_| "sweech-cli".to_string());
    let client_secret = std::env::var(ep.client_secret_env)
        .context("Client secret not configured for token refresh")?;

    let response = post_token_form(
        ep.token_url,
        &[
            ("grant_type", "refresh_token"),
            ("client_id", &client_id),
            ("client_secret", &client_secret),
            ("refresh_token", refresh),
        ],
    )?;

    let mut refreshed = token_from_response(&response, ep.provider)?;
    if refreshed.refresh_token.is_none() {
        refreshed.refresh_token = token.refresh_token.clone();
    }
    Ok(refreshed)
}

fn post_token_form(token_url: &str, form: &[(&str, &str)]) -> Result<Value> {
    let response = match ureq::post(token_url).send_form(form) {
        Ok(resp) => resp,
        Err(ureq::Error::Status(code, resp)) => {
            let body = resp.into_string().unwrap_or_default();
            bail!("Token exchange failed (status {code}): {body}");
        }
        Err(e) => return Err(e).context("Token exchange request failed"),
    };

    response
        .into_json::<Value>()
        .context("Token endpoint returned invalid JSON")
}

fn token_from_response(value: &Value, provider: &str) -> Result<OAuthToken> {
    let access_token = value
        .get("access_token")
        .and_then(Value::as_str)
        .context("Token response missing access_token")?
        .to_string();

    let refresh_token = value
        .get("refresh_token")
        .and_then(Value::as_str)
        .map(String::from);

    let expires_at = value
        .get("expires_in")
        .and_then(Value::as_i64)
        .map(|secs| Utc::now().timestamp_millis() + secs * 1000);

    let token_type = value
        .get("token_type")
        .and_then(Value::as_str)
        .unwrap_or("Bearer")
        .to_string();

    Ok(OAuthToken {
        access_token,
        refresh_token,
        expires_at,
        token_type,
        provider: provider.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkce_verifier_length_and_challenge_are_consistent() {
        let pair = generate_pkce_pair();
        assert!(pair.verifier.len() >= 43);
        assert!(pair.verifier.len() <= 128);
        assert_eq!(pair.challenge, code_challenge_s256(&pair.verifier));
    }

    #[test]
    fn token_without_expiry_never_expires() {
        let token = OAuthToken {
            access_token: "t".into(),
            refresh_token: None,
            expires_at: None,
            token_type: "Bearer".into(),
            provider: "anthropic".into(),
        };
        assert!(!token.is_expired());
    }

    #[test]
    fn expiry_honors_five_minute_skew() {
        let now = 1_000_000_000_000i64;
        let mut token = OAuthToken {
            access_token: "t".into(),
            refresh_token: None,
            expires_at: Some(now + EXPIRY_SKEW_MS + 1),
            token_type: "Bearer".into(),
            provider: "anthropic".into(),
        };
        assert!(!token.is_expired_at(now));

        token.expires_at = Some(now + EXPIRY_SKEW_MS - 1);
        assert!(token.is_expired_at(now));
    }

    #[test]
    fn callback_target_parsing_extracts_code() {
        let code = parse_callback_target("/callback?code=abc123&state=xyz", "xyz").unwrap();
        assert_eq!(code, "abc123");
    }

    #[test]
    fn callback_target_rejects_state_mismatch() {
        let err = parse_callback_target("/callback?code=abc&state=foo", "bar").unwrap_err();
        assert!(err.to_string().contains("state"));
    }

    #[test]
    fn callback_target_surfaces_provider_error() {
        let err =
            parse_callback_target("/callback?error=access_denied&state=xyz", "xyz").unwrap_err();
        assert!(err.to_string().contains("access_denied"));
    }

    #[test]
    fn accept_times_out_without_a_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let err = accept_with_timeout(&listener, Duration::from_millis(50)).unwrap_err();
        assert!(err.to_string().contains("Timed out"));
    }

    #[test]
    fn accept_returns_an_incoming_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = thread::spawn(move || TcpStream::connect(addr).unwrap());

        let socket = accept_with_timeout(&listener, Duration::from_secs(5)).unwrap();
        assert!(socket.peer_addr().is_ok());
        client.join().unwrap();
    }

    #[test]
    fn token_env_maps_per_cli_type() {
        let token = OAuthToken {
            access_token: "abc".into(),
            refresh_token: None,
            expires_at: None,
            token_type: "Bearer".into(),
            provider: "anthropic".into(),
        };

        let claude = token_env(&token, CliType::Claude);
        assert_eq!(claude["ANTHROPIC_AUTH_TOKEN"], "bearer_abc");
        assert_eq!(claude["ANTHROPIC_BEARER_TOKEN"], "abc");

        let codex = token_env(&token, CliType::Codex);
        assert_eq!(codex["OPENAI_API_KEY"], "sk-oauth-abc");
        assert_eq!(codex["OPENAI_BEARER_TOKEN"], "abc");
    }

    #[test]
    fn token_response_parsing_fills_defaults() {
        let value: Value = serde_json::json!({
            "access_token": "tok",
            "expires_in": 3600
        });
        let token = token_from_response(&value, "anthropic").unwrap();
        assert_eq!(token.access_token, "tok");
        assert_eq!(token.token_type, "Bearer");
        assert!(token.expires_at.is_some());
        assert!(token.refresh_token.is_none());
    }
}
