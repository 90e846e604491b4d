use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

pub const DEFAULT_AUTH_FILE: &str = "browser.json";

const ORIGIN: &str = "https://music.youtube.com";
const REQUIRED_COOKIE: &str = "SAPISID";
const FALLBACK_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Headers that must not be replayed; the HTTP client owns them.
const SKIPPED_HEADERS: [&str; 5] = [
    "host",
    "content-length",
    "content-type",
    "accept-encoding",
    "connection",
];

/// Captured browser request headers used to authenticate against the music
/// service, stored as a flat JSON object with one key per header.
#[derive(Debug, Clone)]
pub struct Credentials {
    headers: HashMap<String, String>,
}

impl Credentials {
    /// Parse request headers pasted from browser devtools ("Copy Request
    /// Headers"). Continuation lines of a folded Cookie header are glued back
    /// on; headers the client must own are dropped.
    pub fn from_pasted_headers(raw: &str) -> Result<Self> {
        let mut headers = HashMap::new();
        let mut current_header: Option<String> = None;

        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            // HTTP/2 pseudo-headers (":authority" and friends) in devtools
            // pastes are not real request headers.
            if line.starts_with(':') {
                continue;
            }
            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim();
                let value = value.trim();
                let canonical = match key.to_lowercase().as_str() {
                    "user-agent" => "User-Agent",
                    "cookie" => "Cookie",
                    "authorization" => "Authorization",
                    "x-goog-authuser" => "X-Goog-AuthUser",
                    "x-goog-visitor-id" => "X-Goog-Visitor-Id",
                    skipped if SKIPPED_HEADERS.contains(&skipped) => continue,
                    _ => key,
                };
                headers.insert(canonical.to_string(), value.to_string());
                current_header = Some(canonical.to_lowercase());
            } else if current_header.as_deref() == Some("cookie") {
                // Folded continuation of a long Cookie line.
                let cookie = headers.entry("Cookie".to_string()).or_default();
                cookie.push(' ');
                cookie.push_str(line);
            }
        }

        if headers.get("User-Agent").is_none_or(|ua| ua.is_empty()) {
            log::warn!("No User-Agent in pasted headers; using a generic default");
            headers.insert("User-Agent".into(), FALLBACK_USER_AGENT.into());
        }

        let mut credentials = Self { headers };
        credentials.ensure_origin();
        credentials.validate()?;
        Ok(credentials)
    }

    /// Load the credentials file, stringifying any non-string values and
    /// filling in the Origin header so stale files keep working.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read credentials file: {}", path.display()))?;
        let raw: serde_json::Map<String, Value> = serde_json::from_str(&contents)
            .wrap_err_with(|| format!("Failed to parse credentials file: {}", path.display()))?;

        let headers = raw
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(text) => text,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect();

        let mut credentials = Self { headers };
        credentials.ensure_origin();
        credentials.validate()?;
        Ok(credentials)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.headers)
            .wrap_err("Failed to serialize credentials")?;
        std::fs::write(path, contents)
            .wrap_err_with(|| format!("Failed to write credentials file: {}", path.display()))?;
        Ok(())
    }

    fn cookie(&self) -> Option<&str> {
        self.headers
            .get("Cookie")
            .or_else(|| self.headers.get("cookie"))
            .map(String::as_str)
    }

    fn ensure_origin(&mut self) {
        if !self.headers.contains_key("Origin") && !self.headers.contains_key("origin") {
            self.headers.insert("Origin".into(), ORIGIN.into());
        }
    }

    fn validate(&self) -> Result<()> {
        let cookie = self.cookie().unwrap_or_default();
        if !cookie.contains(REQUIRED_COOKIE) {
            return Err(eyre!(
                "Credentials are missing the {REQUIRED_COOKIE} cookie; \
                 re-run `playlist-sync setup` with a fresh header paste"
            ));
        }
        Ok(())
    }

    /// Build the header map replayed on every API request.
    pub fn header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::new();
        for (key, value) in &self.headers {
            if SKIPPED_HEADERS.contains(&key.to_lowercase().as_str()) {
                continue;
            }
            let name: HeaderName = key
                .parse()
                .wrap_err_with(|| format!("Invalid header name: {key}"))?;
            let value: HeaderValue = value
                .parse()
                .wrap_err_with(|| format!("Invalid value for header {key}"))?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

/// Interactive credential capture: read a header paste from stdin until EOF
/// and write the credentials file.
pub fn run_setup(path: &Path) -> Result<()> {
    println!("Authentication setup");
    println!();
    println!("1. Open music.youtube.com in your browser and make sure you're logged in");
    println!("2. Open Developer Tools -> Network tab and refresh the page");
    println!("3. Locate a POST request to '/youtubei/v1/browse'");
    println!("4. Right-click it -> Copy -> Copy Request Headers");
    println!();
    println!("Paste the request headers below, then finish with Ctrl+D:");
    println!();

    let mut lines = Vec::new();
    for line in std::io::stdin().lock().lines() {
        lines.push(line.wrap_err("Failed to read from stdin")?);
    }
    let raw = lines.join("\n");
    if raw.trim().is_empty() {
        return Err(eyre!("No headers pasted; aborting setup"));
    }

    let credentials = Credentials::from_pasted_headers(&raw)?;
    credentials.save(path)?;
    println!("Credentials saved to {}", path.display());
    Ok(())
}
