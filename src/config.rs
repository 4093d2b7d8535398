//! Relay configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Only the tournament URL and the
//! bracket API key have no default.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};

use crate::domain::arena::DEFAULT_PRIORITY;

/// Log output format selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Reads `LOG_FORMAT` (`json` or anything else for text).
    ///
    /// Usable before the rest of the configuration so that logging is
    /// up while the remaining variables are validated.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        match std::env::var("LOG_FORMAT").ok().as_deref() {
            Some("json") | Some("JSON") => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Settings for the bracket-service client.
#[derive(Debug, Clone)]
pub struct BracketConfig {
    /// Base URL of the bracket API (e.g. `https://api.challonge.com/v1`).
    pub api_url: String,
    /// API key sent with every request.
    pub api_key: String,
    /// Organisation subdomain; prefixes the tournament slug when non-empty.
    pub subdomain: String,
    /// Tournament URL slug.
    pub tournament_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl BracketConfig {
    /// Returns the slug used to look the tournament up.
    #[must_use]
    pub fn tournament_slug(&self) -> String {
        if self.subdomain.is_empty() {
            self.tournament_url.clone()
        } else {
            format!("{}-{}", self.subdomain, self.tournament_url)
        }
    }
}

/// Top-level relay configuration.
///
/// Loaded once at startup via [`ManagerConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Socket address for the HTTP/WebSocket server (e.g. `0.0.0.0:8080`).
    pub listen_addr: SocketAddr,

    /// Shared secret that marks a `ServerHello` as the admin controller.
    pub admin_key: String,

    /// WebSocket URL of the arena plugin.
    pub plugin_url: String,

    /// Delay between plugin reconnect attempts.
    pub plugin_reconnect: Duration,

    /// Arena preference order as 1-based arena numbers.
    pub arena_priority: Vec<usize>,

    /// Bracket-service settings.
    pub bracket: BracketConfig,
}

impl ManagerConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` or `ARENA_PRIORITY` cannot be
    /// parsed, if `TOURNAMENT_URL` is missing, or if no bracket API key is
    /// available from `BRACKET_API_KEY` or `BRACKET_API_KEY_FILE`.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .context("LISTEN_ADDR is not a socket address")?;

        let admin_key = std::env::var("ADMIN_KEY").unwrap_or_else(|_| "admin".to_string());
        if admin_key == "admin" {
            tracing::warn!("ADMIN_KEY not set, using the built-in default");
        }

        let plugin_url =
            std::env::var("PLUGIN_URL").unwrap_or_else(|_| "ws://127.0.0.1:9001".to_string());
        let plugin_reconnect = Duration::from_secs(parse_env("PLUGIN_RECONNECT_SECS", 5));

        let arena_priority = match std::env::var("ARENA_PRIORITY") {
            Ok(raw) => parse_priority(&raw)?,
            Err(_) => DEFAULT_PRIORITY.to_vec(),
        };

        let tournament_url = std::env::var("TOURNAMENT_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .context("TOURNAMENT_URL must be set")?;

        let api_key = match std::env::var("BRACKET_API_KEY") {
            Ok(key) if !key.trim().is_empty() => key.trim().to_string(),
            _ => {
                let path = std::env::var("BRACKET_API_KEY_FILE")
                    .unwrap_or_else(|_| "api_key.txt".to_string());
                read_key_file(Path::new(&path))?
            }
        };

        let bracket = BracketConfig {
            api_url: std::env::var("BRACKET_API_URL")
                .unwrap_or_else(|_| "https://api.challonge.com/v1".to_string()),
            api_key,
            subdomain: std::env::var("BRACKET_SUBDOMAIN").unwrap_or_default(),
            tournament_url,
            timeout: Duration::from_secs(parse_env("BRACKET_TIMEOUT_SECS", 10)),
        };

        Ok(Self {
            listen_addr,
            admin_key,
            plugin_url,
            plugin_reconnect,
            arena_priority,
            bracket,
        })
    }
}

/// Reads and trims the bracket API key file.
fn read_key_file(path: &Path) -> anyhow::Result<String> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("could not read bracket API key from {}", path.display()))?;
    let key = raw.trim();
    if key.is_empty() {
        bail!("bracket API key file {} is empty", path.display());
    }
    Ok(key.to_string())
}

/// Parses a comma-separated list of 1-based arena numbers.
///
/// # Errors
///
/// Returns an error if any element is not a positive integer. Permutation
/// checks happen when the allocator is built.
pub fn parse_priority(raw: &str) -> anyhow::Result<Vec<usize>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .with_context(|| format!("ARENA_PRIORITY entry {s:?} is not a number"))
        })
        .collect()
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
