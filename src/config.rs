//! Gateway configuration loaded from environment variables.
//!
//! All settings come from environment variables (or a `.env` file via
//! `dotenvy`). Unset or unparsable values fall back to the defaults below,
//! except `LISTEN_ADDR`, which must parse when present.
//!
//! | Variable               | Default          |
//! |------------------------|------------------|
//! | `LISTEN_ADDR`          | `127.0.0.1:5173` |
//! | `REPLY_BUFFER`         | `64`             |
//! | `EVENT_BUS_CAPACITY`   | `1024`           |
//! | `WS_MAX_MESSAGE_BYTES` | `16777216`       |
//! | `CORS_PERMISSIVE`      | `true`           |
//! | `LOG_FORMAT`           | `text`           |

use std::net::SocketAddr;
use std::str::FromStr;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format {other:?}")),
        }
    }
}

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to.
    pub listen_addr: SocketAddr,

    /// Capacity of each per-message reply sink.
    pub reply_buffer: usize,

    /// Capacity of the store's change broadcast channel.
    pub event_bus_capacity: usize,

    /// Largest inbound WebSocket message accepted, in bytes.
    pub ws_max_message_bytes: usize,

    /// Whether to allow cross-origin requests from anywhere.
    pub cors_permissive: bool,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 5173)),
            reply_buffer: 64,
            event_bus_capacity: 1024,
            ws_max_message_bytes: 16 * 1024 * 1024,
            cors_permissive: true,
            log_format: LogFormat::Text,
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, std::net::AddrParseError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let listen_addr = match std::env::var("LISTEN_ADDR") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.listen_addr,
        };

        Ok(Self {
            listen_addr,
            reply_buffer: parse_env("REPLY_BUFFER", defaults.reply_buffer).max(1),
            event_bus_capacity: parse_env("EVENT_BUS_CAPACITY", defaults.event_bus_capacity)
                .max(1),
            ws_max_message_bytes: parse_env("WS_MAX_MESSAGE_BYTES", defaults.ws_max_message_bytes),
            cors_permissive: parse_env_bool("CORS_PERMISSIVE", defaults.cors_permissive),
            log_format: parse_env("LOG_FORMAT", defaults.log_format),
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    parse_bool(std::env::var(key).ok().as_deref()).unwrap_or(default)
}

fn parse_bool(raw: Option<&str>) -> Option<bool> {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        Some("true" | "1") => Some(true),
        Some("false" | "0") => Some(false),
        _ => None,
    }
}
