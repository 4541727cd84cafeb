//! Configuration management.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::editable::DEFAULT_DELAY;
use crate::events::DEFAULT_EVENT_BUFFER;

/// Configuration structure that matches the TOML file format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub debounce: DebounceConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the backend REST API
    #[serde(default = "default_server_url")]
    pub url: String,
    /// Path of the push-event WebSocket, relative to `url`
    #[serde(default = "default_events_path")]
    pub events_path: String,
    /// Bearer token for REST calls, also sent as `auth_token` on the WebSocket
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            events_path: default_events_path(),
            auth_token: None,
        }
    }
}

/// Settle times of debounced edits, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebounceConfig {
    /// Names and source selections
    #[serde(default = "default_name_ms")]
    pub name_ms: u64,
    /// Mixer channel volume
    #[serde(default = "default_volume_ms")]
    pub volume_ms: u64,
    /// Library search box
    #[serde(default = "default_search_ms")]
    pub search_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            name_ms: default_name_ms(),
            volume_ms: default_volume_ms(),
            search_ms: default_search_ms(),
        }
    }
}

impl DebounceConfig {
    pub fn name_delay(&self) -> Duration {
        Duration::from_millis(self.name_ms)
    }

    pub fn volume_delay(&self) -> Duration {
        Duration::from_millis(self.volume_ms)
    }

    pub fn search_delay(&self) -> Duration {
        Duration::from_millis(self.search_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Undelivered events kept before the session falls behind and resyncs
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            event_buffer: default_event_buffer(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    /// If not set, uses RUST_LOG environment variable or defaults to "info"
    pub level: Option<String>,
}

fn default_server_url() -> String {
    format!("http://localhost:{}", mixdesk_types::DEFAULT_PORT)
}

fn default_events_path() -> String {
    "/events".to_string()
}

fn default_name_ms() -> u64 {
    DEFAULT_DELAY.as_millis() as u64
}

fn default_volume_ms() -> u64 {
    100
}

fn default_search_ms() -> u64 {
    200
}

fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

/// Values given on the command line; `None` leaves lower layers in effect.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub server_url: Option<String>,
    pub auth_token: Option<String>,
    pub log_level: Option<String>,
}

impl ClientConfig {
    /// Load configuration with full priority chain: CLI args > env vars > config files > defaults.
    ///
    /// Config files are searched in this order:
    /// 1. `.mixdesk.toml` in current directory
    /// 2. `config.toml` in user config directory (~/.config/mixdesk/ on Linux)
    pub fn from_figment(overrides: &ConfigOverrides) -> Result<Self, figment::Error> {
        let local_config = std::env::current_dir()
            .ok()
            .map(|d| d.join(".mixdesk.toml"));
        let user_config = directories::ProjectDirs::from("", "", "mixdesk")
            .map(|dirs| dirs.config_dir().join("config.toml"));

        Self::figment(user_config, local_config, overrides).extract()
    }

    fn figment(
        user_config: Option<PathBuf>,
        local_config: Option<PathBuf>,
        overrides: &ConfigOverrides,
    ) -> Figment {
        // Priority: defaults < user config < local config < env vars < CLI args
        let mut figment = Figment::new().merge(Serialized::defaults(ClientConfig::default()));

        if let Some(ref path) = user_config {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        if let Some(ref path) = local_config {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        // MIXDESK_SERVER__URL=... sets server.url
        figment = figment.merge(Env::prefixed("MIXDESK_").split("__"));

        if let Some(ref url) = overrides.server_url {
            figment = figment.merge(Serialized::default("server.url", url));
        }
        if let Some(ref token) = overrides.auth_token {
            figment = figment.merge(Serialized::default("server.auth_token", token));
        }
        if let Some(ref level) = overrides.log_level {
            figment = figment.merge(Serialized::default("logging.level", level));
        }

        figment
    }

    /// Base URL of the REST API, without trailing slash.
    pub fn api_url(&self) -> &str {
        self.server.url.trim_end_matches('/')
    }

    /// WebSocket URL of the push-event channel.
    pub fn events_url(&self) -> String {
        let base = self.api_url();
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        let path = self.server.events_path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }
}
